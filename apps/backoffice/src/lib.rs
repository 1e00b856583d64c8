//! # Pharmacy Back-Office
//!
//! Wires configuration, the database and the services together and runs
//! the periodic reset-code cleanup.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back-Office Process                              │
//! │                                                                         │
//! │  BackofficeConfig ──► AppState::init                                   │
//! │                          │                                              │
//! │          ┌───────────────┼────────────────┐                             │
//! │          ▼               ▼                ▼                             │
//! │     Database        SalesEngine     ResetCodeService                    │
//! │     (SQLite)                          │         │                       │
//! │                                       ▼         ▼                       │
//! │                               SqlRateLimiter  SmtpNotifier / LogNotifier│
//! │                                                                         │
//! │  run_cleanup_loop ──► ResetCodeService::cleanup every interval          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! `backoffice.toml` in the working directory, overridden by `PHARMA__*`
//! environment variables. See [`config`].

pub mod config;
pub mod error;
pub mod mailer;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use pharma_db::Database;
use pharma_services::{CodeNotifier, LogNotifier, ResetCodeService, SalesEngine};

pub use config::BackofficeConfig;
pub use error::AppError;

use crate::mailer::SmtpNotifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sales: SalesEngine,
    pub reset_codes: ResetCodeService,
    pub config: BackofficeConfig,
}

impl AppState {
    /// Opens the database (running migrations) and builds the services.
    pub async fn init(config: BackofficeConfig) -> Result<Self, AppError> {
        let db = Database::new(config.db_config()).await?;
        if !db.health_check().await {
            return Err(AppError::Unhealthy);
        }

        let notifier = build_notifier(&config)?;
        let sales = SalesEngine::new(db.clone(), config.sales_config());
        let reset_codes = ResetCodeService::new(db.clone(), notifier, config.reset_policy());

        Ok(AppState {
            db,
            sales,
            reset_codes,
            config,
        })
    }
}

/// SMTP when configured, otherwise codes go to the log.
pub fn build_notifier(config: &BackofficeConfig) -> Result<Arc<dyn CodeNotifier>, AppError> {
    match &config.smtp {
        Some(smtp) => {
            let notifier = SmtpNotifier::new(smtp, config.reset_codes.ttl_minutes)?;
            info!(host = %smtp.host, port = smtp.port, "Reset codes will be sent by e-mail");
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("No SMTP configured, reset codes will be written to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Runs `cleanup` immediately and then every `every` until `shutdown`
/// resolves. Failures are logged and retried on the next tick.
pub async fn run_cleanup_loop<F>(service: ResetCodeService, every: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Cleanup loop stopped");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = service.cleanup().await {
                    error!(error = %e, "Reset code cleanup failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharma_core::ResetCodePolicy;
    use pharma_db::DbConfig;
    use pharma_services::MemoryNotifier;

    #[tokio::test]
    async fn test_init_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BackofficeConfig::default();
        config.database.path = dir.path().join("backoffice.db");

        let state = AppState::init(config).await.unwrap();
        assert!(state.db.health_check().await);
        assert_eq!(state.reset_codes.policy(), &ResetCodePolicy::default());
    }

    #[tokio::test]
    async fn test_cleanup_loop_purges_and_stops() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let notifier = Arc::new(MemoryNotifier::new());
        let service =
            ResetCodeService::new(db.clone(), notifier.clone(), ResetCodePolicy::default());

        service.issue("pharmacist@pharma.test").await.unwrap();
        let code = notifier.last_code_for("pharmacist@pharma.test").unwrap();
        service
            .verify("pharmacist@pharma.test", &code)
            .await
            .unwrap();

        run_cleanup_loop(
            service,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

        let left = db
            .reset_codes()
            .list_for_email("pharmacist@pharma.test")
            .await
            .unwrap();
        assert!(left.is_empty());
    }
}
