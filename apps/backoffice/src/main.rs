//! # Pharmacy Back-Office
//!
//! Opens the database, builds the services and keeps reset-code tables
//! clean until asked to stop.
//!
//! ## Startup
//! ```text
//! load config ──► init tracing ──► Database::new (migrations)
//!                                        │
//!                                        ▼
//!                           run_cleanup_loop ◄── Ctrl+C / SIGTERM
//!                                        │
//!                                        ▼
//!                                   close pool
//! ```

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pharma_backoffice::{run_cleanup_loop, AppState, BackofficeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BackofficeConfig::load().context("loading configuration")?;
    init_tracing(&config.logging.filter);

    info!(
        database = %config.database.path.display(),
        sale_prefix = %config.sales.sale_prefix,
        tax_rate_bps = config.sales.tax_rate_bps,
        smtp = config.smtp.is_some(),
        "Configuration loaded"
    );

    let state = AppState::init(config)
        .await
        .context("initializing back-office")?;
    info!("Back-office ready");

    run_cleanup_loop(
        state.reset_codes.clone(),
        state.config.cleanup_interval(),
        shutdown_signal(),
    )
    .await;

    state.db.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
