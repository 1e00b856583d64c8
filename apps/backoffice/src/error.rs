//! Error types for the back-office process.

use pharma_db::DbError;
use pharma_services::NotifyError;

use crate::config::ConfigError;

/// Startup failures. Once running, errors are logged rather than returned.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),

    #[error("Database health check failed")]
    Unhealthy,
}
