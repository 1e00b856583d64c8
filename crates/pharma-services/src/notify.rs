//! # Code Delivery
//!
//! The reset-code service hands every fresh code to a [`CodeNotifier`]. The
//! back-office wires an SMTP implementation; development and tests use the
//! ones below.
//!
//! A notifier must not retry internally for long: the caller waits for it
//! and undoes the issuance when it fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Notifier misconfigured: {0}")]
    Configuration(String),

    #[error("Delivery failed: {0}")]
    SendFailed(String),
}

/// Delivers a reset code to the owner of an email address.
#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), NotifyError>;
}

/// Writes the code to the log instead of sending it.
///
/// For local development only: the code ends up in plain text wherever the
/// logs go.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl CodeNotifier for LogNotifier {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        info!(email = %email, code = %code, "[DEV] Password reset code");
        Ok(())
    }
}

/// Keeps delivered codes in memory. Can be switched to fail every delivery.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `(email, code)` delivered so far, oldest first.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent code delivered to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code)
    }
}

#[async_trait]
impl CodeNotifier for MemoryNotifier {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::SendFailed("mailbox unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}
