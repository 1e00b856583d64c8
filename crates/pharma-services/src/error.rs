//! # Service Errors
//!
//! Two layers, kept apart so callers can tell "your request was refused"
//! from "something broke".
//!
//! ```text
//! ServiceError
//!   ├── Domain(CoreError)   expected outcome, safe to show the user
//!   └── Internal(DbError)   infrastructure failure, log and return a 500
//! ```

use pharma_core::{CoreError, ValidationError};
use pharma_db::DbError;
use thiserror::Error;

/// Error returned by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule refused the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Storage failed underneath the operation.
    ///
    /// The unit of work was rolled back.
    #[error(transparent)]
    Internal(#[from] DbError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Domain(CoreError::Validation(err))
    }
}

impl ServiceError {
    /// The domain error, if this is one.
    pub fn domain(&self) -> Option<&CoreError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Internal(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ServiceError::Internal(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
