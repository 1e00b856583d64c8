//! # Error Types
//!
//! Domain-specific error types for pharma-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharma-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pharma-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  pharma-services errors                                                │
//! │  └── ServiceError     - Domain(CoreError) | Internal(DbError)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, quantities, IDs)
//! 3. Errors are enum variants, never String
//! 4. Reset-code failures never reveal whether an email is known

use chrono::Duration;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// None of these is fatal to the process; each maps to a message the
/// back-office screens show the operator.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough units on hand to fulfil a line.
    ///
    /// ## When This Occurs
    /// - Recording a sale whose line asks for more than `stock_quantity`
    /// - Raising the quantity of an existing line beyond what is left
    /// - Two pharmacists selling the last units at the same moment
    ///
    /// ## User Workflow
    /// ```text
    /// Record sale (Doliprane × 3)
    ///      │
    ///      ▼
    /// Conditional decrement: stock=2
    ///      │
    ///      ▼
    /// InsufficientStock { product_name: "Doliprane", available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// Screen shows: "Doliprane: 1 unit short"
    /// ```
    #[error("Insufficient stock for {product_name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// A line references a product that does not exist or is inactive.
    #[error("Invalid product reference: {0}")]
    InvalidProductReference(String),

    /// Too many reset-code issuances for this email inside the window.
    #[error("Too many reset requests, retry in {}s", .retry_after.num_seconds())]
    RateLimited { retry_after: Duration },

    /// The reset code is wrong, expired, superseded or already used.
    ///
    /// ## When This Occurs
    /// - Unknown email
    /// - Wrong digits
    /// - Code older than its TTL
    /// - A newer code was issued for the same email
    ///
    /// The cases are deliberately indistinguishable to the caller.
    #[error("Invalid or expired reset code")]
    InvalidOrExpiredCode,

    /// The active code for this email has been guessed at too many times.
    #[error("Too many failed attempts, request a new code")]
    TooManyAttempts,

    /// The notifier could not hand the code to the user.
    #[error("Reset code could not be delivered: {0}")]
    DeliveryFailed(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Sale line item not found: {0}")]
    LineItemNotFound(String),

    /// Discount larger than subtotal plus tax.
    #[error("Discount {discount_cents} exceeds sale total {total_cents}")]
    DiscountExceedsTotal {
        discount_cents: i64,
        total_cents: i64,
    },

    /// Removing the last line would leave a sale with no items.
    #[error("Sale {0} must keep at least one line item")]
    EmptySale(String),

    /// A line total, subtotal or tax does not fit in an i64 of cents.
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(&'static str),

    /// Argon2 refused to hash a password (bad parameters, not bad input).
    #[error("Password hashing failed: {0}")]
    PasswordHashing(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Units missing for an [`CoreError::InsufficientStock`], zero otherwise.
    pub fn shortfall(&self) -> i64 {
        match self {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => (requested - available).max(0),
            _ => 0,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any row is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email, bad sale prefix).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_and_shortfall() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            product_name: "Doliprane 500".to_string(),
            available: 2,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Doliprane 500: available 2, requested 3"
        );
        assert_eq!(err.shortfall(), 1);
        assert_eq!(CoreError::TooManyAttempts.shortfall(), 0);
    }

    #[test]
    fn test_rate_limited_message() {
        let err = CoreError::RateLimited {
            retry_after: Duration::seconds(90),
        };
        assert_eq!(err.to_string(), "Too many reset requests, retry in 90s");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "email".to_string(),
        };
        assert_eq!(err.to_string(), "email is required");

        let err = ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        };
        assert_eq!(err.to_string(), "password must be at least 8 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "email".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
