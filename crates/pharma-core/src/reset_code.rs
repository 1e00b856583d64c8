//! # Reset Codes
//!
//! Generation and policy for the 6-digit codes that authorize a password
//! change without a session.
//!
//! ## Lifecycle
//! ```text
//!            issue()
//!   NONE ─────────────► ISSUED ──verify() ok──────────► VERIFIED
//!                         │
//!                         ├──now ≥ expires_at─────────► EXPIRED
//!                         │
//!                         └──issue() again────────────► SUPERSEDED
//! ```
//!
//! VERIFIED and SUPERSEDED are both stored as `used = true`; EXPIRED is
//! derived from `expires_at`. Every terminal state is eventually removed by
//! cleanup.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Number of digits in a reset code.
pub const CODE_LENGTH: usize = 6;

const CODE_SPACE_MAX: u32 = 999_999;

// =============================================================================
// Policy
// =============================================================================

/// Tunables for issuance, verification and rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCodePolicy {
    /// How long a freshly issued code stays valid.
    pub ttl: Duration,
    /// Issuances allowed per email inside `issuance_window`.
    pub max_issuances: u32,
    pub issuance_window: Duration,
    /// Wrong guesses tolerated against one active code.
    pub max_failed_attempts: u32,
}

impl Default for ResetCodePolicy {
    fn default() -> Self {
        ResetCodePolicy {
            ttl: Duration::minutes(10),
            max_issuances: 3,
            issuance_window: Duration::minutes(60),
            max_failed_attempts: 5,
        }
    }
}

impl ResetCodePolicy {
    /// Rejects policies that would make every request fail or never expire.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.ttl <= Duration::zero() {
            return Err(ValidationError::MustBePositive {
                field: "reset_codes.ttl".to_string(),
            });
        }
        if self.issuance_window <= Duration::zero() {
            return Err(ValidationError::MustBePositive {
                field: "reset_codes.window".to_string(),
            });
        }
        if self.max_issuances == 0 {
            return Err(ValidationError::MustBePositive {
                field: "reset_codes.max_issuances".to_string(),
            });
        }
        if self.max_failed_attempts == 0 {
            return Err(ValidationError::MustBePositive {
                field: "reset_codes.max_failed_attempts".to_string(),
            });
        }
        Ok(())
    }

    /// Expiry for a code issued at `now`.
    #[inline]
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Draws a code uniformly from `000000..=999999`.
///
/// Leading zeros are kept: `"004217"` is a valid code.
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    let n = rng.gen_range(0..=CODE_SPACE_MAX);
    format!("{:0width$}", n, width = CODE_LENGTH)
}

/// Checks the shape of a submitted code (exactly six ASCII digits).
///
/// Anything else cannot match a stored code; callers still count it as a
/// failed attempt so malformed guesses are not free.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Rate-limiter key guarding issuance for one email.
pub fn rate_limit_key(email: &str) -> String {
    format!("reset-code:{}", email)
}

// =============================================================================
// Results
// =============================================================================

/// What the caller learns about a successful issuance.
///
/// The code itself is deliberately absent; it only travels to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedResetCode {
    pub id: i64,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub codes_deleted: u64,
    pub rate_limit_hits_deleted: u64,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.codes_deleted == 0 && self.rate_limit_hits_deleted == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
