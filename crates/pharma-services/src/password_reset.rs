//! # Password Reset Codes
//!
//! Issues, verifies and expires the one-time codes that let a user set a
//! new password without a session.
//!
//! ## Issue
//! ```text
//! issue(email)
//!   ├── validate email shape
//!   ├── limiter.acquire("reset-code:<email>")  → RateLimited (nothing stored)
//!   ├── generate 6 digits
//!   ├── BEGIN
//!   │     invalidate active codes (SUPERSEDED)
//!   │     insert new code, expires_at = now + ttl
//!   │   COMMIT
//!   ├── notifier.deliver(email, code)
//!   │     └── failure → invalidate new code, release permit, DeliveryFailed
//!   ▼
//! IssuedResetCode { id, email, expires_at }
//! ```
//!
//! ## Verify
//! One transaction. The consuming UPDATE only matches an unused, unexpired,
//! not-locked-out code with the same digits. When it matches nothing the
//! email's active code takes a failed attempt, and the returned count
//! decides between `InvalidOrExpiredCode` and `TooManyAttempts`. Unknown
//! email, wrong digits and expiry all look the same from outside.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use pharma_core::password::hash_password;
use pharma_core::reset_code::{generate_code, is_well_formed, rate_limit_key};
use pharma_core::validation::{validate_email, validate_password};
use pharma_core::{
    CleanupReport, Clock, CoreError, IssuedResetCode, ResetCodePolicy, SystemClock,
};
use pharma_db::{Database, DbError, DbResult, ResetCodeRepository, SqliteConnection, UserRepository};

use crate::error::ServiceResult;
use crate::notify::CodeNotifier;
use crate::rate_limit::{Acquire, RateLimiter, SqlRateLimiter};

/// Outcome of the consuming step, decided inside the transaction.
enum CodeCheck {
    Consumed,
    Rejected(CoreError),
}

/// Reset-code issuance and verification.
#[derive(Clone)]
pub struct ResetCodeService {
    db: Database,
    notifier: Arc<dyn CodeNotifier>,
    limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
    policy: ResetCodePolicy,
}

impl ResetCodeService {
    /// Wall-clock service with a database-backed limiter sized by `policy`.
    pub fn new(db: Database, notifier: Arc<dyn CodeNotifier>, policy: ResetCodePolicy) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let limiter = Arc::new(SqlRateLimiter::new(
            db.clone(),
            clock.clone(),
            policy.max_issuances,
            policy.issuance_window,
        ));
        Self::with_parts(db, notifier, limiter, clock, policy)
    }

    /// Fully injected constructor.
    pub fn with_parts(
        db: Database,
        notifier: Arc<dyn CodeNotifier>,
        limiter: Arc<dyn RateLimiter>,
        clock: Arc<dyn Clock>,
        policy: ResetCodePolicy,
    ) -> Self {
        ResetCodeService {
            db,
            notifier,
            limiter,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &ResetCodePolicy {
        &self.policy
    }

    /// Issues a fresh code for `email` and hands it to the notifier.
    ///
    /// ## Errors
    /// - `Validation` - malformed email
    /// - `RateLimited` - too many issuances in the window
    /// - `DeliveryFailed` - the notifier refused; nothing stays active and
    ///   the issuance does not count against the limit
    pub async fn issue(&self, email: &str) -> ServiceResult<IssuedResetCode> {
        let email = validate_email(email)?;

        let permit = match self.limiter.acquire(&rate_limit_key(&email)).await? {
            Acquire::Granted(permit) => permit,
            Acquire::Denied { retry_after } => {
                return Err(CoreError::RateLimited { retry_after }.into());
            }
        };

        let now = self.clock.now();
        let code = generate_code(&mut rand::thread_rng());
        let expires_at = self.policy.expires_at(now);

        let id = match self.store_code(&email, &code, expires_at, now).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(release_err) = self.limiter.release(permit).await {
                    error!(error = %release_err, "Failed to release rate limit permit");
                }
                return Err(e.into());
            }
        };

        if let Err(e) = self.notifier.deliver(&email, &code).await {
            warn!(email = %email, error = %e, "Reset code delivery failed");

            if let Err(db_err) = self.db.reset_codes().invalidate_by_id(id).await {
                error!(id, error = %db_err, "Failed to invalidate undelivered reset code");
            }
            if let Err(release_err) = self.limiter.release(permit).await {
                error!(error = %release_err, "Failed to release rate limit permit");
            }

            return Err(CoreError::DeliveryFailed(e.to_string()).into());
        }

        info!(email = %email, id, %expires_at, "Reset code issued");

        Ok(IssuedResetCode {
            id,
            email,
            expires_at,
        })
    }

    /// Consumes `code` if it is the email's active code.
    ///
    /// ## Errors
    /// - `InvalidOrExpiredCode` - no active code matched
    /// - `TooManyAttempts` - the active code is locked out
    pub async fn verify(&self, email: &str, code: &str) -> ServiceResult<()> {
        let email = email.trim();
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let check = self.check_code(&mut tx, email, code, now).await?;
        tx.commit().await.map_err(DbError::from)?;

        match check {
            CodeCheck::Consumed => {
                info!(email = %email, "Reset code verified");
                Ok(())
            }
            CodeCheck::Rejected(e) => Err(e.into()),
        }
    }

    /// Verifies the code and replaces the user's password in one
    /// transaction.
    ///
    /// The password is validated and hashed before the code is touched, so a
    /// weak password never burns a valid code.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        validate_password(new_password)?;

        let password = new_password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| CoreError::PasswordHashing(e.to_string()))??;

        let email = email.trim();
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        match self.check_code(&mut tx, email, code, now).await? {
            CodeCheck::Rejected(e) => {
                tx.commit().await.map_err(DbError::from)?;
                Err(e.into())
            }
            CodeCheck::Consumed => {
                if !UserRepository::update_password_hash(&mut tx, email, &password_hash, now)
                    .await?
                {
                    tx.rollback().await.map_err(DbError::from)?;
                    warn!(email = %email, "Reset code matched but no user has this email");
                    return Err(CoreError::InvalidOrExpiredCode.into());
                }
                tx.commit().await.map_err(DbError::from)?;
                info!(email = %email, "Password reset");
                Ok(())
            }
        }
    }

    /// Deletes used and expired codes plus rate-limit hits older than the
    /// window. Idempotent.
    pub async fn cleanup(&self) -> ServiceResult<CleanupReport> {
        let now = self.clock.now();

        let codes_deleted = {
            let mut conn = self.db.acquire().await?;
            ResetCodeRepository::delete_stale(&mut conn, now).await?
        };
        let rate_limit_hits_deleted = self.limiter.prune().await?;

        let report = CleanupReport {
            codes_deleted,
            rate_limit_hits_deleted,
        };

        if report.is_empty() {
            info!("Reset code cleanup: nothing to delete");
        } else {
            info!(
                codes = report.codes_deleted,
                rate_limit_hits = report.rate_limit_hits_deleted,
                "Reset code cleanup complete"
            );
        }

        Ok(report)
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn store_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let mut tx = self.db.begin().await?;
        ResetCodeRepository::invalidate_active(&mut tx, email, now)
            .await?;
        let id = ResetCodeRepository::insert(&mut tx, email, code, expires_at, now)
            .await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Consumes the code or records a failed attempt. The caller commits
    /// either way so the attempt count sticks.
    async fn check_code(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> DbResult<CodeCheck> {
        let max = self.policy.max_failed_attempts;

        if is_well_formed(code)
            && ResetCodeRepository::consume(conn, email, code, now, max)
                .await?
        {
            return Ok(CodeCheck::Consumed);
        }

        let attempts = ResetCodeRepository::record_failed_attempt(conn, email, now)
            .await?;
        if attempts.iter().any(|&n| n > i64::from(max)) {
            warn!(email = %email, max_attempts = max, "Reset code locked out");
            return Ok(CodeCheck::Rejected(CoreError::TooManyAttempts));
        }

        Ok(CodeCheck::Rejected(CoreError::InvalidOrExpiredCode))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
