//! # Reset-Code Repository
//!
//! Storage for password reset codes. Every state change is a single
//! conditional statement so two concurrent verifications of the same code
//! can never both succeed.
//!
//! ```text
//! consume()                  UPDATE ... SET used = 1
//!                            WHERE email AND code AND used = 0
//!                              AND expires_at > now AND failed_attempts < max
//!                            rows_affected = 1 → verified
//!
//! record_failed_attempt()    UPDATE ... SET failed_attempts = failed_attempts + 1
//!                            WHERE email AND used = 0 AND expires_at > now
//!                            RETURNING failed_attempts
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use pharma_core::PasswordResetCode;

const CODE_COLUMNS: &str =
    "id, email, code, expires_at, used, failed_attempts, created_at";

/// Repository for password reset codes.
#[derive(Debug, Clone)]
pub struct ResetCodeRepository {
    pool: SqlitePool,
}

impl ResetCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ResetCodeRepository { pool }
    }

    /// The active (unused, unexpired) code for an email, if any.
    pub async fn find_active(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<PasswordResetCode>> {
        let sql = format!(
            r#"
            SELECT {} FROM password_reset_codes
            WHERE email = ?1 AND used = 0 AND expires_at > ?2
            ORDER BY id DESC
            LIMIT 1
            "#,
            CODE_COLUMNS
        );
        let code = sqlx::query_as::<_, PasswordResetCode>(&sql)
            .bind(email)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(code)
    }

    /// Every stored code for an email, oldest first.
    pub async fn list_for_email(&self, email: &str) -> DbResult<Vec<PasswordResetCode>> {
        let sql = format!(
            "SELECT {} FROM password_reset_codes WHERE email = ?1 ORDER BY id",
            CODE_COLUMNS
        );
        let codes = sqlx::query_as::<_, PasswordResetCode>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;

        Ok(codes)
    }

    /// Marks one code used regardless of its state.
    ///
    /// Used to withdraw a code that could not be delivered.
    pub async fn invalidate_by_id(&self, id: i64) -> DbResult<bool> {
        debug!(id, "Invalidating reset code");

        let result = sqlx::query("UPDATE password_reset_codes SET used = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Unit-of-work operations (caller owns the transaction)
    // =========================================================================

    /// Supersedes every active code for an email. Returns how many.
    pub async fn invalidate_active(
        conn: &mut SqliteConnection,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_codes SET used = 1
            WHERE email = ?1 AND used = 0 AND expires_at > ?2
            "#,
        )
        .bind(email)
        .bind(now)
        .execute(conn)
        .await?;

        debug!(superseded = result.rows_affected(), "Invalidated active reset codes");
        Ok(result.rows_affected())
    }

    /// Stores a new code and returns its id.
    pub async fn insert(
        conn: &mut SqliteConnection,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO password_reset_codes
                (email, code, expires_at, used, failed_attempts, created_at)
            VALUES (?1, ?2, ?3, 0, 0, ?4)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .bind(now)
        .fetch_one(conn)
        .await?;

        debug!(id, %expires_at, "Stored reset code");
        Ok(id)
    }

    /// Consumes the matching active code if it is not locked out.
    ///
    /// Returns true when exactly one code was consumed.
    pub async fn consume(
        conn: &mut SqliteConnection,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
        max_failed_attempts: u32,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_codes SET used = 1
            WHERE email = ?1
              AND code = ?2
              AND used = 0
              AND expires_at > ?3
              AND failed_attempts < ?4
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(now)
        .bind(max_failed_attempts)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts a wrong guess against the email's active code(s).
    ///
    /// Returns the new attempt counts; empty when the email has no active
    /// code.
    pub async fn record_failed_attempt(
        conn: &mut SqliteConnection,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<i64>> {
        let attempts: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_codes SET failed_attempts = failed_attempts + 1
            WHERE email = ?1 AND used = 0 AND expires_at > ?2
            RETURNING failed_attempts
            "#,
        )
        .bind(email)
        .bind(now)
        .fetch_all(conn)
        .await?;

        Ok(attempts)
    }

    /// Deletes every used or expired code. Returns how many.
    pub async fn delete_stale(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM password_reset_codes WHERE used = 1 OR expires_at <= ?1",
        )
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
