//! # Rate Limiting
//!
//! Rolling-window limiter: at most `limit` hits per key in any `window`.
//!
//! ## How acquire() Decides
//! ```text
//!   BEGIN
//!     INSERT hit (key, now)            ← takes the write lock first
//!     COUNT hits WHERE hit_at > now - window
//!     count > limit ?
//!       ├── yes → ROLLBACK, Denied { retry_after = oldest + window - now }
//!       └── no  → COMMIT,   Granted(Permit)
//! ```
//!
//! Inserting before counting makes check-and-record a single step under
//! SQLite's write lock: two concurrent callers can never both see room for
//! the last slot.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use pharma_core::Clock;
use pharma_db::{Database, DbError, RateLimitRepository};

use crate::error::ServiceResult;

/// Proof that a hit was recorded. Hand it back to [`RateLimiter::release`]
/// to refund the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    id: i64,
    key: String,
}

impl Permit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Outcome of [`RateLimiter::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    Granted(Permit),
    Denied { retry_after: Duration },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Hits recorded for `key` inside the current window.
    async fn attempts(&self, key: &str) -> ServiceResult<u32>;

    /// Time until the oldest hit in the window leaves it, or `None` when
    /// the window is empty.
    async fn time_until_reset(&self, key: &str) -> ServiceResult<Option<Duration>>;

    /// Atomically checks the limit and records a hit.
    async fn acquire(&self, key: &str) -> ServiceResult<Acquire>;

    /// Removes the hit behind `permit`.
    async fn release(&self, permit: Permit) -> ServiceResult<()>;

    /// Deletes hits that have left every window. Returns how many.
    async fn prune(&self) -> ServiceResult<u64>;
}

// =============================================================================
// SQLite-backed limiter
// =============================================================================

/// Limiter persisted in `rate_limit_hits`, shared by every process using the
/// same database file.
#[derive(Clone)]
pub struct SqlRateLimiter {
    db: Database,
    clock: Arc<dyn Clock>,
    limit: u32,
    window: Duration,
}

impl SqlRateLimiter {
    pub fn new(db: Database, clock: Arc<dyn Clock>, limit: u32, window: Duration) -> Self {
        SqlRateLimiter {
            db,
            clock,
            limit,
            window,
        }
    }

    fn retry_after(&self, oldest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        match oldest {
            Some(oldest) => (oldest + self.window - now).max(Duration::zero()),
            None => self.window,
        }
    }
}

#[async_trait]
impl RateLimiter for SqlRateLimiter {
    async fn attempts(&self, key: &str) -> ServiceResult<u32> {
        let since = self.clock.now() - self.window;
        let count = self.db.rate_limits().count_since(key, since).await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn time_until_reset(&self, key: &str) -> ServiceResult<Option<Duration>> {
        let now = self.clock.now();
        let oldest = self
            .db
            .rate_limits()
            .oldest_since(key, now - self.window)
            .await?;
        Ok(oldest.map(|oldest| self.retry_after(Some(oldest), now)))
    }

    async fn acquire(&self, key: &str) -> ServiceResult<Acquire> {
        let now = self.clock.now();
        let since = now - self.window;

        let mut tx = self.db.begin().await?;
        let id = RateLimitRepository::insert_hit(&mut tx, key, now).await?;
        let count = RateLimitRepository::count_since_on(&mut tx, key, since)
            .await?;

        if count > i64::from(self.limit) {
            let oldest = RateLimitRepository::oldest_since_on(&mut tx, key, since)
                .await?;
            tx.rollback().await.map_err(DbError::from)?;

            let retry_after = self.retry_after(oldest, now);
            warn!(
                key = %key,
                limit = self.limit,
                retry_after_secs = retry_after.num_seconds(),
                "Rate limit exceeded"
            );
            return Ok(Acquire::Denied { retry_after });
        }

        tx.commit().await.map_err(DbError::from)?;
        debug!(key = %key, hits = count, limit = self.limit, "Rate limit permit granted");

        Ok(Acquire::Granted(Permit {
            id,
            key: key.to_string(),
        }))
    }

    async fn release(&self, permit: Permit) -> ServiceResult<()> {
        let removed = self.db.rate_limits().delete_hit(permit.id).await?;
        debug!(key = %permit.key, removed, "Rate limit permit released");
        Ok(())
    }

    async fn prune(&self) -> ServiceResult<u64> {
        let cutoff = self.clock.now() - self.window;
        let mut conn = self.db.acquire().await?;
        let deleted = RateLimitRepository::delete_older_than(&mut conn, cutoff)
            .await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pharma_core::ManualClock;
    use pharma_db::DbConfig;

    async fn limiter(limit: u32) -> (SqlRateLimiter, Arc<ManualClock>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let limiter = SqlRateLimiter::new(db, clock.clone(), limit, Duration::minutes(60));
        (limiter, clock)
    }

    fn granted(outcome: Acquire) -> Permit {
        match outcome {
            Acquire::Granted(permit) => permit,
            Acquire::Denied { retry_after } => panic!("denied, retry after {retry_after}"),
        }
    }

    #[tokio::test]
    async fn test_denies_after_limit_and_reports_retry() {
        let (limiter, clock) = limiter(3).await;

        for _ in 0..3 {
            granted(limiter.acquire("k").await.unwrap());
            clock.advance(Duration::minutes(1));
        }

        // 09:03, oldest hit at 09:00
        match limiter.acquire("k").await.unwrap() {
            Acquire::Denied { retry_after } => assert_eq!(retry_after, Duration::minutes(57)),
            other => panic!("expected denial, got {other:?}"),
        }

        // The denied hit was not recorded
        assert_eq!(limiter.attempts("k").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_window_rolls() {
        let (limiter, clock) = limiter(1).await;
        granted(limiter.acquire("k").await.unwrap());

        clock.advance(Duration::minutes(59));
        let third = limiter.acquire("k").await.unwrap();
        assert!(matches!(third, Acquire::Denied { .. }));

        clock.advance(Duration::minutes(1));
        granted(limiter.acquire("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1).await;
        granted(limiter.acquire("a").await.unwrap());
        granted(limiter.acquire("b").await.unwrap());
        let again = limiter.acquire("a").await.unwrap();
        assert!(matches!(again, Acquire::Denied { .. }));
    }

    #[tokio::test]
    async fn test_release_refunds_slot() {
        let (limiter, _clock) = limiter(1).await;
        let permit = granted(limiter.acquire("k").await.unwrap());
        assert_eq!(permit.key(), "k");

        limiter.release(permit).await.unwrap();
        assert_eq!(limiter.attempts("k").await.unwrap(), 0);
        granted(limiter.acquire("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_time_until_reset_and_prune() {
        let (limiter, clock) = limiter(5).await;
        assert!(limiter.time_until_reset("k").await.unwrap().is_none());

        granted(limiter.acquire("k").await.unwrap());
        clock.advance(Duration::minutes(20));
        assert_eq!(
            limiter.time_until_reset("k").await.unwrap(),
            Some(Duration::minutes(40))
        );

        clock.advance(Duration::minutes(40));
        assert_eq!(limiter.prune().await.unwrap(), 1);
        assert_eq!(limiter.attempts("k").await.unwrap(), 0);
    }
}
