//! # Rate-Limit Repository
//!
//! One row per counted attempt. A key's usage is the number of rows newer
//! than `now - window`, so limits hold across processes sharing the file.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for rate-limit hits.
#[derive(Debug, Clone)]
pub struct RateLimitRepository {
    pool: SqlitePool,
}

impl RateLimitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RateLimitRepository { pool }
    }

    /// Hits recorded for `key` strictly after `since`.
    pub async fn count_since(&self, key: &str, since: DateTime<Utc>) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::count_since_on(&mut conn, key, since).await
    }

    /// Oldest hit for `key` strictly after `since`.
    pub async fn oldest_since(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> DbResult<Option<DateTime<Utc>>> {
        let mut conn = self.pool.acquire().await?;
        Self::oldest_since_on(&mut conn, key, since).await
    }

    /// Removes one hit. Returns false if it was already gone.
    pub async fn delete_hit(&self, id: i64) -> DbResult<bool> {
        debug!(id, "Releasing rate-limit hit");

        let result = sqlx::query("DELETE FROM rate_limit_hits WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Unit-of-work operations (caller owns the transaction)
    // =========================================================================

    /// Records a hit and returns its id.
    pub async fn insert_hit(
        conn: &mut SqliteConnection,
        key: &str,
        at: DateTime<Utc>,
    ) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO rate_limit_hits (key, hit_at) VALUES (?1, ?2) RETURNING id",
        )
        .bind(key)
        .bind(at)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    pub async fn count_since_on(
        conn: &mut SqliteConnection,
        key: &str,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rate_limit_hits WHERE key = ?1 AND hit_at > ?2",
        )
        .bind(key)
        .bind(since)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    pub async fn oldest_since_on(
        conn: &mut SqliteConnection,
        key: &str,
        since: DateTime<Utc>,
    ) -> DbResult<Option<DateTime<Utc>>> {
        let oldest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT hit_at FROM rate_limit_hits
            WHERE key = ?1 AND hit_at > ?2
            ORDER BY hit_at
            LIMIT 1
            "#,
        )
        .bind(key)
        .bind(since)
        .fetch_optional(conn)
        .await?;

        Ok(oldest)
    }

    /// Deletes every hit at or before `cutoff`. Returns how many.
    pub async fn delete_older_than(
        conn: &mut SqliteConnection,
        cutoff: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_hits WHERE hit_at <= ?1")
            .bind(cutoff)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
