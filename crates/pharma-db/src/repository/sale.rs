//! # Sale Repository
//!
//! Database operations for sales, their line items and the daily sale-number
//! counter.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. RECORD (one transaction)                                           │
//! │     └── next_sequence()   → 42 for today (takes the write lock)        │
//! │     └── insert_sale()     → VTE-20260301-0042, totals at zero          │
//! │     └── insert_item() × n → price snapshot per line                    │
//! │     └── update_totals()   → subtotal / tax / discount / total          │
//! │                                                                         │
//! │  2. EDIT LINES (one transaction each)                                  │
//! │     └── insert_item() / update_item_quantity() / delete_item()         │
//! │     └── update_totals()                                                │
//! │                                                                         │
//! │  3. EDIT DETAILS                                                       │
//! │     └── update_details()  → payment status, notes                      │
//! │                                                                         │
//! │  Sales are never hard-deleted here.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use pharma_core::{PaymentStatus, Sale, SaleLineItem, SaleTotals};

const SALE_COLUMNS: &str = r#"
    id, sale_number, client_id, user_id,
    subtotal_cents, tax_cents, discount_cents, total_cents,
    payment_method, payment_status, has_prescription, prescription_number,
    notes, sale_date, created_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, sale_id, product_id, position, quantity,
    unit_price_cents, total_price_cents, created_at, updated_at
"#;

/// Largest page `list` returns.
const MAX_LIST_LIMIT: u32 = 500;

// =============================================================================
// Query Types
// =============================================================================

/// Filters for the sales list and summary.
///
/// Every field is optional; an empty filter matches every sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleFilter {
    /// Substring of the sale number or the prescription number.
    pub search: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    /// Inclusive lower bound on `sale_date`.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `sale_date`.
    pub date_to: Option<DateTime<Utc>>,
    pub has_prescription: Option<bool>,
    /// Defaults to 50, capped at 500.
    pub limit: Option<u32>,
}

/// Aggregates over the sales matching a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub count: i64,
    pub total_cents: i64,
}

impl SalesSummary {
    /// Average sale total in cents, rounded half-up; zero for no sales.
    pub fn average_cents(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            (self.total_cents + self.count / 2) / self.count
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Gets a sale by its human-readable number.
    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE sale_number = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(sale_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Lists sales newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        debug!(?filter, "Listing sales");

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM sales", SALE_COLUMNS));
        push_filter(&mut qb, filter);

        let limit = filter.limit.unwrap_or(50).min(MAX_LIST_LIMIT);
        qb.push(" ORDER BY sale_date DESC, sale_number DESC LIMIT ");
        qb.push_bind(limit);

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Counts and sums the sales matching a filter (the limit is ignored).
    pub async fn summary(&self, filter: &SaleFilter) -> DbResult<SalesSummary> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM sales",
        );
        push_filter(&mut qb, filter);

        let (count, total_cents) = qb
            .build_query_as::<(i64, i64)>()
            .fetch_one(&self.pool)
            .await?;

        Ok(SalesSummary { count, total_cents })
    }

    // =========================================================================
    // Unit-of-work operations (caller owns the transaction)
    // =========================================================================

    /// Allocates the next sale sequence for `day` (YYYYMMDD).
    ///
    /// A single upsert-and-return statement: two concurrent callers can
    /// never receive the same value, and as a write it takes SQLite's write
    /// lock for the rest of the transaction.
    pub async fn next_sequence(conn: &mut SqliteConnection, day: &str) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sale_number_sequences (day, last_value) VALUES (?1, 1)
            ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(day)
        .fetch_one(conn)
        .await?;

        debug!(day = %day, value, "Allocated sale sequence");
        Ok(value)
    }

    /// Inserts a sale row.
    pub async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, client_id, user_id,
                subtotal_cents, tax_cents, discount_cents, total_cents,
                payment_method, payment_status, has_prescription, prescription_number,
                notes, sale_date, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.client_id)
        .bind(&sale.user_id)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.payment_status)
        .bind(sale.has_prescription)
        .bind(&sale.prescription_number)
        .bind(&sale.notes)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Reads a sale on the caller's connection.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(sale)
    }

    /// Bumps `updated_at` on a sale.
    ///
    /// Used as the first statement of a line-item edit: it both checks the
    /// sale exists and takes the write lock. Returns false when there is no
    /// such sale.
    pub async fn touch(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sales SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Writes the four aggregate amounts of a sale.
    pub async fn update_totals(
        conn: &mut SqliteConnection,
        sale_id: &str,
        totals: &SaleTotals,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(
            sale_id = %sale_id,
            subtotal = totals.subtotal.cents(),
            tax = totals.tax.cents(),
            discount = totals.discount.cents(),
            total = totals.total.cents(),
            "Updating sale totals"
        );

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                subtotal_cents = ?2,
                tax_cents = ?3,
                discount_cents = ?4,
                total_cents = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .bind(totals.subtotal.cents())
        .bind(totals.tax.cents())
        .bind(totals.discount.cents())
        .bind(totals.total.cents())
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Updates payment status and notes. Returns false when there is no
    /// such sale.
    pub async fn update_details(
        conn: &mut SqliteConnection,
        sale_id: &str,
        payment_status: PaymentStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(sale_id = %sale_id, status = payment_status.as_str(), "Updating sale details");

        let result = sqlx::query(
            "UPDATE sales SET payment_status = ?2, notes = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(sale_id)
        .bind(payment_status)
        .bind(notes)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // -------------------------------------------------------------------------
    // Line items
    // -------------------------------------------------------------------------

    /// Inserts a line item.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &SaleLineItem) -> DbResult<()> {
        debug!(
            sale_id = %item.sale_id,
            product_id = %item.product_id,
            quantity = item.quantity(),
            "Inserting sale item"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, position, quantity,
                unit_price_cents, total_price_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(item.position)
        .bind(item.quantity())
        .bind(item.unit_price().cents())
        .bind(item.total_price().cents())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Line items of a sale in insertion order, on the caller's connection.
    pub async fn items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleLineItem>> {
        let sql = format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY position",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleLineItem>(&sql)
            .bind(sale_id)
            .fetch_all(conn)
            .await?;

        Ok(items)
    }

    /// Reads one line item.
    pub async fn find_item(
        conn: &mut SqliteConnection,
        item_id: &str,
    ) -> DbResult<Option<SaleLineItem>> {
        let sql = format!("SELECT {} FROM sale_items WHERE id = ?1", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, SaleLineItem>(&sql)
            .bind(item_id)
            .fetch_optional(conn)
            .await?;

        Ok(item)
    }

    /// Returns the sale id of a line item while bumping its `updated_at`.
    ///
    /// First statement of a line edit: takes the write lock and resolves
    /// the owning sale in one step.
    pub async fn touch_item(
        conn: &mut SqliteConnection,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        let sale_id: Option<String> = sqlx::query_scalar(
            "UPDATE sale_items SET updated_at = ?2 WHERE id = ?1 RETURNING sale_id",
        )
        .bind(item_id)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(sale_id)
    }

    /// Position for the next line appended to a sale.
    pub async fn next_position(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<i64> {
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM sale_items WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_one(conn)
        .await?;

        Ok(position)
    }

    pub async fn count_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_items WHERE sale_id = ?1")
            .bind(sale_id)
            .fetch_one(conn)
            .await?;

        Ok(count)
    }

    /// Persists a re-quantified line (quantity and derived total together).
    pub async fn update_item_quantity(
        conn: &mut SqliteConnection,
        item: &SaleLineItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE sale_items SET
                quantity = ?2,
                total_price_cents = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&item.id)
        .bind(item.quantity())
        .bind(item.total_price().cents())
        .bind(item.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn delete_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sale_items WHERE id = ?1")
            .bind(item_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Appends the WHERE clause shared by `list` and `summary`.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SaleFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", search);
        qb.push(" AND (sale_number LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR prescription_number LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    if let Some(status) = filter.payment_status {
        qb.push(" AND payment_status = ");
        qb.push_bind(status);
    }

    if let Some(from) = filter.date_from {
        qb.push(" AND sale_date >= ");
        qb.push_bind(from);
    }

    if let Some(to) = filter.date_to {
        qb.push(" AND sale_date <= ");
        qb.push_bind(to);
    }

    if let Some(flag) = filter.has_prescription {
        qb.push(" AND has_prescription = ");
        qb.push_bind(flag);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::TimeZone;
    use pharma_core::{PaymentMethod, Role, User};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users()
            .insert(&User {
                id: "u-1".to_string(),
                name: "Pharmacist".to_string(),
                email: "ph@pharma.test".to_string(),
                password_hash: "x".to_string(),
                role: Role::Pharmacist,
                is_active: true,
                created_at: at(8),
                updated_at: at(8),
            })
            .await
            .unwrap();
        db
    }

    fn sale(number: &str, total: i64, status: PaymentStatus, date: DateTime<Utc>) -> Sale {
        Sale {
            id: uuid::Uuid::new_v4().to_string(),
            sale_number: number.to_string(),
            client_id: None,
            user_id: "u-1".to_string(),
            subtotal_cents: total,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: total,
            payment_method: PaymentMethod::Cash,
            payment_status: status,
            has_prescription: false,
            prescription_number: None,
            notes: None,
            sale_date: date,
            created_at: date,
            updated_at: date,
        }
    }

    #[tokio::test]
    async fn test_sequence_is_per_day() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut seen = Vec::new();
        for day in ["20260301", "20260301", "20260302", "20260301"] {
            let next = SaleRepository::next_sequence(&mut conn, day).await.unwrap();
            seen.push(next);
        }
        assert_eq!(seen, vec![1, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_insert_sale_and_read_back() {
        let db = setup().await;
        let s = sale("VTE-20260301-0001", 3000, PaymentStatus::Paid, at(9));

        let mut tx = db.begin().await.unwrap();
        SaleRepository::insert_sale(&mut tx, &s).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = db.sales().get_by_id(&s.id).await.unwrap().unwrap();
        assert_eq!(loaded.sale_number, "VTE-20260301-0001");
        assert_eq!(loaded.payment_method, PaymentMethod::Cash);
        assert_eq!(loaded.sale_date, at(9));

        let by_number = db.sales().get_by_number("VTE-20260301-0001").await.unwrap();
        assert!(by_number.is_some());
    }

    #[tokio::test]
    async fn test_list_filters_and_summary() {
        let db = setup().await;
        let mut tx = db.begin().await.unwrap();
        for s in [
            sale("VTE-20260301-0001", 1000, PaymentStatus::Paid, at(9)),
            sale("VTE-20260301-0002", 2000, PaymentStatus::Pending, at(10)),
            sale("VTE-20260301-0003", 3001, PaymentStatus::Paid, at(11)),
        ] {
            SaleRepository::insert_sale(&mut tx, &s).await.unwrap();
        }
        tx.commit().await.unwrap();

        let all = db.sales().list(&SaleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].sale_number, "VTE-20260301-0003");

        let paid = SaleFilter {
            payment_status: Some(PaymentStatus::Paid),
            ..SaleFilter::default()
        };
        assert_eq!(db.sales().list(&paid).await.unwrap().len(), 2);

        let summary = db.sales().summary(&paid).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_cents, 4001);
        assert_eq!(summary.average_cents(), 2001);

        let search = SaleFilter {
            search: Some("0002".to_string()),
            ..SaleFilter::default()
        };
        let found = db.sales().list(&search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].total_cents, 2000);

        let window = SaleFilter {
            date_from: Some(at(10)),
            date_to: Some(at(10)),
            ..SaleFilter::default()
        };
        assert_eq!(db.sales().list(&window).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let db = setup().await;
        let summary = db.sales().summary(&SaleFilter::default()).await.unwrap();
        assert_eq!(summary, SalesSummary::default());
        assert_eq!(summary.average_cents(), 0);
    }
}
