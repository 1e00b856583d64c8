//! # Product Repository
//!
//! Database operations for products, focused on what a sale needs:
//! lookup, price snapshot and stock movement.
//!
//! ## Conditional Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, check in Rust, write absolute value               │
//! │     SELECT stock_quantity ...  → 5                                  │
//! │     UPDATE products SET stock_quantity = 2 ...                      │
//! │     (two sellers both read 5 and both succeed)                      │
//! │                                                                     │
//! │  ✅ CORRECT: check and decrement in one statement                   │
//! │     UPDATE products SET stock_quantity = stock_quantity - 3         │
//! │     WHERE id = ? AND stock_quantity >= 3                            │
//! │     rows_affected = 0 → not enough stock                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharma_core::validation::validate_price_cents;
use pharma_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, dosage, selling_price_cents, stock_quantity,
    prescription_required, is_active, created_at, updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_id(&product_id).await?;
///
/// // Inside a unit of work
/// let mut tx = db.begin().await?;
/// let ok = ProductRepository::decrement_stock(&mut tx, &product.id, 3, now).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Counts all products (active or not).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    /// * `Err(DbError::CheckViolation)` - price outside `0..=MAX_PRICE_CENTS`
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");
        check_price(product.selling_price_cents)?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, dosage, selling_price_cents, stock_quantity,
                prescription_required, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.dosage)
        .bind(product.selling_price_cents)
        .bind(product.stock_quantity)
        .bind(product.prescription_required)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes the selling price. Existing sale lines keep their snapshot.
    pub async fn update_price(
        &self,
        id: &str,
        price_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, price_cents, "Updating product price");
        check_price(price_cents)?;

        let result = sqlx::query(
            "UPDATE products SET selling_price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Withdraws a product from sale (or puts it back). Past sales keep
    /// their lines.
    pub async fn set_active(&self, id: &str, active: bool, now: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %id, active, "Setting product active flag");

        let result =
            sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(active)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // =========================================================================
    // Unit-of-work operations (caller owns the transaction)
    // =========================================================================

    /// Reads a product on the caller's connection.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(product)
    }

    /// Takes `quantity` units from stock if, and only if, enough remain.
    ///
    /// ## Returns
    /// * `Ok(true)` - stock decremented
    /// * `Ok(false)` - not enough stock (or no such product); nothing changed
    pub async fn decrement_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, quantity, "Decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_quantity >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Puts `quantity` units back on the shelf.
    pub async fn increment_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, quantity, "Restocking");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

fn check_price(cents: i64) -> DbResult<()> {
    validate_price_cents(cents).map_err(|e| DbError::CheckViolation {
        message: e.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn product(sku: &str, stock: i64) -> Product {
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            dosage: None,
            selling_price_cents: 450,
            stock_quantity: stock,
            prescription_required: false,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let p = product("AMOX-1G", 12);
        repo.insert(&p).await.unwrap();

        let by_id = repo.get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "AMOX-1G");
        assert_eq!(by_id.stock_quantity, 12);
        assert_eq!(by_id.created_at, now());

        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_unique_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&product("DUP", 1)).await.unwrap();

        let err = repo.insert(&product("DUP", 1)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_decrement_is_conditional() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product("IBU-400", 5);
        db.products().insert(&p).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let taken = ProductRepository::decrement_stock(&mut tx, &p.id, 3, now())
            .await
            .unwrap();
        assert!(taken);
        let taken = ProductRepository::decrement_stock(&mut tx, &p.id, 3, now())
            .await
            .unwrap();
        assert!(!taken);
        ProductRepository::increment_stock(&mut tx, &p.id, 1, now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stock = db
            .products()
            .get_by_id(&p.id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity;
        assert_eq!(stock, 3);
    }

    #[tokio::test]
    async fn test_price_bounds_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let overpriced = Product {
            selling_price_cents: i64::MAX / 2,
            ..product("GOLD", 1)
        };
        let err = repo.insert(&overpriced).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
        assert_eq!(repo.count().await.unwrap(), 0);

        let p = product("OK", 1);
        repo.insert(&p).await.unwrap();
        let err = repo.update_price(&p.id, -1, now()).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
        let err = repo
            .update_price(&p.id, pharma_core::MAX_PRICE_CENTS + 1, now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        repo.update_price(&p.id, pharma_core::MAX_PRICE_CENTS, now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_schema_rejects_out_of_range_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product("RAW", 1);
        db.products().insert(&p).await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let err = sqlx::query("UPDATE products SET selling_price_cents = ?1 WHERE id = ?2")
            .bind(i64::MAX / 2)
            .bind(&p.id)
            .execute(&mut *conn)
            .await
            .unwrap_err();
        assert!(matches!(DbError::from(err), DbError::CheckViolation { .. }));
    }
}
