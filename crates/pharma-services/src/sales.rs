//! # Sales Engine
//!
//! Records sales and keeps their four aggregates in step with the lines.
//!
//! ## Recording a Sale
//! ```text
//! record_sale(NewSale)
//!   │
//!   │  BEGIN
//!   ├── next_sequence(day)            ← first write, takes the lock
//!   ├── insert sale shell (totals 0)
//!   ├── for each line:
//!   │     find product                → InvalidProductReference
//!   │     decrement_stock (if ≥ qty)  → InsufficientStock
//!   │     insert line at current price
//!   ├── check discount ≤ subtotal+tax → DiscountExceedsTotal
//!   ├── apply_line_item_change
//!   │  COMMIT
//!   ▼
//! SaleDetails { sale, items }
//! ```
//!
//! Any `?` between BEGIN and COMMIT drops the transaction, which rolls back
//! the sale number, the shell, every line and every stock movement.
//!
//! ## Totals Ownership
//! Every operation that changes a line ends with an explicit
//! [`SalesEngine::apply_line_item_change`] on the same transaction. No
//! other code writes the aggregates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pharma_core::sale_number::{format_sale_number, sequence_day};
use pharma_core::validation::{
    validate_discount_cents, validate_line_count, validate_prescription_number, validate_quantity,
    validate_sale_prefix, validate_tax_rate_bps,
};
use pharma_core::{
    Clock, CoreError, Money, PaymentMethod, PaymentStatus, Product, Sale, SaleLineItem, SaleTotals,
    SystemClock, TaxRate, DEFAULT_SALE_PREFIX,
};
use pharma_db::{
    Database, DbError, ProductRepository, SaleFilter, SaleRepository, SalesSummary,
    SqliteConnection,
};

use crate::error::ServiceResult;

// =============================================================================
// Requests and Responses
// =============================================================================

/// One requested line of a new sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything needed to record a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub client_id: Option<String>,
    /// Pharmacist recording the sale.
    pub user_id: String,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewSaleItem>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub has_prescription: bool,
    pub prescription_number: Option<String>,
    pub notes: Option<String>,
}

/// Fields editable after recording. Totals are not among them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleUpdate {
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
}

/// A sale with its lines in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDetails {
    pub sale: Sale,
    pub items: Vec<SaleLineItem>,
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesConfig {
    pub tax_rate: TaxRate,
    /// First segment of every sale number.
    pub sale_prefix: String,
}

impl Default for SalesConfig {
    fn default() -> Self {
        SalesConfig {
            tax_rate: TaxRate::default(),
            sale_prefix: DEFAULT_SALE_PREFIX.to_string(),
        }
    }
}

impl SalesConfig {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_tax_rate_bps(self.tax_rate.bps())?;
        validate_sale_prefix(&self.sale_prefix)?;
        Ok(())
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Transaction total engine. Cheap to clone.
#[derive(Clone)]
pub struct SalesEngine {
    db: Database,
    clock: Arc<dyn Clock>,
    config: SalesConfig,
}

impl SalesEngine {
    pub fn new(db: Database, config: SalesConfig) -> Self {
        SalesEngine {
            db,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.config.tax_rate
    }

    /// Recomputes and stores the aggregates of one sale from its lines.
    ///
    /// Runs on the caller's connection so it sees the caller's uncommitted
    /// line changes. The stored discount is kept unless it now exceeds
    /// `subtotal + tax`, in which case it is lowered to that amount.
    pub async fn apply_line_item_change(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> ServiceResult<SaleTotals> {
        let sale = SaleRepository::find(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = SaleRepository::items(conn, sale_id).await?;

        let requested = sale.discount();
        let totals = SaleTotals::compute(
            items.iter().map(SaleLineItem::total_price),
            self.config.tax_rate,
            requested,
        )?;

        if totals.discount != requested {
            warn!(
                sale_id = %sale_id,
                requested_cents = requested.cents(),
                applied_cents = totals.discount.cents(),
                "Discount clamped to sale total"
            );
        }

        SaleRepository::update_totals(conn, sale_id, &totals, self.clock.now())
            .await?;

        debug!(
            sale_id = %sale_id,
            lines = items.len(),
            subtotal = totals.subtotal.cents(),
            tax = totals.tax.cents(),
            total = totals.total.cents(),
            "Sale totals recomputed"
        );

        Ok(totals)
    }

    /// Records a paid sale atomically.
    ///
    /// ## Errors
    /// - `Validation` - bad quantity, line count, discount or prescription number
    /// - `InvalidProductReference` - unknown or inactive product
    /// - `InsufficientStock` - a line asks for more than is on the shelf
    /// - `DiscountExceedsTotal` - discount larger than subtotal plus tax
    pub async fn record_sale(&self, new_sale: NewSale) -> ServiceResult<SaleDetails> {
        validate_line_count(new_sale.items.len())?;
        for item in &new_sale.items {
            validate_quantity(item.quantity)?;
        }
        validate_discount_cents(new_sale.discount_cents)?;
        validate_prescription_number(new_sale.prescription_number.as_deref())?;

        let now = self.clock.now();
        let day = sequence_day(now);

        let mut tx = self.db.begin().await?;

        let sequence = SaleRepository::next_sequence(&mut tx, &day).await?;
        let sale_number = format_sale_number(&self.config.sale_prefix, &day, sequence);

        let sale = Sale {
            id: uuid_v4(),
            sale_number,
            client_id: new_sale.client_id,
            user_id: new_sale.user_id,
            subtotal_cents: 0,
            tax_cents: 0,
            discount_cents: new_sale.discount_cents,
            total_cents: 0,
            payment_method: new_sale.payment_method,
            payment_status: PaymentStatus::Paid,
            has_prescription: new_sale.has_prescription,
            prescription_number: new_sale.prescription_number,
            notes: new_sale.notes,
            sale_date: now,
            created_at: now,
            updated_at: now,
        };
        SaleRepository::insert_sale(&mut tx, &sale).await?;

        let mut lines = Vec::with_capacity(new_sale.items.len());
        for (index, requested) in new_sale.items.iter().enumerate() {
            let product =
                Self::take_stock(&mut tx, &requested.product_id, requested.quantity, now)
                    .await?;
            let position = index as i64 + 1;
            let line = SaleLineItem::new(
                &sale.id,
                &product.id,
                position,
                requested.quantity,
                product.selling_price(),
                now,
            )?;
            SaleRepository::insert_item(&mut tx, &line).await?;
            lines.push(line);
        }

        SaleTotals::compute_strict(
            lines.iter().map(SaleLineItem::total_price),
            self.config.tax_rate,
            Money::from_cents(new_sale.discount_cents),
        )?;

        let totals = self.apply_line_item_change(&mut tx, &sale.id).await?;
        let details = Self::load_details(&mut tx, &sale.id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_number = %details.sale.sale_number,
            lines = details.items.len(),
            total = totals.total.cents(),
            "Sale recorded"
        );

        Ok(details)
    }

    /// Appends a line to an existing sale at the product's current price.
    pub async fn add_line_item(
        &self,
        sale_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> ServiceResult<SaleDetails> {
        validate_quantity(quantity)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        if !SaleRepository::touch(&mut tx, sale_id, now).await? {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }

        let existing = SaleRepository::count_items(&mut tx, sale_id).await?;
        validate_line_count(existing as usize + 1)?;

        let product = Self::take_stock(&mut tx, product_id, quantity, now).await?;
        let position = SaleRepository::next_position(&mut tx, sale_id).await?;
        let line = SaleLineItem::new(
            sale_id,
            &product.id,
            position,
            quantity,
            product.selling_price(),
            now,
        )?;
        SaleRepository::insert_item(&mut tx, &line).await?;

        self.apply_line_item_change(&mut tx, sale_id).await?;
        let details = Self::load_details(&mut tx, sale_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(sale_id = %sale_id, item_id = %line.id, quantity, "Line item added");
        Ok(details)
    }

    /// Changes a line's quantity, moving stock by the difference.
    ///
    /// The line keeps its original unit price.
    pub async fn update_line_item_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> ServiceResult<SaleDetails> {
        validate_quantity(quantity)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let sale_id = SaleRepository::touch_item(&mut tx, item_id, now)
            .await?
            .ok_or_else(|| CoreError::LineItemNotFound(item_id.to_string()))?;
        let mut item = SaleRepository::find_item(&mut tx, item_id)
            .await?
            .ok_or_else(|| CoreError::LineItemNotFound(item_id.to_string()))?;

        let delta = quantity - item.quantity();
        if delta > 0 {
            Self::take_stock(&mut tx, &item.product_id, delta, now)
                .await?;
        } else if delta < 0 {
            ProductRepository::increment_stock(&mut tx, &item.product_id, -delta, now)
                .await?;
        }

        item.set_quantity(quantity, now)?;
        SaleRepository::update_item_quantity(&mut tx, &item).await?;

        self.apply_line_item_change(&mut tx, &sale_id).await?;
        let details = Self::load_details(&mut tx, &sale_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_id = %sale_id,
            item_id = %item_id,
            quantity,
            delta,
            "Line item quantity changed"
        );
        Ok(details)
    }

    /// Deletes a line and puts its quantity back on the shelf.
    ///
    /// A sale keeps at least one line: removing the last one is refused.
    pub async fn remove_line_item(&self, item_id: &str) -> ServiceResult<SaleDetails> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let sale_id = SaleRepository::touch_item(&mut tx, item_id, now)
            .await?
            .ok_or_else(|| CoreError::LineItemNotFound(item_id.to_string()))?;

        if SaleRepository::count_items(&mut tx, &sale_id).await? <= 1 {
            return Err(CoreError::EmptySale(sale_id).into());
        }

        let item = SaleRepository::find_item(&mut tx, item_id)
            .await?
            .ok_or_else(|| CoreError::LineItemNotFound(item_id.to_string()))?;
        ProductRepository::increment_stock(&mut tx, &item.product_id, item.quantity(), now)
            .await?;
        SaleRepository::delete_item(&mut tx, item_id).await?;

        self.apply_line_item_change(&mut tx, &sale_id).await?;
        let details = Self::load_details(&mut tx, &sale_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_id = %sale_id,
            item_id = %item_id,
            restocked = item.quantity(),
            "Line item removed"
        );
        Ok(details)
    }

    /// Updates payment status and notes. Leaves totals alone.
    pub async fn update_sale(&self, sale_id: &str, update: SaleUpdate) -> ServiceResult<Sale> {
        let now = self.clock.now();

        let mut conn = self.db.acquire().await?;
        let updated = SaleRepository::update_details(
            &mut conn,
            sale_id,
            update.payment_status,
            update.notes.as_deref(),
            now,
        )
        .await?;
        if !updated {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }

        let sale = SaleRepository::find(&mut conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        info!(sale_id = %sale_id, status = update.payment_status.as_str(), "Sale updated");
        Ok(sale)
    }

    pub async fn get_sale(&self, sale_id: &str) -> ServiceResult<SaleDetails> {
        let mut conn = self.db.acquire().await?;
        Self::load_details(&mut conn, sale_id).await
    }

    pub async fn list_sales(&self, filter: &SaleFilter) -> ServiceResult<Vec<Sale>> {
        Ok(self.db.sales().list(filter).await?)
    }

    pub async fn sales_summary(&self, filter: &SaleFilter) -> ServiceResult<SalesSummary> {
        Ok(self.db.sales().summary(filter).await?)
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Resolves a sellable product and takes `quantity` off its stock.
    async fn take_stock(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<Product> {
        let product = ProductRepository::find(conn, product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::InvalidProductReference(product_id.to_string()))?;

        if !ProductRepository::decrement_stock(conn, product_id, quantity, now)
            .await?
        {
            warn!(
                product_id = %product_id,
                available = product.stock_quantity,
                requested = quantity,
                "Insufficient stock"
            );
            return Err(CoreError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                available: product.stock_quantity,
                requested: quantity,
            }
            .into());
        }

        Ok(product)
    }

    async fn load_details(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> ServiceResult<SaleDetails> {
        let sale = SaleRepository::find(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = SaleRepository::items(conn, sale_id).await?;
        Ok(SaleDetails { sale, items })
    }
}

fn uuid_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use chrono::TimeZone;
    use pharma_core::{ManualClock, Role, User, ValidationError};
    use pharma_db::DbConfig;

    const USER_ID: &str = "user-1";

    struct Fixture {
        db: Database,
        engine: SalesEngine,
        clock: Arc<ManualClock>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let engine = SalesEngine::new(db.clone(), SalesConfig::default()).with_clock(clock.clone());

        db.users()
            .insert(&User {
                id: USER_ID.to_string(),
                name: "Pharmacist".to_string(),
                email: "pharmacist@pharma.test".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Pharmacist,
                is_active: true,
                created_at: start(),
                updated_at: start(),
            })
            .await
            .unwrap();

        Fixture { db, engine, clock }
    }

    async fn product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        let product = Product {
            id: uuid_v4(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            dosage: None,
            selling_price_cents: price_cents,
            stock_quantity: stock,
            prescription_required: false,
            is_active: true,
            created_at: start(),
            updated_at: start(),
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    fn new_sale(items: &[(&str, i64)], discount_cents: i64) -> NewSale {
        NewSale {
            client_id: None,
            user_id: USER_ID.to_string(),
            payment_method: PaymentMethod::Cash,
            items: items
                .iter()
                .map(|(id, qty)| NewSaleItem {
                    product_id: id.to_string(),
                    quantity: *qty,
                })
                .collect(),
            discount_cents,
            has_prescription: false,
            prescription_number: None,
            notes: None,
        }
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products()
            .get_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    fn assert_consistent(details: &SaleDetails) {
        let subtotal: i64 = details.items.iter().map(|i| i.total_price().cents()).sum();
        let sale = &details.sale;
        assert_eq!(sale.subtotal_cents, subtotal);
        let tax = Money::from_cents(subtotal)
            .checked_tax(TaxRate::default())
            .unwrap();
        assert_eq!(sale.tax_cents, tax.cents());
        assert_eq!(
            sale.total_cents,
            sale.subtotal_cents + sale.tax_cents - sale.discount_cents
        );
    }

    #[tokio::test]
    async fn test_record_sale_computes_totals() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;
        let b = product(&f.db, "B", 500, 10).await;

        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 2), (&b.id, 1)], 0))
            .await
            .unwrap();

        assert_eq!(details.sale.subtotal_cents, 2500);
        assert_eq!(details.sale.tax_cents, 500);
        assert_eq!(details.sale.total_cents, 3000);
        assert_eq!(details.sale.payment_status, PaymentStatus::Paid);
        assert_eq!(details.sale.sale_number, "VTE-20260301-0001");
        assert_eq!(details.items.len(), 2);
        assert_eq!(details.items[0].position, 1);
        assert_eq!(details.items[1].position, 2);

        assert_eq!(stock_of(&f.db, &a.id).await, 8);
        assert_eq!(stock_of(&f.db, &b.id).await, 9);
    }

    #[tokio::test]
    async fn test_sale_numbers_increment_per_day() {
        let f = fixture().await;
        let a = product(&f.db, "A", 100, 100).await;

        let first = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();
        let second = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();
        f.clock.advance(chrono::Duration::days(1));
        let next_day = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();

        assert_eq!(first.sale.sale_number, "VTE-20260301-0001");
        assert_eq!(second.sale.sale_number, "VTE-20260301-0002");
        assert_eq!(next_day.sale.sale_number, "VTE-20260302-0001");
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;
        let b = product(&f.db, "B", 500, 2).await;

        let err = f
            .engine
            .record_sale(new_sale(&[(&a.id, 4), (&b.id, 3)], 0))
            .await
            .unwrap_err();

        match err {
            ServiceError::Domain(CoreError::InsufficientStock {
                product_id,
                available,
                requested,
                ..
            }) => {
                assert_eq!(product_id, b.id);
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The first line's decrement was undone and no sale exists
        assert_eq!(stock_of(&f.db, &a.id).await, 10);
        let sales = f.engine.list_sales(&SaleFilter::default()).await.unwrap();
        assert!(sales.is_empty());

        // The sale number was not burned either
        let ok = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();
        assert_eq!(ok.sale.sale_number, "VTE-20260301-0001");
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_product() {
        let f = fixture().await;
        let err = f
            .engine
            .record_sale(new_sale(&[("missing", 1)], 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::InvalidProductReference(id)) if id == "missing"
        ));

        let inactive = product(&f.db, "OLD", 100, 10).await;
        f.db
            .products()
            .set_active(&inactive.id, false, start())
            .await
            .unwrap();
        let err = f
            .engine
            .record_sale(new_sale(&[(&inactive.id, 1)], 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::InvalidProductReference(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_requests() {
        let f = fixture().await;
        let a = product(&f.db, "A", 100, 10).await;

        let empty = f.engine.record_sale(new_sale(&[], 0)).await.unwrap_err();
        assert!(matches!(
            empty.domain(),
            Some(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let zero = f
            .engine
            .record_sale(new_sale(&[(&a.id, 0)], 0))
            .await
            .unwrap_err();
        assert!(matches!(zero.domain(), Some(CoreError::Validation(_))));

        let negative = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], -1))
            .await
            .unwrap_err();
        assert!(matches!(negative.domain(), Some(CoreError::Validation(_))));

        assert_eq!(stock_of(&f.db, &a.id).await, 10);
    }

    #[tokio::test]
    async fn test_discount_applied_and_rejected_when_too_large() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;

        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 200))
            .await
            .unwrap();
        assert_eq!(details.sale.discount_cents, 200);
        assert_eq!(details.sale.total_cents, 1000 + 200 - 200);
        assert_consistent(&details);

        let err = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 1201))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::DiscountExceedsTotal {
                discount_cents: 1201,
                total_cents: 1200
            })
        ));
        assert_eq!(stock_of(&f.db, &a.id).await, 9);
    }

    #[tokio::test]
    async fn test_line_item_sequence_keeps_totals_consistent() {
        let f = fixture().await;
        let a = product(&f.db, "A", 333, 50).await;
        let b = product(&f.db, "B", 1249, 50).await;

        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();
        assert_consistent(&details);
        let sale_id = details.sale.id.clone();

        let details = f.engine.add_line_item(&sale_id, &b.id, 3).await.unwrap();
        assert_consistent(&details);
        assert_eq!(details.items.len(), 2);
        assert_eq!(details.items[1].position, 2);

        let b_line = details.items[1].id.clone();
        let details = f
            .engine
            .update_line_item_quantity(&b_line, 1)
            .await
            .unwrap();
        assert_consistent(&details);
        assert_eq!(stock_of(&f.db, &b.id).await, 49);

        let details = f
            .engine
            .update_line_item_quantity(&b_line, 5)
            .await
            .unwrap();
        assert_consistent(&details);
        assert_eq!(stock_of(&f.db, &b.id).await, 45);

        let a_line = details.items[0].id.clone();
        let details = f.engine.remove_line_item(&a_line).await.unwrap();
        assert_consistent(&details);
        assert_eq!(details.items.len(), 1);
        assert_eq!(stock_of(&f.db, &a.id).await, 50);

        let stored = f.engine.get_sale(&sale_id).await.unwrap();
        assert_eq!(stored.sale.totals(), details.sale.totals());
    }

    #[tokio::test]
    async fn test_largest_price_and_quantity_stay_in_range() {
        let f = fixture().await;
        let a = product(&f.db, "A", pharma_core::MAX_PRICE_CENTS, 2000)
            .await;

        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 999)], 0))
            .await
            .unwrap();
        assert_eq!(
            details.sale.subtotal_cents,
            pharma_core::MAX_PRICE_CENTS * 999
        );
        assert_consistent(&details);

        let details = f
            .engine
            .update_line_item_quantity(&details.items[0].id, 998)
            .await
            .unwrap();
        assert_consistent(&details);
    }

    #[tokio::test]
    async fn test_overpriced_product_never_reaches_a_sale() {
        let f = fixture().await;
        let overpriced = Product {
            id: uuid_v4(),
            sku: "GOLD".to_string(),
            name: "Gold leaf".to_string(),
            dosage: None,
            selling_price_cents: i64::MAX / 2,
            stock_quantity: 10,
            prescription_required: false,
            is_active: true,
            created_at: start(),
            updated_at: start(),
        };
        let err = f.db.products().insert(&overpriced).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        let err = f
            .engine
            .record_sale(new_sale(&[(&overpriced.id, 3)], 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::InvalidProductReference(_))
        ));
    }

    #[tokio::test]
    async fn test_existing_lines_keep_their_price() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;
        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();

        f.db
            .products()
            .update_price(&a.id, 2000, start())
            .await
            .unwrap();
        let line = details.items[0].id.clone();
        let details = f.engine.update_line_item_quantity(&line, 2).await.unwrap();

        assert_eq!(details.items[0].unit_price().cents(), 1000);
        assert_eq!(details.sale.subtotal_cents, 2000);
    }

    #[tokio::test]
    async fn test_removing_last_line_is_refused() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;
        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 2)], 0))
            .await
            .unwrap();

        let err = f
            .engine
            .remove_line_item(&details.items[0].id)
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::EmptySale(id)) if *id == details.sale.id
        ));
        assert_eq!(stock_of(&f.db, &a.id).await, 8);
    }

    #[tokio::test]
    async fn test_quantity_increase_checks_stock() {
        let f = fixture().await;
        let a = product(&f.db, "A", 100, 3).await;
        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 2)], 0))
            .await
            .unwrap();

        let err = f
            .engine
            .update_line_item_quantity(&details.items[0].id, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::InsufficientStock {
                available: 1,
                requested: 2,
                ..
            })
        ));

        let unchanged = f.engine.get_sale(&details.sale.id).await.unwrap();
        assert_eq!(unchanged.items[0].quantity(), 2);
        assert_eq!(stock_of(&f.db, &a.id).await, 1);
    }

    #[tokio::test]
    async fn test_discount_clamped_on_recompute() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;
        let b = product(&f.db, "B", 100, 10).await;

        // gross 1320, discount 1300
        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1), (&b.id, 1)], 1300))
            .await
            .unwrap();
        assert_eq!(details.sale.total_cents, 20);

        // gross drops to 120
        let details = f
            .engine
            .remove_line_item(&details.items[0].id)
            .await
            .unwrap();
        assert_eq!(details.sale.discount_cents, 120);
        assert_eq!(details.sale.total_cents, 0);
        assert_consistent(&details);
    }

    #[tokio::test]
    async fn test_missing_sale_and_line() {
        let f = fixture().await;
        let a = product(&f.db, "A", 100, 10).await;

        let err = f.engine.add_line_item("nope", &a.id, 1).await.unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SaleNotFound(_))));

        let err = f
            .engine
            .update_line_item_quantity("nope", 1)
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::LineItemNotFound(_))));

        let err = f.engine.remove_line_item("nope").await.unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::LineItemNotFound(_))));

        let err = f.engine.get_sale("nope").await.unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_sale_leaves_totals() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 10).await;
        let details = f
            .engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();

        let sale = f
            .engine
            .update_sale(
                &details.sale.id,
                SaleUpdate {
                    payment_status: PaymentStatus::Pending,
                    notes: Some("insurance claim filed".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(sale.payment_status, PaymentStatus::Pending);
        assert_eq!(sale.notes.as_deref(), Some("insurance claim filed"));
        assert_eq!(sale.totals(), details.sale.totals());

        let err = f
            .engine
            .update_sale(
                "nope",
                SaleUpdate {
                    payment_status: PaymentStatus::Paid,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_summary() {
        let f = fixture().await;
        let a = product(&f.db, "A", 1000, 100).await;

        f.engine
            .record_sale(new_sale(&[(&a.id, 1)], 0))
            .await
            .unwrap();
        f.engine
            .record_sale(new_sale(&[(&a.id, 2)], 0))
            .await
            .unwrap();

        let sales = f.engine.list_sales(&SaleFilter::default()).await.unwrap();
        assert_eq!(sales.len(), 2);

        let summary = f
            .engine
            .sales_summary(&SaleFilter::default())
            .await
            .unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_cents, 1200 + 2400);
        assert_eq!(summary.average_cents(), 1800);
    }

    #[test]
    fn test_config_validation() {
        assert!(SalesConfig::default().validate().is_ok());

        let bad_rate = SalesConfig {
            tax_rate: TaxRate::from_bps(10_001),
            ..SalesConfig::default()
        };
        assert!(bad_rate.validate().is_err());

        let bad_prefix = SalesConfig {
            sale_prefix: "V-1".to_string(),
            ..SalesConfig::default()
        };
        assert!(bad_prefix.validate().is_err());
    }
}
