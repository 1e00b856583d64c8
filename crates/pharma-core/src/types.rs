//! # Domain Types
//!
//! Core domain types used throughout the back-office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  SaleLineItem   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  sale_number    │   │  sale_id (FK)   │       │
//! │  │  selling_price  │   │  subtotal/tax   │   │  unit_price     │       │
//! │  │  stock_quantity │   │  discount/total │   │  total_price    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ PaymentMethod   │   │ PaymentStatus   │   │PasswordResetCode│       │
//! │  │  Cash, Card     │   │  Paid           │   │  email, code    │       │
//! │  │  Insurance      │   │  Pending        │   │  expires_at     │       │
//! │  │  Other          │   │  Failed         │   │  used           │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Records carry a UUID `id` for relations and, where people need one, a
//! human-readable business key (`sku`, `sale_number`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::totals::SaleTotals;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so the standard pharmacy rate of 20% is 2000 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// Only the fields the sale engine reads are modelled here; catalogue
/// details (category, supplier, expiry) belong to the inventory screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Strength/form shown next to the name (e.g. "500 mg").
    pub dosage: Option<String>,
    /// Current selling price in cents.
    pub selling_price_cents: i64,
    /// Units on hand. Never negative.
    pub stock_quantity: i64,
    pub prescription_required: bool,
    /// Whether the product can still be sold (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Checks whether `quantity` units can be taken from stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock_quantity >= quantity
    }

    /// Units missing to satisfy `quantity` (zero when stock suffices).
    pub fn shortfall(&self, quantity: i64) -> i64 {
        (quantity - self.stock_quantity).max(0)
    }
}

// =============================================================================
// Payment Method / Status
// =============================================================================

/// How the client paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Paid (fully or partly) by the client's health insurance.
    Insurance,
    Other,
}

/// Settlement state of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale transaction.
///
/// The four monetary aggregates are owned by the total engine: they are
/// rewritten together whenever a line item changes and are never edited
/// one at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Human-readable number, `PREFIX-YYYYMMDD-NNNN`.
    pub sale_number: String,
    pub client_id: Option<String>,
    /// Pharmacist who recorded the sale.
    pub user_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub has_prescription: bool,
    pub prescription_number: Option<String>,
    pub notes: Option<String>,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// The stored aggregates as a [`SaleTotals`] value.
    pub fn totals(&self) -> SaleTotals {
        SaleTotals {
            subtotal: Money::from_cents(self.subtotal_cents),
            tax: Money::from_cents(self.tax_cents),
            discount: Money::from_cents(self.discount_cents),
            total: Money::from_cents(self.total_cents),
        }
    }
}

// =============================================================================
// Sale Line Item
// =============================================================================

/// One product/quantity/price entry of a sale.
///
/// ## Snapshot Pattern
/// `unit_price_cents` is copied from the product when the line is created.
/// A later price change on the product never reaches existing lines.
///
/// `total_price_cents` is always `quantity × unit_price_cents`; the fields
/// that feed it are private so it cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLineItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Insertion order within the sale (1-based).
    pub position: i64,
    quantity: i64,
    unit_price_cents: i64,
    total_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleLineItem {
    /// Creates a line with a fresh UUID and a derived total.
    ///
    /// Fails with `AmountOutOfRange` if `quantity × unit_price` overflows.
    pub fn new(
        sale_id: impl Into<String>,
        product_id: impl Into<String>,
        position: i64,
        quantity: i64,
        unit_price: Money,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let total = line_total(unit_price, quantity)?;
        Ok(SaleLineItem {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: sale_id.into(),
            product_id: product_id.into(),
            position,
            quantity,
            unit_price_cents: unit_price.cents(),
            total_price_cents: total.cents(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Changes the quantity and re-derives the line total.
    ///
    /// Leaves the line untouched on overflow.
    pub fn set_quantity(&mut self, quantity: i64, now: DateTime<Utc>) -> CoreResult<()> {
        let total = line_total(self.unit_price(), quantity)?;
        self.quantity = quantity;
        self.total_price_cents = total.cents();
        self.updated_at = now;
        Ok(())
    }

    #[inline]
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

fn line_total(unit_price: Money, quantity: i64) -> CoreResult<Money> {
    unit_price
        .checked_multiply_quantity(quantity)
        .ok_or(CoreError::AmountOutOfRange("line total"))
}

// =============================================================================
// Users
// =============================================================================

/// Back-office role. A closed set: the authorization layer matches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Pharmacist,
}

/// A back-office account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Password Reset Code
// =============================================================================

/// A short-lived numeric credential authorizing one password change.
///
/// Not owned by [`User`]: it is keyed by the email string only.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PasswordResetCode {
    pub id: i64,
    pub email: String,
    /// Six ASCII digits, zero-padded.
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    /// Wrong guesses recorded against this code while it was active.
    pub failed_attempts: i64,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetCode {
    /// Unused and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

impl fmt::Debug for PasswordResetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetCode")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("code", &"******")
            .field("expires_at", &self.expires_at)
            .field("used", &self.used)
            .field("failed_attempts", &self.failed_attempts)
            .field("created_at", &self.created_at)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            sku: "DOLI-500".to_string(),
            name: "Doliprane".to_string(),
            dosage: Some("500 mg".to_string()),
            selling_price_cents: 250,
            stock_quantity: stock,
            prescription_required: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tax_rate_default_is_twenty_percent() {
        assert_eq!(TaxRate::default().bps(), 2000);
    }

    #[test]
    fn test_product_can_sell() {
        let p = product(5);
        assert!(p.can_sell(5));
        assert!(!p.can_sell(6));
        assert_eq!(p.shortfall(8), 3);
        assert_eq!(p.shortfall(2), 0);

        let inactive = Product {
            is_active: false,
            ..product(10)
        };
        assert!(!inactive.can_sell(1));
    }

    #[test]
    fn test_line_item_total_is_derived() {
        let now = Utc::now();
        let mut item =
            SaleLineItem::new("s-1", "p-1", 1, 2, Money::from_cents(1000), now).unwrap();
        assert_eq!(item.total_price().cents(), 2000);

        item.set_quantity(3, now).unwrap();
        assert_eq!(item.quantity(), 3);
        assert_eq!(item.total_price().cents(), 3000);
        assert_eq!(item.unit_price().cents(), 1000);
    }

    #[test]
    fn test_line_item_overflow_is_an_error() {
        let now = Utc::now();
        let huge = Money::from_cents(i64::MAX / 2);
        let err = SaleLineItem::new("s-1", "p-1", 1, 3, huge, now).unwrap_err();
        assert!(matches!(err, CoreError::AmountOutOfRange("line total")));

        let mut item = SaleLineItem::new("s-1", "p-1", 1, 1, huge, now).unwrap();
        assert!(item.set_quantity(3, now).is_err());
        assert_eq!(item.quantity(), 1);
        assert_eq!(item.total_price(), huge);
    }

    #[test]
    fn test_payment_enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Insurance).unwrap(),
            "\"insurance\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn test_reset_code_activity_and_redaction() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let code = PasswordResetCode {
            id: 1,
            email: "a@pharma.test".to_string(),
            code: "012345".to_string(),
            expires_at: now + Duration::minutes(10),
            used: false,
            failed_attempts: 0,
            created_at: now,
        };
        assert!(code.is_active(now));
        assert!(!code.is_active(now + Duration::minutes(10)));
        assert!(!format!("{:?}", code).contains("012345"));
    }
}
