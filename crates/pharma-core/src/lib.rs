//! # pharma-core: Pure Business Logic for the Pharmacy Back-Office
//!
//! This crate holds the rules of the back-office as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pharmacy Back-Office Architecture                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                apps/backoffice (process shell)                  │   │
//! │  │     config ──► tracing ──► database ──► cleanup loop            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pharma-services                              │   │
//! │  │        SalesEngine, ResetCodeService, RateLimiter, Notifier     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ pharma-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │reset_code │  │   │
//! │  │   │  Product  │  │   Money   │  │ SaleTotals│  │  policy   │  │   │
//! │  │   │   Sale    │  │  TaxRate  │  │  discount │  │  codes    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pharma-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleLineItem, User, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`totals`] - Subtotal / tax / discount / total derivation
//! - [`sale_number`] - `PREFIX-YYYYMMDD-NNNN` formatting
//! - [`reset_code`] - Reset-code generation and policy
//! - [`password`] - Argon2 hashing
//! - [`clock`] - Injectable time source
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use pharma_core::money::Money;
//! use pharma_core::totals::SaleTotals;
//! use pharma_core::types::TaxRate;
//!
//! let lines = [Money::from_cents(2000), Money::from_cents(500)];
//! let totals = SaleTotals::compute(lines, TaxRate::from_bps(2000), Money::zero()).unwrap();
//!
//! assert_eq!(totals.subtotal.cents(), 2500);
//! assert_eq!(totals.tax.cents(), 500);
//! assert_eq!(totals.total.cents(), 3000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod error;
pub mod money;
pub mod password;
pub mod reset_code;
pub mod sale_number;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reset_code::{CleanupReport, IssuedResetCode, ResetCodePolicy};
pub use totals::SaleTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of line items on a single sale.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest selling price a product may carry, in cents (1 000 000.00).
///
/// With at most 999 units per line and 100 lines per sale, every line
/// total, subtotal and tax stays far inside i64.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Standard tax rate applied to sales (20%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 2000;

/// Prefix of generated sale numbers.
pub const DEFAULT_SALE_PREFIX: &str = "VTE";
