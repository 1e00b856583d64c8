//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A sale is recomputed every time a line item changes. With floats the  │
//! │  subtotal drifts a little on every pass.                               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    2 × 10.00 + 1 × 5.00 = 2500 cents, every time                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharma_core::money::Money;
//!
//! let price = Money::from_major_minor(10, 0); // 10.00
//! let line = price.checked_multiply_quantity(2).unwrap(); // 20.00
//! assert_eq!((line + Money::from_cents(500)).cents(), 2500);
//! ```
//!
//! ## Overflow
//! Everything on the sale path goes through the `checked_*` methods and
//! returns `None` instead of wrapping. The plain operators are kept for
//! amounts already bounded by those checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results may go below zero before a
///   discount policy clamps them
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Fixed 2 fractional digits**: every stored amount is a whole cent
///
/// ## Where Money Flows
/// ```text
/// Product.selling_price ──► SaleLineItem.unit_price ──► SaleLineItem.total_price
///                                                              │
///                                   Σ total_price ◄────────────┘
///                                        │
///                       Sale.subtotal ──► tax (20%) ──► Sale.total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (euros and cents).
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Calculates tax on this amount, rounded half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math only: `(amount × bps + 5000) / 10000`. The +5000 is the
    /// half-cent that makes 0.5 round up. The intermediate product is i128;
    /// `None` when the result does not fit back into i64.
    ///
    /// ```rust
    /// use pharma_core::money::Money;
    /// use pharma_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(2500);      // 25.00
    /// let tax = subtotal.checked_tax(TaxRate::from_bps(2000)).unwrap(); // 20%
    /// assert_eq!(tax.cents(), 500);                // 5.00
    /// ```
    pub fn checked_tax(&self, rate: TaxRate) -> Option<Money> {
        let tax_cents = (i128::from(self.0) * i128::from(rate.bps()) + 5000) / 10000;
        i64::try_from(tax_cents).ok().map(Money)
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, `None` on overflow. An empty iterator sums to zero.
    pub fn checked_sum<I>(amounts: I) -> Option<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering (`25.00`, `-5.50`).
///
/// Currency symbols and localisation belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
