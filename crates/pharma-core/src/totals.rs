//! # Sale Totals
//!
//! The arithmetic behind the transaction total engine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line totals ──Σ──► subtotal ──× rate (half-up)──► tax                  │
//! │                                                                         │
//! │  total = subtotal + tax − discount          (never below zero)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persistence lives in pharma-services; this module only does the math so
//! it can be tested without a database.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRate;

/// The four aggregate amounts stored on a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Derives totals from line totals, clamping the discount to
    /// `subtotal + tax`.
    ///
    /// Used on recomputation, where the discount was accepted against a
    /// larger sale and a line has since been removed or reduced. Compare
    /// `result.discount` with the requested discount to detect the clamp.
    ///
    /// ## Errors
    /// `AmountOutOfRange` when the subtotal or tax overflows.
    pub fn compute<I>(line_totals: I, rate: TaxRate, discount: Money) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let subtotal =
            Money::checked_sum(line_totals).ok_or(CoreError::AmountOutOfRange("subtotal"))?;
        let tax = subtotal
            .checked_tax(rate)
            .ok_or(CoreError::AmountOutOfRange("tax"))?;
        let gross = subtotal
            .checked_add(tax)
            .ok_or(CoreError::AmountOutOfRange("total"))?;
        let discount = discount.max(Money::zero()).min(gross);

        Ok(SaleTotals {
            subtotal,
            tax,
            discount,
            total: gross - discount,
        })
    }

    /// Same as [`SaleTotals::compute`] but rejects an oversized discount.
    ///
    /// Used when a sale is first recorded.
    pub fn compute_strict<I>(line_totals: I, rate: TaxRate, discount: Money) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let totals = Self::compute(line_totals, rate, discount)?;
        if totals.discount != discount {
            return Err(CoreError::DiscountExceedsTotal {
                discount_cents: discount.cents(),
                total_cents: totals.gross().cents(),
            });
        }
        Ok(totals)
    }

    /// Subtotal plus tax, before discount.
    #[inline]
    pub fn gross(&self) -> Money {
        self.subtotal + self.tax
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
