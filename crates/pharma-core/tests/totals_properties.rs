//! Property tests for sale totals under arbitrary line-item edits.
//!
//! Every generated sequence of inserts, quantity changes and deletions must
//! leave `subtotal == Σ total_price`, `tax == round(subtotal × rate)` and
//! `total == subtotal + tax − discount`, with the total never below zero.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use pharma_core::{
    Money, SaleLineItem, SaleTotals, TaxRate, MAX_ITEM_QUANTITY, MAX_LINE_ITEMS, MAX_PRICE_CENTS,
};

#[derive(Debug, Clone)]
enum Edit {
    Insert { price_cents: i64, quantity: i64 },
    SetQuantity { index: usize, quantity: i64 },
    Remove { index: usize },
}

fn quantity_strategy() -> impl Strategy<Value = i64> {
    1i64..=MAX_ITEM_QUANTITY
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (0i64..=MAX_PRICE_CENTS, quantity_strategy())
            .prop_map(|(price_cents, quantity)| Edit::Insert { price_cents, quantity }),
        2 => (any::<usize>(), quantity_strategy())
            .prop_map(|(index, quantity)| Edit::SetQuantity { index, quantity }),
        1 => any::<usize>().prop_map(|index| Edit::Remove { index }),
    ]
}

/// Half-up rounding done independently of `Money`, in i128.
fn expected_tax(subtotal: i128, bps: u32) -> i128 {
    (subtotal * i128::from(bps) + 5000) / 10000
}

fn assert_invariants(
    lines: &[SaleLineItem],
    rate: TaxRate,
    discount: Money,
) -> Result<(), TestCaseError> {
    let totals = SaleTotals::compute(lines.iter().map(SaleLineItem::total_price), rate, discount)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    let subtotal: i128 = lines
        .iter()
        .map(|l| i128::from(l.quantity()) * i128::from(l.unit_price().cents()))
        .sum();

    prop_assert_eq!(i128::from(totals.subtotal.cents()), subtotal);
    prop_assert_eq!(
        i128::from(totals.tax.cents()),
        expected_tax(subtotal, rate.bps())
    );
    prop_assert_eq!(totals.total, totals.subtotal + totals.tax - totals.discount);
    prop_assert!(totals.total.cents() >= 0);
    prop_assert!(totals.discount <= discount.max(Money::zero()));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn totals_stay_consistent_across_edits(
        first in (0i64..=MAX_PRICE_CENTS, quantity_strategy()),
        edits in prop::collection::vec(edit_strategy(), 0..60),
        discount_cents in 0i64..=10_000_000,
        bps in 0u32..=10_000,
    ) {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let rate = TaxRate::from_bps(bps);
        let discount = Money::from_cents(discount_cents);

        let mut lines = vec![
            SaleLineItem::new("sale", "p-0", 1, first.1, Money::from_cents(first.0), now).unwrap(),
        ];
        assert_invariants(&lines, rate, discount)?;

        for (step, edit) in edits.into_iter().enumerate() {
            match edit {
                Edit::Insert { price_cents, quantity } => {
                    if lines.len() == MAX_LINE_ITEMS {
                        continue;
                    }
                    let position = lines.len() as i64 + 1;
                    let line = SaleLineItem::new(
                        "sale",
                        format!("p-{step}"),
                        position,
                        quantity,
                        Money::from_cents(price_cents),
                        now,
                    )
                    .unwrap();
                    lines.push(line);
                }
                Edit::SetQuantity { index, quantity } => {
                    let i = index % lines.len();
                    let unit_price = lines[i].unit_price();
                    lines[i].set_quantity(quantity, now).unwrap();
                    prop_assert_eq!(lines[i].unit_price(), unit_price);
                }
                Edit::Remove { index } => {
                    // a sale keeps at least one line
                    if lines.len() > 1 {
                        lines.remove(index % lines.len());
                    }
                }
            }
            assert_invariants(&lines, rate, discount)?;
        }
    }

    #[test]
    fn strict_accepts_exactly_the_discounts_compute_keeps(
        prices in prop::collection::vec(0i64..=100_000, 1..20),
        discount_cents in 0i64..=3_000_000,
    ) {
        let lines: Vec<Money> = prices.into_iter().map(Money::from_cents).collect();
        let rate = TaxRate::from_bps(2000);
        let discount = Money::from_cents(discount_cents);

        let clamped = SaleTotals::compute(lines.clone(), rate, discount).unwrap();
        let strict = SaleTotals::compute_strict(lines, rate, discount);

        if discount <= clamped.gross() {
            prop_assert_eq!(strict.unwrap(), clamped);
        } else {
            prop_assert!(strict.is_err());
            prop_assert!(clamped.total.is_zero());
        }
    }
}
