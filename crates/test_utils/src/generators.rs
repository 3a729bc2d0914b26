//! Property-Based Test Generators
//!
//! Proptest strategies that produce ledger inputs which respect the domain
//! preconditions (positive prices, non-zero quantities, cent precision).

use core_kernel::Money;
use domain_distribution::{Fraction, UnitEconomics};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for positive amounts in cents
pub fn positive_cents_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive Money values with cent precision
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_cents_strategy().prop_map(Money::from_minor)
}

/// Strategy for non-negative Money values with cent precision
pub fn non_negative_money_strategy() -> impl Strategy<Value = Money> {
    (0i64..10_000_000i64).prop_map(Money::from_minor)
}

/// Strategy for sale quantities
pub fn quantity_strategy() -> impl Strategy<Value = u32> {
    1u32..500u32
}

/// Strategy for fractions in `[0, 1]` with four decimal places
pub fn fraction_strategy() -> impl Strategy<Value = Fraction> {
    (0u32..=10_000u32).prop_map(|n| Fraction::clamped(Decimal::new(i64::from(n), 4)))
}

/// Strategy for any valid unit economics (the margin may be negative)
pub fn unit_economics_strategy() -> impl Strategy<Value = UnitEconomics> {
    (
        positive_money_strategy(),
        positive_money_strategy(),
        non_negative_money_strategy(),
        quantity_strategy(),
    )
        .prop_map(|(price, cost, freight, qty)| UnitEconomics::new(price, cost, freight, qty))
}

/// Strategy for unit economics whose sale price covers cost and freight
pub fn profitable_economics_strategy() -> impl Strategy<Value = UnitEconomics> {
    (
        1i64..5_000_000i64,
        0i64..1_000_000i64,
        0i64..5_000_000i64,
        quantity_strategy(),
    )
        .prop_map(|(cost, freight, profit, qty)| {
            let cost = Money::from_minor(cost);
            let freight = Money::from_minor(freight);
            let price = cost + freight + Money::from_minor(profit);
            UnitEconomics::new(price, cost, freight, qty)
        })
}

/// Strategy for a sequence of cent amounts summing to `total_cents`
pub fn payment_split_strategy(total_cents: i64) -> impl Strategy<Value = Vec<Money>> {
    prop::collection::vec(1i64..=100i64, 1..8).prop_map(move |weights| {
        let weight_sum: i64 = weights.iter().sum();
        let mut paid = 0i64;
        let mut parts = Vec::with_capacity(weights.len());
        for (index, weight) in weights.iter().enumerate() {
            let part = if index + 1 == weights.len() {
                total_cents - paid
            } else {
                total_cents * weight / weight_sum
            };
            paid += part;
            if part > 0 {
                parts.push(Money::from_minor(part));
            }
        }
        parts
    })
}
