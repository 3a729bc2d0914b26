//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more meaningful failure
//! messages than a bare `assert_eq!`.

use core_kernel::Money;
use domain_distribution::Distribution;
use domain_ledger::{Bank, BankId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Asserts that two Money values are equal within `tolerance`
pub fn assert_money_approx_eq(actual: Money, expected: Money, tolerance: Decimal) {
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

/// Asserts that the pools of a distribution sum to its total within a cent
pub fn assert_distribution_balanced(distribution: &Distribution) {
    assert!(
        distribution.drift().amount().abs() <= dec!(0.01),
        "Distribution out of balance: cost={} freight={} profit={} total={} drift={}",
        distribution.cost_pool,
        distribution.freight_pool,
        distribution.profit_pool,
        distribution.total,
        distribution.drift()
    );
}

/// Asserts every field of a distribution exactly
pub fn assert_distribution_eq(
    distribution: &Distribution,
    cost: Decimal,
    freight: Decimal,
    profit: Decimal,
    total: Decimal,
) {
    let expected = Distribution {
        cost_pool: Money::new(cost),
        freight_pool: Money::new(freight),
        profit_pool: Money::new(profit),
        total: Money::new(total),
    };
    assert_eq!(*distribution, expected, "Distribution mismatch");
}

/// Asserts a bank's running balances agree with each other
pub fn assert_bank_consistent(bank: &Bank) {
    assert_eq!(
        bank.current_capital,
        bank.cumulative_inflow - bank.cumulative_outflow,
        "Bank {} capital {} does not match inflow {} minus outflow {}",
        bank.id,
        bank.current_capital,
        bank.cumulative_inflow,
        bank.cumulative_outflow
    );
}

/// Asserts the current capital of each bank, in posting order
pub fn assert_capitals(banks: &[Bank], cost: Decimal, freight: Decimal, profit: Decimal) {
    for (id, expected) in [
        (BankId::CostRecovery, cost),
        (BankId::Freight, freight),
        (BankId::Profit, profit),
    ] {
        let bank = banks
            .iter()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("Bank {} missing", id));
        assert_eq!(
            bank.current_capital,
            Money::new(expected),
            "Bank {} capital mismatch",
            id
        );
    }
}
