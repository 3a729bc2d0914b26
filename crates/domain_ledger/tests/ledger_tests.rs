//! Tests for banks, movements and transfers

use chrono::Utc;
use core_kernel::{Money, SaleId};
use domain_distribution::compute_distribution;
use domain_ledger::{
    distribution_movements, plan_transfer, BankBook, BankId, LedgerError, Movement,
    MovementCategory, MovementKind,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;

fn m(value: rust_decimal::Decimal) -> Money {
    Money::new(value)
}

fn book_of(movements: Vec<Movement>) -> BankBook {
    let mut book = BankBook::new();
    for movement in movements {
        book.apply(movement);
    }
    book
}

// ============================================================================
// Book
// ============================================================================

mod book_tests {
    use super::*;

    #[test]
    fn test_new_book_has_three_empty_banks() {
        let book = BankBook::new();
        let banks = book.banks();

        assert_eq!(banks.len(), 3);
        assert!(banks.iter().all(|b| b.current_capital.is_zero()));
        assert_eq!(banks[0].id, BankId::CostRecovery);
    }

    #[test]
    fn test_sale_inflows_then_full_reversal_restores_balances() {
        let sale_id = SaleId::new();
        let d = compute_distribution(m(dec!(10000)), m(dec!(6300)), m(dec!(500)), 10).unwrap();
        let mut book = BankBook::new();

        for mv in distribution_movements(&d, MovementKind::Inflow, MovementCategory::Sale, sale_id, Utc::now(), |b| {
            format!("Sale {}", b.pool_label())
        })
        .unwrap()
        {
            book.apply(mv);
        }
        assert_eq!(book.bank(BankId::CostRecovery).current_capital, m(dec!(63000)));
        assert_eq!(book.bank(BankId::Freight).current_capital, m(dec!(5000)));
        assert_eq!(book.bank(BankId::Profit).current_capital, m(dec!(32000)));

        for mv in distribution_movements(&d, MovementKind::Outflow, MovementCategory::Return, sale_id, Utc::now(), |_| {
            "Reversal".to_string()
        })
        .unwrap()
        {
            book.apply(mv);
        }
        assert!(book.total_capital().is_zero());
        assert_eq!(book.bank(BankId::Profit).cumulative_inflow, m(dec!(32000)));
        assert_eq!(book.bank(BankId::Profit).cumulative_outflow, m(dec!(32000)));
        assert_eq!(book.movements_for_sale(sale_id).len(), 6);
    }

    #[test]
    fn test_journal_keeps_order_of_application() {
        let at = Utc::now();
        let movements = vec![
            Movement::record(BankId::Freight, MovementKind::Inflow, m(dec!(10)), "a", MovementCategory::Sale, at).unwrap(),
            Movement::record(BankId::Freight, MovementKind::Outflow, m(dec!(4)), "b", MovementCategory::Return, at).unwrap(),
        ];
        let book = book_of(movements.clone());
        assert_eq!(book.bank(BankId::Freight).current_capital, m(dec!(6)));
        assert_eq!(book.journal(), movements.as_slice());
    }
}

// ============================================================================
// Transfers
// ============================================================================

mod transfer_tests {
    use super::*;

    fn funded_book() -> BankBook {
        let mut book = BankBook::new();
        book.apply(
            Movement::record(BankId::Profit, MovementKind::Inflow, m(dec!(1000)), "seed", MovementCategory::Sale, Utc::now())
                .unwrap(),
        );
        book
    }

    #[test]
    fn test_transfer_moves_capital() {
        let mut book = funded_book();
        let plan = plan_transfer(&book.bank(BankId::Profit), BankId::Freight, m(dec!(400)), "fuel", Utc::now()).unwrap();

        assert_eq!(plan.outgoing.amount, m(dec!(-400)));
        assert_eq!(plan.incoming.amount, m(dec!(400)));
        for mv in plan.into_movements() {
            book.apply(mv);
        }

        assert_eq!(book.bank(BankId::Profit).current_capital, m(dec!(600)));
        assert_eq!(book.bank(BankId::Profit).cumulative_outflow, m(dec!(400)));
        assert_eq!(book.bank(BankId::Freight).current_capital, m(dec!(400)));
        assert_eq!(book.bank(BankId::Freight).cumulative_inflow, m(dec!(400)));
        assert_eq!(book.total_capital(), m(dec!(1000)));
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let book = funded_book();
        let result = plan_transfer(&book.bank(BankId::Profit), BankId::Freight, m(dec!(1000.01)), "too much", Utc::now());

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { bank: BankId::Profit, .. })));
    }

    #[test]
    fn test_transfer_rejects_same_bank_and_zero() {
        let book = funded_book();
        let origin = book.bank(BankId::Profit);

        assert_eq!(
            plan_transfer(&origin, BankId::Profit, m(dec!(1)), "loop", Utc::now()),
            Err(LedgerError::SameBankTransfer(BankId::Profit))
        );
        assert!(matches!(
            plan_transfer(&origin, BankId::Freight, Money::zero(), "nothing", Utc::now()),
            Err(LedgerError::InvalidAmount(_))
        ));
    }
}

// ============================================================================
// Properties
// ============================================================================

fn any_movement() -> impl Strategy<Value = Movement> {
    (
        prop_oneof![Just(BankId::CostRecovery), Just(BankId::Freight), Just(BankId::Profit)],
        prop_oneof![
            Just(MovementKind::Inflow),
            Just(MovementKind::Outflow),
            Just(MovementKind::TransferIn),
            Just(MovementKind::TransferOut)
        ],
        0i64..10_000_000,
    )
        .prop_map(|(bank, kind, cents)| {
            Movement::record(bank, kind, Money::from_minor(cents), "generated", MovementCategory::Transfer, Utc::now())
                .unwrap()
        })
}

proptest! {
    #[test]
    fn capital_equals_inflow_minus_outflow(movements in prop::collection::vec(any_movement(), 0..50)) {
        let book = book_of(movements.clone());

        for bank in book.banks() {
            prop_assert_eq!(bank.current_capital, bank.cumulative_inflow - bank.cumulative_outflow);
        }
        let signed_sum: Money = movements.iter().map(|mv| mv.amount).sum();
        prop_assert_eq!(book.total_capital(), signed_sum);
    }
}
