//! Service tests for the sale lifecycle, returns, purchasing and transfers
//!
//! Everything runs against the in-memory store through `TestLedger`.

use std::sync::Arc;

use core_kernel::{ClientId, Money, SaleId, UserId};
use domain_ledger::{BankId, MovementCategory, MovementKind};
use domain_sales::{
    LifecycleState, PaymentState, RefundState, ReturnFilter, ReturnKind, ReturnReason,
    ReturnRequest, ReturnState, SalesError, LedgerStore,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use test_utils::{
    assert_bank_consistent, assert_capitals, assert_distribution_balanced, assert_distribution_eq,
    payment_split_strategy, PurchaseOrderBuilder, SaleFixtures, SaleInputBuilder, TestLedger,
};

fn m(value: rust_decimal::Decimal) -> Money {
    Money::new(value)
}

async fn reference_sale(ledger: &TestLedger) -> (ClientId, SaleId) {
    let client_id = ledger.client().await;
    let sale = ledger
        .sales
        .create_sale(SaleFixtures::reference(client_id))
        .await
        .unwrap();
    (client_id, sale.id)
}

// ============================================================================
// Sale creation
// ============================================================================

mod create_sale_tests {
    use super::*;

    #[tokio::test]
    async fn test_reference_sale_routes_full_distribution() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;

        let sale = ledger
            .sales
            .create_sale(SaleFixtures::reference(client_id).with_notes("first order"))
            .await
            .unwrap();

        assert_distribution_eq(&sale.distribution, dec!(63000), dec!(5000), dec!(32000), dec!(100000));
        assert_eq!(sale.payment_state, PaymentState::Pending);
        assert_eq!(sale.lifecycle_state, LifecycleState::Active);
        assert_eq!(sale.remaining_amount, m(dec!(100000)));
        assert_eq!(sale.notes.as_deref(), Some("first order"));

        assert_capitals(&ledger.banks().await, dec!(63000), dec!(5000), dec!(32000));
        let client = ledger.client_state(client_id).await;
        assert_eq!(client.outstanding_balance, m(dec!(100000)));
        assert_eq!(client.purchase_count, 1);

        let movements = ledger.store.movements_for_sale(sale.id).await.unwrap();
        assert_eq!(movements.len(), 3);
        assert!(movements.iter().all(|mv| mv.kind == MovementKind::Inflow));
        assert!(movements.iter().all(|mv| mv.category == MovementCategory::Sale));
        assert!(movements[2].concept.contains("profit (32"));
    }

    #[tokio::test]
    async fn test_freight_free_sale() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;

        let sale = ledger.sales.create_sale(SaleFixtures::freight_free(client_id)).await.unwrap();

        assert_distribution_eq(&sale.distribution, dec!(3000), dec!(0), dec!(2000), dec!(5000));
        assert_capitals(&ledger.banks().await, dec!(3000), dec!(0), dec!(2000));
    }

    #[tokio::test]
    async fn test_missing_freight_uses_default() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let input = SaleInputBuilder::new(client_id).default_freight().quantity(2).build();

        let sale = ledger.sales.create_sale(input).await.unwrap();

        assert_eq!(sale.unit_freight, m(dec!(500)));
        assert_eq!(sale.distribution.freight_pool, m(dec!(1000)));
    }

    #[tokio::test]
    async fn test_negative_margin_rejected_without_effects() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;

        let result = ledger.sales.create_sale(SaleFixtures::loss_making(client_id)).await;

        match result {
            Err(SalesError::NegativeMargin { margin_percent }) => assert_eq!(margin_percent, dec!(-60)),
            other => panic!("expected NegativeMargin, got {:?}", other),
        }
        assert_capitals(&ledger.banks().await, dec!(0), dec!(0), dec!(0));
        assert!(ledger.client_state(client_id).await.outstanding_balance.is_zero());
    }

    #[tokio::test]
    async fn test_unknown_client_rejected() {
        let ledger = TestLedger::new();
        let result = ledger.sales.create_sale(SaleFixtures::reference(ClientId::new())).await;
        assert!(matches!(result, Err(SalesError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected_before_storage() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;

        let zero_qty = SaleInputBuilder::new(client_id).quantity(0).build();
        match ledger.sales.create_sale(zero_qty).await {
            Err(SalesError::InvalidSaleInput(errors)) => assert_eq!(errors, vec!["Quantity must be greater than 0"]),
            other => panic!("expected InvalidSaleInput, got {:?}", other),
        }

        let broken = SaleInputBuilder::new(client_id).quantity(0).price(dec!(-1)).build();
        match ledger.sales.create_sale(broken).await {
            Err(SalesError::InvalidSaleInput(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected InvalidSaleInput, got {:?}", other),
        }

        assert!(ledger.banks().await.iter().all(|bank| bank.current_capital.is_zero()));
        assert_eq!(ledger.client_state(client_id).await.purchase_count, 0);
    }

    #[tokio::test]
    async fn test_price_below_landed_cost_only_warns() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let input = SaleInputBuilder::new(client_id).price(dec!(6500)).build();

        let report = ledger.sales.validate_sale_input(&input);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_lots_draw_stock() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::new().quantity(20).build())
            .await
            .unwrap();

        let input = SaleInputBuilder::new(client_id).lot(order.id, 10).build();
        let sale = ledger.sales.create_sale(input).await.unwrap();

        assert_eq!(sale.lots.len(), 1);
        assert_eq!(sale.lots[0].unit_cost, m(dec!(6800)));
        let order = ledger.purchasing.get_purchase_order(order.id).await.unwrap();
        assert_eq!(order.stock_remaining, 10);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_nothing_behind() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::new().quantity(5).build())
            .await
            .unwrap();

        let input = SaleInputBuilder::new(client_id).lot(order.id, 10).build();
        let result = ledger.sales.create_sale(input).await;

        assert!(matches!(result, Err(SalesError::InsufficientStock { available: 5, requested: 10, .. })));
        assert_eq!(ledger.purchasing.get_purchase_order(order.id).await.unwrap().stock_remaining, 5);
        assert_capitals(&ledger.banks().await, dec!(0), dec!(0), dec!(0));
    }

    #[tokio::test]
    async fn test_lots_must_cover_quantity() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let input = SaleInputBuilder::new(client_id)
            .lot(core_kernel::PurchaseOrderId::new(), 3)
            .build();

        assert!(matches!(ledger.sales.create_sale(input).await, Err(SalesError::InvalidLots(_))));
    }
}

// ============================================================================
// Payments
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_half_payment() {
        let ledger = TestLedger::new();
        let (client_id, sale_id) = reference_sale(&ledger).await;

        let sale = ledger.sales.register_payment(sale_id, m(dec!(50000))).await.unwrap();

        assert_eq!(sale.payment_state, PaymentState::Partial);
        assert_eq!(sale.remaining_amount, m(dec!(50000)));
        assert_distribution_eq(&sale.payment_distribution(), dec!(31500), dec!(2500), dec!(16000), dec!(50000));
        assert_eq!(
            ledger.sales.payment_distribution(sale_id).await.unwrap(),
            sale.payment_distribution()
        );

        // payments land in the cost-recovery bank
        assert_capitals(&ledger.banks().await, dec!(113000), dec!(5000), dec!(32000));
        assert_eq!(ledger.client_state(client_id).await.outstanding_balance, m(dec!(50000)));
    }

    #[tokio::test]
    async fn test_excess_payment_rejected() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        ledger.sales.register_payment(sale_id, m(dec!(90000))).await.unwrap();

        let result = ledger.sales.register_payment(sale_id, m(dec!(10000.01))).await;

        assert!(matches!(result, Err(SalesError::ExcessPayment { .. })));
        let sale = ledger.sales.get_sale(sale_id).await.unwrap();
        assert_eq!(sale.paid_amount, m(dec!(90000)));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;

        for amount in [dec!(0), dec!(-5)] {
            let result = ledger.sales.register_payment(sale_id, m(amount)).await;
            assert!(matches!(result, Err(SalesError::InvalidAmount(_))));
        }
    }

    #[tokio::test]
    async fn test_unknown_sale_rejected() {
        let ledger = TestLedger::new();
        let result = ledger.sales.register_payment(SaleId::new(), m(dec!(1))).await;
        assert!(matches!(result, Err(SalesError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_aborted_commit_is_retryable_and_leaves_no_effects() {
        let ledger = TestLedger::new();
        let (client_id, sale_id) = reference_sale(&ledger).await;
        ledger.store.fail_next_commit();

        let error = ledger.sales.register_payment(sale_id, m(dec!(1000))).await.unwrap_err();

        assert!(error.is_retryable());
        assert!(ledger.sales.get_sale(sale_id).await.unwrap().paid_amount.is_zero());
        assert_capitals(&ledger.banks().await, dec!(63000), dec!(5000), dec!(32000));
        assert_eq!(ledger.client_state(client_id).await.outstanding_balance, m(dec!(100000)));

        // a retry goes through
        let sale = ledger.sales.register_payment(sale_id, m(dec!(1000))).await.unwrap();
        assert_eq!(sale.paid_amount, m(dec!(1000)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_payments_cannot_overpay() {
        let ledger = Arc::new(TestLedger::new());
        let (_, sale_id) = reference_sale(&ledger).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.sales.register_payment(sale_id, m(dec!(60000))).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(SalesError::ExcessPayment { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!((succeeded, rejected), (1, 1));
        let sale = ledger.sales.get_sale(sale_id).await.unwrap();
        assert_eq!(sale.paid_amount, m(dec!(60000)));
        assert_eq!(sale.remaining_amount, m(dec!(40000)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn payments_summing_to_total_complete_the_sale(parts in payment_split_strategy(10_000_000)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let ledger = TestLedger::new();
                let (client_id, sale_id) = reference_sale(&ledger).await;

                for part in &parts {
                    ledger.sales.register_payment(sale_id, *part).await.unwrap();
                }

                let sale = ledger.sales.get_sale(sale_id).await.unwrap();
                assert!(sale.remaining_amount.is_zero());
                assert_eq!(sale.payment_state, PaymentState::Complete);
                assert!(ledger.client_state(client_id).await.outstanding_balance.is_zero());
                assert!(matches!(
                    ledger.sales.register_payment(sale_id, m(dec!(0.01))).await,
                    Err(SalesError::ExcessPayment { .. })
                ));
            });
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_reverses_creation() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::new().quantity(10).build())
            .await
            .unwrap();
        let input = SaleInputBuilder::new(client_id).lot(order.id, 10).build();
        let sale = ledger.sales.create_sale(input).await.unwrap();

        let cancelled = ledger.sales.cancel_sale(sale.id, "entered twice").await.unwrap();

        assert_eq!(cancelled.lifecycle_state, LifecycleState::Cancelled);
        assert_capitals(&ledger.banks().await, dec!(0), dec!(0), dec!(0));
        let client = ledger.client_state(client_id).await;
        assert!(client.outstanding_balance.is_zero());
        assert_eq!(client.purchase_count, 0);
        assert_eq!(ledger.purchasing.get_purchase_order(order.id).await.unwrap().stock_remaining, 10);

        let result = ledger.sales.register_payment(sale.id, m(dec!(1))).await;
        assert!(matches!(result, Err(SalesError::SaleClosed { .. })));
    }

    #[tokio::test]
    async fn test_paid_sale_cannot_be_cancelled() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        ledger.sales.register_payment(sale_id, m(dec!(1))).await.unwrap();

        let result = ledger.sales.cancel_sale(sale_id, "too late").await;
        assert!(matches!(result, Err(SalesError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_sale_with_open_return_cannot_be_cancelled() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 1, ReturnReason::Defective))
            .await
            .unwrap();

        let result = ledger.sales.cancel_sale(sale_id, "changed mind").await;
        assert!(matches!(result, Err(SalesError::InvalidStateTransition { .. })));
    }
}

// ============================================================================
// Returns
// ============================================================================

mod return_tests {
    use super::*;

    async fn approved_return(ledger: &TestLedger, request: ReturnRequest) -> domain_sales::SaleReturn {
        let ret = ledger.returns.request_return(request).await.unwrap();
        ledger.returns.approve_return(ret.id, UserId::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_return_of_paid_sale() {
        let ledger = TestLedger::new();
        let (client_id, sale_id) = reference_sale(&ledger).await;
        ledger.sales.register_payment(sale_id, m(dec!(100000))).await.unwrap();
        let before = ledger.banks().await;

        let ret = approved_return(&ledger, ReturnRequest::new(sale_id, 10, ReturnReason::Defective)).await;
        let processed = ledger.returns.process_return(ret.id, UserId::new()).await.unwrap();

        assert_eq!(processed.state, ReturnState::Processed);
        assert_eq!(processed.kind, ReturnKind::Total);
        assert_eq!(processed.refund_amount, m(dec!(100000)));
        assert_eq!(processed.refund_state, RefundState::Issued);

        let after = ledger.banks().await;
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.current_capital - a.current_capital, b.id.amount_in(&ret.reversal));
            assert_bank_consistent(a);
        }
        assert_capitals(&after, dec!(100000), dec!(0), dec!(0));

        // the client paid everything and now holds the full refund as credit
        assert_eq!(ledger.client_state(client_id).await.outstanding_balance, m(dec!(-100000)));
        assert_eq!(ledger.sales.get_sale(sale_id).await.unwrap().lifecycle_state, LifecycleState::Returned);
    }

    #[tokio::test]
    async fn test_payment_between_request_and_processing_is_refunded() {
        let ledger = TestLedger::new();
        let (client_id, sale_id) = reference_sale(&ledger).await;

        let requested = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 10, ReturnReason::Defective))
            .await
            .unwrap();
        assert!(requested.refund_amount.is_zero());
        assert_eq!(requested.refund_state, RefundState::NotApplicable);

        ledger.sales.register_payment(sale_id, m(dec!(100000))).await.unwrap();
        ledger.returns.approve_return(requested.id, UserId::new()).await.unwrap();
        let processed = ledger.returns.process_return(requested.id, UserId::new()).await.unwrap();

        assert_eq!(processed.refund_amount, m(dec!(100000)));
        assert!(processed.forgiven_amount.is_zero());
        assert_eq!(processed.refund_state, RefundState::Issued);
        assert_eq!(ledger.returns.get_return(requested.id).await.unwrap(), processed);
        assert_eq!(ledger.client_state(client_id).await.outstanding_balance, m(dec!(-100000)));
    }

    #[tokio::test]
    async fn test_second_partial_return_nets_earlier_refund() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        ledger.sales.register_payment(sale_id, m(dec!(50000))).await.unwrap();

        let first = approved_return(&ledger, ReturnRequest::new(sale_id, 4, ReturnReason::Other)).await;
        let first = ledger.returns.process_return(first.id, UserId::new()).await.unwrap();
        assert_eq!(first.refund_amount, m(dec!(20000)));
        assert_eq!(first.forgiven_amount, m(dec!(20000)));

        ledger.sales.register_payment(sale_id, m(dec!(20000))).await.unwrap();

        let rest = approved_return(&ledger, ReturnRequest::new(sale_id, 6, ReturnReason::Other)).await;
        let rest = ledger.returns.process_return(rest.id, UserId::new()).await.unwrap();

        // 70000 paid, 20000 already refunded, all remaining units returned
        assert_eq!(rest.refund_amount, m(dec!(50000)));
        assert_eq!(rest.forgiven_amount, m(dec!(10000)));
        assert_eq!(first.refund_amount + rest.refund_amount, m(dec!(70000)));
    }

    #[tokio::test]
    async fn test_full_cycle_restores_balances() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let banks_before = ledger.banks().await;
        let balance_before = ledger.client_state(client_id).await.outstanding_balance;

        let sale = ledger.sales.create_sale(SaleFixtures::reference(client_id)).await.unwrap();
        let ret = approved_return(&ledger, ReturnRequest::new(sale.id, 10, ReturnReason::Other)).await;
        ledger.returns.process_return(ret.id, UserId::new()).await.unwrap();

        let banks_after = ledger.banks().await;
        for (b, a) in banks_before.iter().zip(banks_after.iter()) {
            assert_eq!(b.current_capital, a.current_capital);
        }
        assert_eq!(ledger.client_state(client_id).await.outstanding_balance, balance_before);
    }

    #[tokio::test]
    async fn test_partial_returns_accumulate() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;

        let first = approved_return(&ledger, ReturnRequest::new(sale_id, 4, ReturnReason::WrongQuantity)).await;
        let first = ledger.returns.process_return(first.id, UserId::new()).await.unwrap();
        assert_distribution_eq(&first.reversal, dec!(25200), dec!(2000), dec!(12800), dec!(40000));
        assert_eq!(ledger.sales.get_sale(sale_id).await.unwrap().lifecycle_state, LifecycleState::Active);

        let too_many = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 7, ReturnReason::Other))
            .await;
        assert!(matches!(too_many, Err(SalesError::InvalidReturnQuantity { available: 6, .. })));

        let rest = approved_return(&ledger, ReturnRequest::new(sale_id, 6, ReturnReason::Other)).await;
        ledger.returns.process_return(rest.id, UserId::new()).await.unwrap();

        assert_eq!(ledger.sales.get_sale(sale_id).await.unwrap().lifecycle_state, LifecycleState::Returned);
        assert_capitals(&ledger.banks().await, dec!(0), dec!(0), dec!(0));
    }

    #[tokio::test]
    async fn test_requesting_moves_no_money() {
        let ledger = TestLedger::new();
        let (client_id, sale_id) = reference_sale(&ledger).await;

        let ret = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 5, ReturnReason::WrongPrice).with_notes("box damaged"))
            .await
            .unwrap();

        assert_eq!(ret.state, ReturnState::Requested);
        assert_eq!(ret.proportion, dec!(0.5));
        assert_distribution_balanced(&ret.reversal);
        assert_capitals(&ledger.banks().await, dec!(63000), dec!(5000), dec!(32000));
        assert_eq!(ledger.client_state(client_id).await.outstanding_balance, m(dec!(100000)));
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 1, ReturnReason::Defective))
            .await
            .unwrap();

        let result = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 1, ReturnReason::Defective))
            .await;

        assert!(matches!(result, Err(SalesError::DuplicateReturnRequest(id)) if id == sale_id));
        assert_eq!(ledger.returns.count_pending_returns().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_state_machine_is_enforced() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        let ret = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 2, ReturnReason::Other))
            .await
            .unwrap();

        // processing straight from requested is not allowed
        let result = ledger.returns.process_return(ret.id, UserId::new()).await;
        assert!(matches!(result, Err(SalesError::InvalidStateTransition { .. })));

        let rejected = ledger.returns.reject_return(ret.id, "not our product").await.unwrap();
        assert_eq!(rejected.state, ReturnState::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("not our product"));

        let result = ledger.returns.approve_return(ret.id, UserId::new()).await;
        assert!(matches!(result, Err(SalesError::InvalidStateTransition { .. })));
        assert_capitals(&ledger.banks().await, dec!(63000), dec!(5000), dec!(32000));
    }

    #[tokio::test]
    async fn test_returned_sale_rejects_further_requests_and_payments() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        let ret = approved_return(&ledger, ReturnRequest::new(sale_id, 10, ReturnReason::Other)).await;
        ledger.returns.process_return(ret.id, UserId::new()).await.unwrap();

        let again = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 1, ReturnReason::Other))
            .await;
        assert!(matches!(again, Err(SalesError::SaleClosed { .. })));

        let payment = ledger.sales.register_payment(sale_id, m(dec!(1))).await;
        assert!(matches!(payment, Err(SalesError::SaleClosed { .. })));
    }

    #[tokio::test]
    async fn test_restock_defaults_to_first_lot() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::new().quantity(10).build())
            .await
            .unwrap();
        let sale = ledger
            .sales
            .create_sale(SaleInputBuilder::new(client_id).quantity(6).lot(order.id, 6).build())
            .await
            .unwrap();

        let ret = approved_return(&ledger, ReturnRequest::new(sale.id, 2, ReturnReason::Defective)).await;
        assert_eq!(ret.restock_purchase_order_id, Some(order.id));
        ledger.returns.process_return(ret.id, UserId::new()).await.unwrap();
        assert_eq!(ledger.purchasing.get_purchase_order(order.id).await.unwrap().stock_remaining, 6);

        let kept = approved_return(&ledger, ReturnRequest::new(sale.id, 1, ReturnReason::Other).without_restock()).await;
        ledger.returns.process_return(kept.id, UserId::new()).await.unwrap();
        assert_eq!(ledger.purchasing.get_purchase_order(order.id).await.unwrap().stock_remaining, 6);
    }

    #[tokio::test]
    async fn test_return_queries() {
        let ledger = TestLedger::new();
        let (client_id, sale_id) = reference_sale(&ledger).await;
        let first = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 1, ReturnReason::Other))
            .await
            .unwrap();
        ledger.returns.reject_return(first.id, "no").await.unwrap();
        ledger.clock.advance(chrono::Duration::minutes(5));
        let second = ledger
            .returns
            .request_return(ReturnRequest::new(sale_id, 2, ReturnReason::Other))
            .await
            .unwrap();

        let all = ledger.returns.list_returns(&ReturnFilter::by_client(client_id)).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let pending = ledger
            .returns
            .list_returns(&ReturnFilter::by_state(ReturnState::Requested))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(ledger.returns.list_returns(&ReturnFilter::by_sale(sale_id).limit(1)).await.unwrap().len(), 1);

        assert_eq!(ledger.returns.get_return(second.id).await.unwrap(), second);
        assert!(matches!(
            ledger.returns.get_return(core_kernel::ReturnId::new()).await,
            Err(SalesError::ReturnNotFound(_))
        ));
    }
}

// ============================================================================
// Purchasing
// ============================================================================

mod purchasing_tests {
    use super::*;

    #[tokio::test]
    async fn test_pay_distributor_draws_from_bank() {
        let ledger = TestLedger::new();
        reference_sale(&ledger).await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::small().build())
            .await
            .unwrap();
        assert_eq!(order.total_cost, m(dec!(1100)));

        let paid = ledger
            .purchasing
            .pay_distributor(order.id, m(dec!(600)), BankId::CostRecovery)
            .await
            .unwrap();

        assert_eq!(paid.debt(), m(dec!(500)));
        assert_eq!(ledger.bank(BankId::CostRecovery).await.current_capital, m(dec!(62400)));
        assert_eq!(ledger.bank(BankId::CostRecovery).await.cumulative_outflow, m(dec!(600)));

        let over = ledger
            .purchasing
            .pay_distributor(order.id, m(dec!(500.01)), BankId::CostRecovery)
            .await;
        assert!(matches!(over, Err(SalesError::ExcessPayment { .. })));
    }

    #[tokio::test]
    async fn test_pay_distributor_needs_funds() {
        let ledger = TestLedger::new();
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::small().build())
            .await
            .unwrap();

        let result = ledger.purchasing.pay_distributor(order.id, m(dec!(10)), BankId::Freight).await;
        assert!(matches!(result, Err(SalesError::InsufficientFunds { bank: BankId::Freight, .. })));
    }
}

// ============================================================================
// Treasury
// ============================================================================

mod treasury_tests {
    use super::*;

    #[tokio::test]
    async fn test_transfer_between_banks() {
        let ledger = TestLedger::new();
        reference_sale(&ledger).await;

        let plan = ledger
            .treasury
            .transfer_between_banks(BankId::Profit, BankId::Freight, m(dec!(2000)), "fuel top-up")
            .await
            .unwrap();

        assert_eq!(plan.outgoing.amount, m(dec!(-2000)));
        let banks = ledger.treasury.bank_balances().await.unwrap();
        assert_capitals(&banks, dec!(63000), dec!(7000), dec!(30000));
        banks.iter().for_each(assert_bank_consistent);
    }

    #[tokio::test]
    async fn test_transfer_failures() {
        let ledger = TestLedger::new();
        reference_sale(&ledger).await;

        let overdraft = ledger
            .treasury
            .transfer_between_banks(BankId::Freight, BankId::Profit, m(dec!(5000.01)), "too much")
            .await;
        assert!(matches!(overdraft, Err(SalesError::InsufficientFunds { .. })));

        let same = ledger
            .treasury
            .transfer_between_banks(BankId::Freight, BankId::Freight, m(dec!(1)), "loop")
            .await;
        assert!(matches!(same, Err(SalesError::Ledger(_))));

        let zero = ledger
            .treasury
            .transfer_between_banks(BankId::Freight, BankId::Profit, Money::zero(), "nothing")
            .await;
        assert!(matches!(zero, Err(SalesError::InvalidAmount(_))));

        assert_capitals(&ledger.banks().await, dec!(63000), dec!(5000), dec!(32000));
    }
}

// ============================================================================
// Serialization
// ============================================================================

mod serialization_tests {
    use super::*;

    #[tokio::test]
    async fn test_sale_states_serialize_as_codes() {
        let ledger = TestLedger::new();
        let (_, sale_id) = reference_sale(&ledger).await;
        let sale = ledger.sales.get_sale(sale_id).await.unwrap();

        let json = serde_json::to_value(&sale).unwrap();
        assert_eq!(json["payment_state"], "pending");
        assert_eq!(json["lifecycle_state"], "active");
    }
}
