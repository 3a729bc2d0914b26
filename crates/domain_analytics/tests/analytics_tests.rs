//! Analytics tests: monotonicity of the heuristics and the metrics service

use std::sync::Arc;

use core_kernel::{Clock, Money, PurchaseOrderId};
use domain_analytics::*;
use domain_ledger::BankId;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_utils::{PurchaseOrderBuilder, SaleInputBuilder, TestLedger};

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10_000u32).prop_map(|n| Decimal::new(i64::from(n), 2))
}

fn money_strategy() -> impl Strategy<Value = Money> {
    (0i64..1_000_000_000i64).prop_map(Money::from_minor)
}

// ============================================================================
// Credit score monotonicity
// ============================================================================

mod credit_score_tests {
    use super::*;

    proptest! {
        #[test]
        fn score_never_drops_with_better_punctuality(
            a in percent_strategy(),
            b in percent_strategy(),
            late in percent_strategy(),
            debt in money_strategy(),
            limit in money_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(credit_score(low, late, debt, limit) <= credit_score(high, late, debt, limit));
        }

        #[test]
        fn score_never_rises_with_more_lateness(
            on_time in percent_strategy(),
            a in percent_strategy(),
            b in percent_strategy(),
            debt in money_strategy(),
            limit in money_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(credit_score(on_time, high, debt, limit) <= credit_score(on_time, low, debt, limit));
        }

        #[test]
        fn score_never_rises_with_more_debt(
            on_time in percent_strategy(),
            late in percent_strategy(),
            a in money_strategy(),
            b in money_strategy(),
            limit in money_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(credit_score(on_time, late, high, limit) <= credit_score(on_time, late, low, limit));
        }

        #[test]
        fn score_stays_in_range(
            on_time in any::<i32>(),
            late in any::<i32>(),
            debt in money_strategy(),
            limit in money_strategy(),
        ) {
            let score = credit_score(Decimal::from(on_time), Decimal::from(late), debt, limit);
            prop_assert!(score <= 100);
        }

        #[test]
        fn history_score_never_drops_with_punctuality(
            purchases in money_strategy(),
            debt in money_strategy(),
            a in percent_strategy(),
            b in percent_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                client_score_from_history(purchases, debt, low) <= client_score_from_history(purchases, debt, high)
            );
        }

        #[test]
        fn credit_limit_never_drops_with_score(
            average in money_strategy(),
            profit in money_strategy(),
            a in 0u8..=100,
            b in 0u8..=100,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(credit_limit(average, low, profit) <= credit_limit(average, high, profit));
        }
    }

    #[test]
    fn test_indebted_lapsed_client_is_delinquent_regardless_of_score() {
        let category = categorize_client(100, 50, 90, Money::new(dec!(1)), Money::new(dec!(5000000)));
        assert_eq!(category, ClientCategory::Delinquent);
    }
}

// ============================================================================
// Portfolio monotonicity
// ============================================================================

mod portfolio_tests {
    use super::*;

    proptest! {
        #[test]
        fn health_never_drops_with_better_collection(
            capital in money_strategy(),
            client_debt in money_strategy(),
            distributor_debt in money_strategy(),
            a in percent_strategy(),
            b in percent_strategy(),
            margin in percent_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                financial_health_index(capital, client_debt, distributor_debt, low, margin)
                    <= financial_health_index(capital, client_debt, distributor_debt, high, margin)
            );
        }

        #[test]
        fn health_never_drops_with_better_margin(
            capital in money_strategy(),
            client_debt in money_strategy(),
            distributor_debt in money_strategy(),
            collection in percent_strategy(),
            a in percent_strategy(),
            b in percent_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                financial_health_index(capital, client_debt, distributor_debt, collection, low)
                    <= financial_health_index(capital, client_debt, distributor_debt, collection, high)
            );
        }

        #[test]
        fn health_never_rises_with_more_distributor_debt(
            capital in money_strategy(),
            client_debt in money_strategy(),
            a in money_strategy(),
            b in money_strategy(),
            collection in percent_strategy(),
            margin in percent_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                financial_health_index(capital, client_debt, high, collection, margin)
                    <= financial_health_index(capital, client_debt, low, collection, margin)
            );
        }

        #[test]
        fn liquidity_risk_never_worsens_with_more_capital(
            a in money_strategy(),
            b in money_strategy(),
            debt in money_strategy(),
            outflow in money_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(liquidity_risk(high, debt, outflow) <= liquidity_risk(low, debt, outflow));
        }

        #[test]
        fn credit_risk_never_worsens_with_better_collection(
            debt in money_strategy(),
            sales in money_strategy(),
            a in percent_strategy(),
            b in percent_strategy(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(credit_risk(debt, sales, high) <= credit_risk(debt, sales, low));
        }

        #[test]
        fn trend_follows_current_value(
            previous in 1i64..1_000_000i64,
            a in 0i64..2_000_000i64,
            b in 0i64..2_000_000i64,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let previous = Decimal::from(previous);
            prop_assert!(
                Trend::between(Decimal::from(low), previous) <= Trend::between(Decimal::from(high), previous)
            );
        }
    }
}

// ============================================================================
// Purchase order metrics service
// ============================================================================

mod metrics_service_tests {
    use super::*;

    fn service(ledger: &TestLedger) -> PurchaseOrderMetricsService<domain_sales::ports::mock::InMemoryLedgerStore> {
        let clock: Arc<dyn Clock> = ledger.clock.clone();
        PurchaseOrderMetricsService::new(ledger.store.clone(), clock)
    }

    #[tokio::test]
    async fn test_metrics_follow_sales_and_payments() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::new().quantity(20).build())
            .await
            .unwrap();

        let sale = ledger
            .sales
            .create_sale(SaleInputBuilder::new(client_id).quantity(17).lot(order.id, 17).build())
            .await
            .unwrap();
        ledger.sales.register_payment(sale.id, Money::new(dec!(85000))).await.unwrap();
        ledger
            .purchasing
            .pay_distributor(order.id, Money::new(dec!(50000)), BankId::CostRecovery)
            .await
            .unwrap();
        ledger.clock.advance(chrono::Duration::days(10));

        let metrics = service(&ledger).get_purchase_order_metrics(order.id).await.unwrap();

        assert_eq!(metrics.stock_remaining, 3);
        assert_eq!(metrics.stock_state, StockState::Low);
        assert_eq!(metrics.units_sold_downstream, 17);
        assert_eq!(metrics.downstream_revenue, Money::new(dec!(170000)));
        assert_eq!(metrics.amount_collected, Money::new(dec!(85000)));
        assert_eq!(metrics.percent_collected, dec!(50));
        assert_eq!(metrics.net_cash_flow, Money::new(dec!(35000)));
        assert_eq!(metrics.amount_owed, Money::new(dec!(86000)));
        // 170000 - 6800 * 17
        assert_eq!(metrics.realized_profit, Money::new(dec!(54400)));
        assert_eq!(metrics.days_since_purchase, 10);
        assert_eq!(metrics.sales_velocity, dec!(1.7));
        assert!(metrics.has_alert(MetricAlertKind::LowStock));
    }

    #[tokio::test]
    async fn test_cancelled_sales_are_ignored() {
        let ledger = TestLedger::new();
        let client_id = ledger.client().await;
        let order = ledger
            .purchasing
            .create_purchase_order(PurchaseOrderBuilder::new().quantity(20).build())
            .await
            .unwrap();
        let sale = ledger
            .sales
            .create_sale(SaleInputBuilder::new(client_id).quantity(5).lot(order.id, 5).build())
            .await
            .unwrap();
        ledger.sales.cancel_sale(sale.id, "duplicate entry").await.unwrap();

        let metrics = service(&ledger).get_purchase_order_metrics(order.id).await.unwrap();

        assert_eq!(metrics.units_sold_downstream, 0);
        assert_eq!(metrics.stock_remaining, 20);
        assert_eq!(metrics.stock_state, StockState::Available);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let ledger = TestLedger::new();
        let result = service(&ledger).get_purchase_order_metrics(PurchaseOrderId::new()).await;
        assert!(matches!(result, Err(AnalyticsError::PurchaseOrderNotFound(_))));
    }
}
