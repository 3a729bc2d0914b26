//! Purchase order (OC) metrics
//!
//! A read-side projection joining a purchase order with the sales that drew
//! units from its lot. Nothing here mutates the order or the sales.
//!
//! A sale that takes units from several orders contributes to each one in
//! proportion to the units it drew from it, so revenue is never counted
//! twice across orders.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{percentage, DistributorId, Money, PurchaseOrderId};
use domain_sales::{DistributorPaymentState, LifecycleState, PurchaseOrder, Sale};

/// Stock level of a purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockState {
    Available,
    Low,
    OutOfStock,
}

impl fmt::Display for StockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StockState::Available => "available",
            StockState::Low => "low",
            StockState::OutOfStock => "out_of_stock",
        };
        f.write_str(s)
    }
}

/// Profitability bucket derived from the realized ROI
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profitability {
    Loss,
    Fair,
    Good,
    Excellent,
}

impl Profitability {
    pub fn from_roi(roi_percent: Decimal) -> Self {
        if roi_percent >= dec!(50) {
            Profitability::Excellent
        } else if roi_percent >= dec!(25) {
            Profitability::Good
        } else if roi_percent >= Decimal::ZERO {
            Profitability::Fair
        } else {
            Profitability::Loss
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricAlertKind {
    LowStock,
    OutOfStock,
    NegativeRoi,
    OverdueDistributorDebt,
    LowMargin,
    LowCollection,
    NegativeCashFlow,
}

/// A generated, never persisted, observation about a purchase order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricAlert {
    pub kind: MetricAlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

impl MetricAlert {
    fn new(kind: MetricAlertKind, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

/// Thresholds the alert rules are evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsThresholds {
    /// Stock is low when the remaining share is at or under this percentage
    pub low_stock_remaining_percent: Decimal,
    /// Days an unpaid order may age before it is flagged
    pub overdue_debt_days: i64,
    /// Realized margin under which prices are flagged
    pub low_margin_percent: Decimal,
    /// Collected share of revenue under which collection is flagged
    pub low_collection_percent: Decimal,
}

impl Default for MetricsThresholds {
    fn default() -> Self {
        Self {
            low_stock_remaining_percent: dec!(20),
            overdue_debt_days: 30,
            low_margin_percent: dec!(15),
            low_collection_percent: dec!(50),
        }
    }
}

impl MetricsThresholds {
    pub fn with_low_stock_percent(mut self, percent: Decimal) -> Self {
        self.low_stock_remaining_percent = percent;
        self
    }
}

/// The part of a sale attributable to one purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamSale {
    pub units: u32,
    pub revenue: Money,
    pub collected: Money,
}

impl DownstreamSale {
    /// Share of `sale` drawn from `order_id`
    ///
    /// Cancelled and fully returned sales contribute nothing, nor do sales
    /// with no lot from that order.
    pub fn attributable(sale: &Sale, order_id: PurchaseOrderId) -> Option<Self> {
        if sale.lifecycle_state != LifecycleState::Active || sale.quantity == 0 {
            return None;
        }
        let units: u32 = sale
            .lots
            .iter()
            .filter(|lot| lot.purchase_order_id == order_id)
            .map(|lot| lot.quantity)
            .sum();
        if units == 0 {
            return None;
        }
        if units >= sale.quantity {
            return Some(Self {
                units: sale.quantity,
                revenue: sale.total_amount,
                collected: sale.paid_amount,
            });
        }

        let share = Decimal::from(units) / Decimal::from(sale.quantity);
        Some(Self {
            units,
            revenue: sale.total_amount.scale(share),
            collected: sale.paid_amount.scale(share),
        })
    }
}

/// Metrics of one purchase order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderMetrics {
    pub purchase_order_id: PurchaseOrderId,
    pub distributor_id: DistributorId,

    pub initial_quantity: u32,
    pub stock_remaining: u32,
    pub stock_sold: u32,
    pub percent_sold: Decimal,
    pub stock_state: StockState,

    pub total_cost: Money,
    pub unit_landed_cost: Money,
    pub paid_to_distributor: Money,
    pub amount_owed: Money,
    pub payment_percent: Decimal,
    pub payment_state: DistributorPaymentState,

    pub downstream_revenue: Money,
    pub units_sold_downstream: u32,
    pub average_sale_price: Money,

    pub amount_collected: Money,
    pub amount_uncollected: Money,
    pub percent_collected: Decimal,
    /// Collected from clients minus paid to the distributor; may be negative
    pub net_cash_flow: Money,

    pub realized_profit: Money,
    pub realized_margin_percent: Decimal,
    pub roi: Decimal,
    /// Profit the remaining stock would yield at the average sale price
    pub potential_profit: Money,
    pub projected_roi: Decimal,
    pub profitability: Profitability,

    pub days_since_purchase: i64,
    /// Units sold per day since the order was created
    pub sales_velocity: Decimal,
    /// `None` while nothing has sold
    pub days_to_depletion: Option<u32>,

    pub alerts: Vec<MetricAlert>,
}

impl PurchaseOrderMetrics {
    /// Builds the metrics of `order` from the sales attributed to it
    pub fn compute(
        order: &PurchaseOrder,
        sales: &[DownstreamSale],
        thresholds: &MetricsThresholds,
        now: DateTime<Utc>,
    ) -> Self {
        let initial_quantity = order.quantity;
        let stock_remaining = order.stock_remaining;
        let stock_sold = order.stock_sold();
        let percent_sold = percentage(Decimal::from(stock_sold), Decimal::from(initial_quantity));

        let stock_state = if stock_remaining == 0 {
            StockState::OutOfStock
        } else if percent_sold >= dec!(100) - thresholds.low_stock_remaining_percent {
            StockState::Low
        } else {
            StockState::Available
        };

        let unit_landed_cost = order.unit_landed_cost();
        let downstream_revenue: Money = sales.iter().map(|s| s.revenue).sum();
        let units_sold_downstream: u32 = sales.iter().map(|s| s.units).sum();
        let average_sale_price = if units_sold_downstream == 0 {
            Money::zero()
        } else {
            Money::new(downstream_revenue.amount() / Decimal::from(units_sold_downstream)).round_to_cents()
        };

        let amount_collected: Money = sales.iter().map(|s| s.collected).sum();
        let amount_uncollected = downstream_revenue - amount_collected;
        let percent_collected = amount_collected.percent_of(downstream_revenue);
        let net_cash_flow = amount_collected - order.paid_to_distributor;

        let realized_profit =
            (downstream_revenue - unit_landed_cost * Decimal::from(units_sold_downstream)).round_to_cents();
        let realized_margin_percent = realized_profit.percent_of(downstream_revenue);
        let roi = realized_profit.percent_of(order.total_cost);
        let potential_profit = if stock_remaining > 0 && units_sold_downstream > 0 {
            ((average_sale_price - unit_landed_cost) * Decimal::from(stock_remaining)).round_to_cents()
        } else {
            Money::zero()
        };
        let projected_roi = (realized_profit + potential_profit).percent_of(order.total_cost);

        let days_since_purchase = (now - order.created_at).num_days().max(0);
        let sales_velocity = if days_since_purchase > 0 {
            (Decimal::from(stock_sold) / Decimal::from(days_since_purchase)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let days_to_depletion = if stock_sold > 0 && days_since_purchase > 0 {
            let days = Decimal::from(stock_remaining) * Decimal::from(days_since_purchase)
                / Decimal::from(stock_sold);
            days.ceil().to_u32()
        } else {
            None
        };

        let mut metrics = Self {
            purchase_order_id: order.id,
            distributor_id: order.distributor_id,
            initial_quantity,
            stock_remaining,
            stock_sold,
            percent_sold,
            stock_state,
            total_cost: order.total_cost,
            unit_landed_cost,
            paid_to_distributor: order.paid_to_distributor,
            amount_owed: order.debt(),
            payment_percent: order.payment_percent(),
            payment_state: order.payment_state(),
            downstream_revenue,
            units_sold_downstream,
            average_sale_price,
            amount_collected,
            amount_uncollected,
            percent_collected,
            net_cash_flow,
            realized_profit,
            realized_margin_percent,
            roi,
            potential_profit,
            projected_roi,
            profitability: Profitability::from_roi(roi),
            days_since_purchase,
            sales_velocity,
            days_to_depletion,
            alerts: Vec::new(),
        };
        metrics.alerts = metrics.evaluate_alerts(thresholds);
        metrics
    }

    fn evaluate_alerts(&self, thresholds: &MetricsThresholds) -> Vec<MetricAlert> {
        let mut alerts = Vec::new();

        match self.stock_state {
            StockState::OutOfStock => alerts.push(MetricAlert::new(
                MetricAlertKind::OutOfStock,
                AlertSeverity::Critical,
                "Out of stock",
            )),
            StockState::Low => alerts.push(MetricAlert::new(
                MetricAlertKind::LowStock,
                AlertSeverity::Warning,
                format!("Low stock: {} of {} units left, consider reordering", self.stock_remaining, self.initial_quantity),
            )),
            StockState::Available => {}
        }

        if self.roi < Decimal::ZERO {
            alerts.push(MetricAlert::new(
                MetricAlertKind::NegativeRoi,
                AlertSeverity::Critical,
                format!("Negative ROI: {}%", self.roi),
            ));
        }

        if self.payment_state == DistributorPaymentState::Pending
            && self.days_since_purchase > thresholds.overdue_debt_days
        {
            alerts.push(MetricAlert::new(
                MetricAlertKind::OverdueDistributorDebt,
                AlertSeverity::Warning,
                format!("Distributor debt unpaid for {} days", self.days_since_purchase),
            ));
        }

        if self.units_sold_downstream > 0 {
            if self.realized_margin_percent < thresholds.low_margin_percent {
                alerts.push(MetricAlert::new(
                    MetricAlertKind::LowMargin,
                    AlertSeverity::Warning,
                    format!("Low margin: {}%, review prices", self.realized_margin_percent),
                ));
            }
            if self.percent_collected < thresholds.low_collection_percent {
                alerts.push(MetricAlert::new(
                    MetricAlertKind::LowCollection,
                    AlertSeverity::Warning,
                    format!("Only {}% of sales collected", self.percent_collected),
                ));
            }
        }

        if self.net_cash_flow.is_negative() {
            alerts.push(MetricAlert::new(
                MetricAlertKind::NegativeCashFlow,
                AlertSeverity::Warning,
                format!("Negative cash flow: {}", self.net_cash_flow),
            ));
        }

        alerts
    }

    pub fn has_alert(&self, kind: MetricAlertKind) -> bool {
        self.alerts.iter().any(|a| a.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain_sales::NewPurchaseOrder;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().unwrap()
    }

    fn order(quantity: u32, remaining: u32) -> PurchaseOrder {
        let mut order = PurchaseOrder::new(
            &NewPurchaseOrder {
                distributor_id: DistributorId::new(),
                quantity,
                unit_cost: Money::new(dec!(6300)),
                unit_freight: Money::new(dec!(500)),
                initial_payment: Money::zero(),
            },
            created(),
        )
        .unwrap();
        order.stock_remaining = remaining;
        order
    }

    fn sold(units: u32, unit_price: Decimal, collected: Decimal) -> DownstreamSale {
        DownstreamSale {
            units,
            revenue: Money::new(unit_price * Decimal::from(units)),
            collected: Money::new(collected),
        }
    }

    #[test]
    fn test_untouched_order() {
        let metrics = PurchaseOrderMetrics::compute(&order(100, 100), &[], &MetricsThresholds::default(), created());

        assert_eq!(metrics.stock_state, StockState::Available);
        assert_eq!(metrics.amount_owed, Money::new(dec!(680000)));
        assert!(metrics.average_sale_price.is_zero());
        assert_eq!(metrics.percent_collected, Decimal::ZERO);
        assert_eq!(metrics.days_to_depletion, None);
        assert!(metrics.alerts.is_empty());
    }

    #[test]
    fn test_sold_through_order() {
        let sales = [sold(60, dec!(10000), dec!(300000)), sold(25, dec!(10000), dec!(250000))];
        let now = created() + chrono::Duration::days(17);

        let metrics = PurchaseOrderMetrics::compute(&order(100, 15), &sales, &MetricsThresholds::default(), now);

        assert_eq!(metrics.percent_sold, dec!(85));
        assert_eq!(metrics.stock_state, StockState::Low);
        assert_eq!(metrics.downstream_revenue, Money::new(dec!(850000)));
        assert_eq!(metrics.average_sale_price, Money::new(dec!(10000)));
        assert_eq!(metrics.amount_uncollected, Money::new(dec!(300000)));
        assert_eq!(metrics.percent_collected, dec!(64.71));
        // 850000 - 6800 * 85
        assert_eq!(metrics.realized_profit, Money::new(dec!(272000)));
        assert_eq!(metrics.roi, dec!(40));
        assert_eq!(metrics.profitability, Profitability::Good);
        assert_eq!(metrics.potential_profit, Money::new(dec!(48000)));
        assert_eq!(metrics.sales_velocity, dec!(5));
        assert_eq!(metrics.days_to_depletion, Some(3));
        assert!(metrics.has_alert(MetricAlertKind::LowStock));
        assert!(!metrics.has_alert(MetricAlertKind::LowCollection));
    }

    #[test]
    fn test_below_cost_sales_raise_alerts() {
        let sales = [sold(100, dec!(5000), dec!(100000))];
        let metrics = PurchaseOrderMetrics::compute(&order(100, 0), &sales, &MetricsThresholds::default(), created());

        assert_eq!(metrics.stock_state, StockState::OutOfStock);
        assert_eq!(metrics.profitability, Profitability::Loss);
        assert!(metrics.has_alert(MetricAlertKind::OutOfStock));
        assert!(metrics.has_alert(MetricAlertKind::NegativeRoi));
        assert!(metrics.has_alert(MetricAlertKind::LowMargin));
        assert!(metrics.has_alert(MetricAlertKind::LowCollection));
        assert!(metrics.potential_profit.is_zero());
    }

    #[test]
    fn test_overdue_distributor_debt() {
        let now = created() + chrono::Duration::days(31);
        let metrics = PurchaseOrderMetrics::compute(&order(100, 100), &[], &MetricsThresholds::default(), now);
        assert!(metrics.has_alert(MetricAlertKind::OverdueDistributorDebt));
    }

    #[test]
    fn test_profitability_buckets() {
        assert_eq!(Profitability::from_roi(dec!(50)), Profitability::Excellent);
        assert_eq!(Profitability::from_roi(dec!(49.99)), Profitability::Good);
        assert_eq!(Profitability::from_roi(dec!(0)), Profitability::Fair);
        assert_eq!(Profitability::from_roi(dec!(-0.01)), Profitability::Loss);
    }
}
