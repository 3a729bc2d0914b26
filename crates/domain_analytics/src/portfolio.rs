//! Portfolio-level risk indices
//!
//! Read models over a snapshot of the whole ledger: bank capital, debts in
//! both directions, collection and margin rates.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::Money;

use crate::oc_metrics::AlertSeverity;

/// Band around zero, in percent, inside which a change counts as stable
pub const TREND_BAND_PERCENT: Decimal = dec!(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Falling,
    Stable,
    Rising,
}

impl Trend {
    /// Compares two periods; `Stable` when there is no previous value
    pub fn between(current: Decimal, previous: Decimal) -> Self {
        if previous.is_zero() {
            return Trend::Stable;
        }
        let change = (current - previous) / previous.abs() * dec!(100);
        if change > TREND_BAND_PERCENT {
            Trend::Rising
        } else if change < -TREND_BAND_PERCENT {
            Trend::Falling
        } else {
            Trend::Stable
        }
    }
}

/// Financial health index in `0..=100`
///
/// Four quarters: capital against distributor debt, collection rate,
/// average margin, and net worth relative to capital.
pub fn financial_health_index(
    capital: Money,
    client_debt: Money,
    distributor_debt: Money,
    collection_percent: Decimal,
    average_margin_percent: Decimal,
) -> u8 {
    let capital_amount = capital.amount();
    let owed = distributor_debt.amount();

    let liquidity = if capital_amount > owed * dec!(1.5) {
        dec!(25)
    } else if capital_amount > owed {
        dec!(20)
    } else if capital_amount > owed * dec!(0.5) {
        dec!(10)
    } else {
        Decimal::ZERO
    };

    let collection = collection_percent.max(Decimal::ZERO).min(dec!(100)) * dec!(0.25);

    let margin = if average_margin_percent >= dec!(40) {
        dec!(25)
    } else if average_margin_percent >= dec!(30) {
        dec!(20)
    } else if average_margin_percent >= dec!(20) {
        dec!(15)
    } else if average_margin_percent >= dec!(10) {
        dec!(10)
    } else {
        dec!(5)
    };

    let net_worth = capital + client_debt - distributor_debt;
    let equity = if !net_worth.is_positive() {
        Decimal::ZERO
    } else {
        match net_worth.ratio_of(capital) {
            Some(ratio) if capital.is_positive() => (ratio * dec!(25)).min(dec!(25)),
            _ => dec!(25),
        }
    };

    (liquidity + collection + margin + equity)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .min(dec!(100))
        .to_u8()
        .unwrap_or(0)
}

/// Liquidity risk from months of outflow covered and distributor debt load
pub fn liquidity_risk(capital: Money, distributor_debt: Money, monthly_outflow: Money) -> RiskLevel {
    if !capital.is_positive() {
        return RiskLevel::High;
    }
    // no outflow means unlimited coverage
    let months_covered = capital.ratio_of(monthly_outflow).filter(|_| monthly_outflow.is_positive());
    let covers = |months: Decimal| months_covered.map_or(true, |covered| covered >= months);
    let debt_ratio = distributor_debt.non_negative().amount() / capital.amount();

    if covers(dec!(3)) && debt_ratio < dec!(0.5) {
        RiskLevel::Low
    } else if covers(Decimal::ONE) && debt_ratio < Decimal::ONE {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Credit risk from client debt relative to monthly sales and collection rate
pub fn credit_risk(client_debt: Money, monthly_sales: Money, collection_percent: Decimal) -> RiskLevel {
    let debt_ratio = match client_debt.non_negative().ratio_of(monthly_sales) {
        Some(ratio) if monthly_sales.is_positive() => ratio,
        _ => Decimal::ZERO,
    };

    if collection_percent >= dec!(80) && debt_ratio < Decimal::ONE {
        RiskLevel::Low
    } else if collection_percent >= dec!(60) && debt_ratio < dec!(2) {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Aggregates a portfolio alert evaluation runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_capital: Money,
    pub profit_capital: Money,
    pub client_debt: Money,
    pub distributor_debt: Money,
    pub collection_percent: Decimal,
    pub stock_units: u32,
    pub health_index: u8,
    pub sales_trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAlertKind {
    CapitalBelowDistributorDebt,
    CriticalHealth,
    LowCollection,
    LowStock,
    HighClientDebt,
    LowProfitCapital,
    FallingSales,
    HealthyPortfolio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemAlert {
    pub kind: SystemAlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub action: Option<&'static str>,
}

/// Units of total stock under which a reorder is suggested
pub const LOW_STOCK_UNITS: u32 = 50;

/// Evaluates every portfolio rule, most severe first
pub fn system_alerts(snapshot: &PortfolioSnapshot) -> Vec<SystemAlert> {
    let mut alerts = Vec::new();
    let mut push = |kind, severity, message: String, action| {
        alerts.push(SystemAlert {
            kind,
            severity,
            message,
            action,
        })
    };

    if snapshot.total_capital < snapshot.distributor_debt {
        push(
            SystemAlertKind::CapitalBelowDistributorDebt,
            AlertSeverity::Critical,
            format!(
                "Capital {} does not cover distributor debt {}",
                snapshot.total_capital, snapshot.distributor_debt
            ),
            Some("Prioritise client collections or pause purchasing"),
        );
    }
    if snapshot.health_index < 30 {
        push(
            SystemAlertKind::CriticalHealth,
            AlertSeverity::Critical,
            format!("Financial health index critical: {}", snapshot.health_index),
            Some("Review cash flow"),
        );
    }
    if snapshot.collection_percent < dec!(60) {
        push(
            SystemAlertKind::LowCollection,
            AlertSeverity::Warning,
            format!("Low collection rate: {}%", snapshot.collection_percent.round_dp(0)),
            Some("Contact clients with outstanding balances"),
        );
    }
    if snapshot.stock_units < LOW_STOCK_UNITS {
        push(
            SystemAlertKind::LowStock,
            AlertSeverity::Warning,
            format!("Total stock low: {} units", snapshot.stock_units),
            Some("Consider reordering inventory"),
        );
    }
    if snapshot.client_debt.amount() > snapshot.total_capital.amount() * dec!(2) {
        push(
            SystemAlertKind::HighClientDebt,
            AlertSeverity::Warning,
            format!("Client debt {} exceeds twice the capital", snapshot.client_debt),
            Some("Review credit policy"),
        );
    }
    if !snapshot.profit_capital.is_positive() {
        push(
            SystemAlertKind::LowProfitCapital,
            AlertSeverity::Warning,
            format!("Profit bank holds {}", snapshot.profit_capital),
            None,
        );
    }
    if snapshot.sales_trend == Trend::Falling {
        push(
            SystemAlertKind::FallingSales,
            AlertSeverity::Warning,
            "Sales are falling against the previous period".to_string(),
            None,
        );
    }
    if snapshot.health_index >= 80 {
        push(
            SystemAlertKind::HealthyPortfolio,
            AlertSeverity::Info,
            "Excellent financial health".to_string(),
            None,
        );
    }

    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    alerts
}
