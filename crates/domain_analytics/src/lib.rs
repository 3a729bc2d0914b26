//! Analytics Domain
//!
//! Read models over the GYA ledger. Nothing in this crate writes.
//!
//! - `oc_metrics`: stock, payment, collection and profitability metrics of
//!   a purchase order, with generated alerts
//! - `risk`: client and distributor scores and categories
//! - `portfolio`: health index, liquidity and credit risk, trends and
//!   portfolio alerts

pub mod oc_metrics;
pub mod risk;
pub mod portfolio;
pub mod services;
pub mod error;

pub use oc_metrics::{
    AlertSeverity, DownstreamSale, MetricAlert, MetricAlertKind, MetricsThresholds, Profitability,
    PurchaseOrderMetrics, StockState,
};
pub use risk::{
    categorize_client, categorize_distributor, client_score_from_history, credit_limit, credit_score,
    ClientCategory, DistributorCategory,
};
pub use portfolio::{
    credit_risk, financial_health_index, liquidity_risk, system_alerts, PortfolioSnapshot, RiskLevel,
    SystemAlert, SystemAlertKind, Trend,
};
pub use services::PurchaseOrderMetricsService;
pub use error::AnalyticsError;
