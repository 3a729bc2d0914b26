//! Engine errors

use thiserror::Error;

use core_kernel::PortError;
use domain_analytics::AnalyticsError;
use domain_sales::SalesError;
use infra_db::DatabaseError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tracing setup failed: {0}")]
    Telemetry(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] PortError),

    #[error(transparent)]
    Sales(#[from] SalesError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}
