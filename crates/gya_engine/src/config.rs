//! Engine configuration
//!
//! Read from `GYA_*` environment variables (a `.env` file is honoured by
//! the binary). Nested keys use `__`. Every field has a default, so an empty
//! environment yields a working local setup.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use core_kernel::Money;
use domain_analytics::MetricsThresholds;
use domain_sales::SalesPolicy;
use infra_db::{DatabaseConfig, DEFAULT_DATABASE_URL};

use crate::error::EngineError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GYA";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    /// Row lock wait bound for ledger sessions; 0 waits indefinitely
    pub lock_timeout_ms: u64,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Freight per unit when a sale gives none
    pub default_freight: Decimal,
    /// Remaining stock share under which a purchase order is flagged
    pub stock_alert_threshold_percent: Decimal,
    /// Net margin under which a sale is logged as thin
    pub low_margin_warning_percent: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let policy = SalesPolicy::default();
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            lock_timeout_ms: 0,
            log_level: "info".to_string(),
            log_json: false,
            default_freight: policy.default_freight.amount(),
            stock_alert_threshold_percent: MetricsThresholds::default().low_stock_remaining_percent,
            low_margin_warning_percent: policy.low_margin_percent,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_source(Self::environment())
    }

    /// Loads configuration from an explicit map of variables
    pub fn from_vars(vars: config::Map<String, String>) -> Result<Self, EngineError> {
        Self::from_source(Self::environment().source(Some(vars)))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn from_source(source: config::Environment) -> Result<Self, EngineError> {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the services cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.database_url.trim().is_empty() {
            return Err(EngineError::InvalidConfig("database_url is empty".to_string()));
        }
        if self.max_connections == 0 || self.min_connections > self.max_connections {
            return Err(EngineError::InvalidConfig(format!(
                "connection bounds {}..{} are invalid",
                self.min_connections, self.max_connections
            )));
        }
        if self.default_freight.is_sign_negative() {
            return Err(EngineError::InvalidConfig("default_freight is negative".to_string()));
        }
        let hundred = Decimal::ONE_HUNDRED;
        for (name, value) in [
            ("stock_alert_threshold_percent", self.stock_alert_threshold_percent),
            ("low_margin_warning_percent", self.low_margin_warning_percent),
        ] {
            if value.is_sign_negative() || value > hundred {
                return Err(EngineError::InvalidConfig(format!("{name} must be within 0..=100")));
            }
        }
        Ok(())
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }

    pub fn sales_policy(&self) -> SalesPolicy {
        SalesPolicy {
            default_freight: Money::new(self.default_freight),
            low_margin_percent: self.low_margin_warning_percent,
        }
    }

    pub fn metrics_thresholds(&self) -> MetricsThresholds {
        MetricsThresholds::default().with_low_stock_percent(self.stock_alert_threshold_percent)
    }
}
