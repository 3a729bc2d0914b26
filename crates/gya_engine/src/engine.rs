//! Service wiring
//!
//! [`LedgerEngine`] owns one store and hands the same `Arc` to every
//! service, so they all share one pool (or one in-memory state in tests).

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use core_kernel::{Clock, HealthCheckResult, HealthCheckable, Money, SystemClock};
use domain_analytics::PurchaseOrderMetricsService;
use domain_ledger::Bank;
use domain_sales::{
    LedgerStore, PurchasingService, ReturnService, ReturnState, SaleLifecycleService, TreasuryService,
};
use infra_db::{create_pool, run_migrations, seed_banks, DatabasePool, PostgresLedgerStore};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// The ledger services over one store
pub struct LedgerEngine<S: LedgerStore> {
    pub sales: SaleLifecycleService<S>,
    pub returns: ReturnService<S>,
    pub treasury: TreasuryService<S>,
    pub purchasing: PurchasingService<S>,
    pub metrics: PurchaseOrderMetricsService<S>,
    store: Arc<S>,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self {
            sales: SaleLifecycleService::new(store.clone(), clock.clone()).with_policy(config.sales_policy()),
            returns: ReturnService::new(store.clone(), clock.clone()),
            treasury: TreasuryService::new(store.clone(), clock.clone()),
            purchasing: PurchasingService::new(store.clone(), clock.clone()),
            metrics: PurchaseOrderMetricsService::new(store.clone(), clock)
                .with_thresholds(config.metrics_thresholds()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn health(&self) -> HealthCheckResult {
        self.store.health_check().await
    }

    /// Current bank balances and the pending return queue
    #[instrument(skip(self))]
    pub async fn balance_report(&self) -> Result<BalanceReport, EngineError> {
        let banks = self.treasury.bank_balances().await?;
        let pending_returns = self.store.count_returns(ReturnState::Requested).await?;
        Ok(BalanceReport::new(banks, pending_returns))
    }
}

/// Bank balances at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub banks: Vec<Bank>,
    pub total_capital: Money,
    pub pending_returns: u64,
}

impl BalanceReport {
    pub fn new(banks: Vec<Bank>, pending_returns: u64) -> Self {
        let total_capital: Money = banks.iter().map(|b| b.current_capital).sum();
        Self {
            banks,
            total_capital,
            pending_returns,
        }
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:>16} {:>16} {:>16}", "bank", "capital", "inflow", "outflow")?;
        for bank in &self.banks {
            writeln!(
                f,
                "{:<14} {:>16} {:>16} {:>16}",
                bank.id.code(),
                bank.current_capital.to_string(),
                bank.cumulative_inflow.to_string(),
                bank.cumulative_outflow.to_string(),
            )?;
        }
        writeln!(f, "{:<14} {:>16}", "total", self.total_capital.to_string())?;
        write!(f, "pending returns: {}", self.pending_returns)
    }
}

/// Opens the pool, applies migrations and seeds the banks
#[instrument(skip(config))]
pub async fn prepare_database(config: &EngineConfig) -> Result<DatabasePool, EngineError> {
    let pool = create_pool(config.database()).await?;
    run_migrations(&pool).await?;
    let seeded = seed_banks(&pool).await?;
    info!(seeded, "Database ready");
    Ok(pool)
}

/// Builds the engine over PostgreSQL with the system clock
pub fn postgres_engine(pool: DatabasePool, config: &EngineConfig) -> LedgerEngine<PostgresLedgerStore> {
    let mut store = PostgresLedgerStore::new(pool);
    if let Some(timeout) = config.lock_timeout() {
        store = store.with_lock_timeout(timeout);
    }
    LedgerEngine::new(Arc::new(store), Arc::new(SystemClock), config)
}
