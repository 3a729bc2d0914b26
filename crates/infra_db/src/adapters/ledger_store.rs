//! PostgreSQL Ledger Store
//!
//! Implements the `LedgerStore` and `LedgerSession` ports on PostgreSQL.
//!
//! # Sessions
//!
//! Each session is one SERIALIZABLE transaction. Reads named `*_for_update`
//! take row locks with `SELECT ... FOR UPDATE`, so two payments against the
//! same sale queue behind each other instead of both reading the same
//! remaining amount. When PostgreSQL still detects a conflict (SQLSTATE
//! 40001 or 40P01), or the optional lock timeout fires, the error surfaces
//! as `PortError::TransactionAborted` and nothing from the session is kept.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresLedgerStore};
//! use domain_sales::SaleLifecycleService;
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! let store = PostgresLedgerStore::new(pool);
//! let sales = SaleLifecycleService::new(store, clock);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, ClientId, DomainPort, HealthCheckResult, HealthCheckable, Money, PortError,
    PurchaseOrderId, ReturnId, SaleId,
};
use domain_ledger::{Bank, BankId, Movement};
use domain_sales::{
    Client, ClientAdjustment, LedgerSession, LedgerStore, PurchaseOrder, ReturnFilter, ReturnState,
    Sale, SaleReturn,
};

use crate::error::db_to_port_error;
use crate::repositories::ledger;

const ADAPTER_ID: &str = "postgres-ledger-store";

/// PostgreSQL-backed implementation of the `LedgerStore` port
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bounds how long a session waits for a row lock
    ///
    /// Expired waits abort the session with a retryable error.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn connection(&self) -> Result<PoolConnection<Postgres>, PortError> {
        self.pool.acquire().await.map_err(db_to_port_error)
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Runs `SELECT 1` through the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

/// One open SERIALIZABLE transaction
///
/// Dropping the session without calling `commit` rolls the transaction back.
pub struct PostgresLedgerSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerSession for PostgresLedgerSession {
    async fn client_for_update(&mut self, id: ClientId) -> Result<Option<Client>, PortError> {
        Ok(ledger::fetch_client(&mut *self.tx, id, true).await?)
    }

    async fn adjust_client(&mut self, id: ClientId, adjustment: &ClientAdjustment) -> Result<(), PortError> {
        Ok(ledger::adjust_client(&mut *self.tx, id, adjustment).await?)
    }

    async fn sale_for_update(&mut self, id: SaleId) -> Result<Option<Sale>, PortError> {
        Ok(ledger::fetch_sale(&mut *self.tx, id, true).await?)
    }

    #[instrument(skip(self, sale), fields(sale_id = %sale.id))]
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), PortError> {
        debug!(lots = sale.lots.len(), "Inserting sale");
        Ok(ledger::insert_sale(&mut *self.tx, sale).await?)
    }

    async fn update_sale(&mut self, sale: &Sale) -> Result<(), PortError> {
        Ok(ledger::update_sale(&mut *self.tx, sale).await?)
    }

    async fn return_for_update(&mut self, id: ReturnId) -> Result<Option<SaleReturn>, PortError> {
        Ok(ledger::fetch_return(&mut *self.tx, id, true).await?)
    }

    async fn returns_for_sale(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturn>, PortError> {
        Ok(ledger::returns_for_sale(&mut *self.tx, sale_id, true).await?)
    }

    #[instrument(skip(self, ret), fields(return_id = %ret.id, sale_id = %ret.sale_id))]
    async fn insert_return(&mut self, ret: &SaleReturn) -> Result<(), PortError> {
        debug!("Inserting return");
        ledger::insert_return(&mut *self.tx, ret).await.map_err(|e| match PortError::from(e) {
            PortError::Conflict { .. } => {
                PortError::conflict(format!("sale {} already has a requested return", ret.sale_id))
            }
            other => other,
        })
    }

    async fn update_return(&mut self, ret: &SaleReturn) -> Result<(), PortError> {
        Ok(ledger::update_return(&mut *self.tx, ret).await?)
    }

    async fn purchase_order_for_update(&mut self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, PortError> {
        Ok(ledger::fetch_purchase_order(&mut *self.tx, id, true).await?)
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), PortError> {
        Ok(ledger::insert_purchase_order(&mut *self.tx, order).await?)
    }

    async fn adjust_purchase_order(
        &mut self,
        id: PurchaseOrderId,
        stock_delta: i64,
        paid_delta: Money,
    ) -> Result<(), PortError> {
        Ok(ledger::adjust_purchase_order(&mut *self.tx, id, stock_delta, paid_delta).await?)
    }

    async fn bank_for_update(&mut self, id: BankId) -> Result<Bank, PortError> {
        Ok(ledger::fetch_bank(&mut *self.tx, id, true).await?)
    }

    #[instrument(skip(self, movement), fields(bank = %movement.bank, amount = %movement.amount))]
    async fn apply_movement(&mut self, movement: &Movement) -> Result<(), PortError> {
        debug!(concept = %movement.concept, "Applying movement");
        Ok(ledger::apply_movement(&mut *self.tx, movement).await?)
    }

    async fn commit(self) -> Result<(), PortError> {
        self.tx.commit().await.map_err(db_to_port_error)
    }

    async fn rollback(self) -> Result<(), PortError> {
        self.tx.rollback().await.map_err(db_to_port_error)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Session = PostgresLedgerSession;

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Self::Session, PortError> {
        let mut tx = self.pool.begin().await.map_err(db_to_port_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(db_to_port_error)?;

        if let Some(timeout) = self.lock_timeout {
            let sql = format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis());
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(db_to_port_error)?;
        }

        debug!("Ledger session opened");
        Ok(PostgresLedgerSession { tx })
    }

    async fn client(&self, id: ClientId) -> Result<Option<Client>, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::fetch_client(&mut *conn, id, false).await?)
    }

    #[instrument(skip(self, client), fields(client_id = %client.id))]
    async fn insert_client(&self, client: &Client) -> Result<(), PortError> {
        debug!("Inserting client");
        let mut conn = self.connection().await?;
        Ok(ledger::insert_client(&mut *conn, client).await?)
    }

    async fn sale(&self, id: SaleId) -> Result<Option<Sale>, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::fetch_sale(&mut *conn, id, false).await?)
    }

    async fn sale_return(&self, id: ReturnId) -> Result<Option<SaleReturn>, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::fetch_return(&mut *conn, id, false).await?)
    }

    #[instrument(skip(self))]
    async fn list_returns(&self, filter: &ReturnFilter) -> Result<Vec<SaleReturn>, PortError> {
        let mut conn = self.connection().await?;
        let returns = ledger::list_returns(&mut *conn, filter).await?;
        debug!(count = returns.len(), "Listed returns");
        Ok(returns)
    }

    async fn count_returns(&self, state: ReturnState) -> Result<u64, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::count_returns(&mut *conn, state).await?)
    }

    async fn purchase_order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::fetch_purchase_order(&mut *conn, id, false).await?)
    }

    #[instrument(skip(self), fields(purchase_order_id = %id))]
    async fn sales_for_purchase_order(&self, id: PurchaseOrderId) -> Result<Vec<Sale>, PortError> {
        let mut conn = self.connection().await?;
        let sales = ledger::sales_for_purchase_order(&mut *conn, id).await?;
        debug!(count = sales.len(), "Loaded downstream sales");
        Ok(sales)
    }

    async fn banks(&self) -> Result<Vec<Bank>, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::fetch_banks(&mut *conn).await?)
    }

    async fn movements_for_sale(&self, sale_id: SaleId) -> Result<Vec<Movement>, PortError> {
        let mut conn = self.connection().await?;
        Ok(ledger::movements_for_sale(&mut *conn, sale_id).await?)
    }
}
