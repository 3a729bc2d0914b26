//! Ledger Store Ports
//!
//! The services in this crate never talk to a database directly. They open a
//! [`LedgerSession`] from a [`LedgerStore`], do all reads and writes of one
//! operation through it, and either commit or roll back. A session is one
//! storage transaction: nothing written through it is visible to anyone
//! else until `commit` succeeds.
//!
//! # Contract for adapters
//!
//! - Reads named `*_for_update` lock the row for the rest of the session
//! - `apply_movement` is the only way to change a bank; it appends the
//!   movement and applies its [`BankDelta`](domain_ledger::BankDelta) as an
//!   atomic increment
//! - `adjust_client` and `adjust_purchase_order` are atomic increments too
//! - Serialization failures, deadlocks and lock timeouts surface as
//!   [`PortError::TransactionAborted`]
//! - Dropping a session without committing discards its writes
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut session = store.begin().await?;
//! let sale = session.sale_for_update(sale_id).await?;
//! // ...
//! session.commit().await?;
//! ```

use async_trait::async_trait;

use core_kernel::{
    ClientId, DomainPort, HealthCheckable, Money, PortError, PurchaseOrderId, ReturnId, SaleId,
};
use domain_ledger::{Bank, BankId, Movement};

use crate::client::{Client, ClientAdjustment};
use crate::purchase_order::PurchaseOrder;
use crate::returns::{ReturnState, SaleReturn};
use crate::sale::Sale;

/// Page size used when a return listing gives no limit
pub const DEFAULT_RETURN_PAGE: u32 = 100;

/// Filter for return listings
#[derive(Debug, Clone, Default)]
pub struct ReturnFilter {
    pub state: Option<ReturnState>,
    pub client_id: Option<ClientId>,
    pub sale_id: Option<SaleId>,
    pub limit: Option<u32>,
}

impl ReturnFilter {
    pub fn by_state(state: ReturnState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn by_sale(sale_id: SaleId) -> Self {
        Self {
            sale_id: Some(sale_id),
            ..Default::default()
        }
    }

    pub fn by_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Effective page size
    pub fn page_size(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RETURN_PAGE) as usize
    }

    pub fn matches(&self, ret: &SaleReturn) -> bool {
        self.state.map_or(true, |s| ret.state == s)
            && self.client_id.map_or(true, |c| ret.client_id == c)
            && self.sale_id.map_or(true, |s| ret.sale_id == s)
    }
}

/// One storage transaction
#[async_trait]
pub trait LedgerSession: Send {
    // ========================================================================
    // Clients
    // ========================================================================

    /// Reads and locks a client
    async fn client_for_update(&mut self, id: ClientId) -> Result<Option<Client>, PortError>;

    /// Applies increments to a client's running figures
    async fn adjust_client(&mut self, id: ClientId, adjustment: &ClientAdjustment) -> Result<(), PortError>;

    // ========================================================================
    // Sales
    // ========================================================================

    async fn sale_for_update(&mut self, id: SaleId) -> Result<Option<Sale>, PortError>;

    /// Inserts a sale together with its lot allocations
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), PortError>;

    /// Persists payment and lifecycle fields of a sale
    async fn update_sale(&mut self, sale: &Sale) -> Result<(), PortError>;

    // ========================================================================
    // Returns
    // ========================================================================

    async fn return_for_update(&mut self, id: ReturnId) -> Result<Option<SaleReturn>, PortError>;

    /// Every return recorded against a sale, in any state
    async fn returns_for_sale(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturn>, PortError>;

    /// Inserts a return; `Conflict` if the sale already has a requested one
    async fn insert_return(&mut self, ret: &SaleReturn) -> Result<(), PortError>;

    async fn update_return(&mut self, ret: &SaleReturn) -> Result<(), PortError>;

    // ========================================================================
    // Purchase orders
    // ========================================================================

    async fn purchase_order_for_update(&mut self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, PortError>;

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), PortError>;

    /// Adds `stock_delta` units to the stock and `paid_delta` to the amount paid
    async fn adjust_purchase_order(
        &mut self,
        id: PurchaseOrderId,
        stock_delta: i64,
        paid_delta: Money,
    ) -> Result<(), PortError>;

    // ========================================================================
    // Ledger
    // ========================================================================

    /// Reads and locks a bank
    async fn bank_for_update(&mut self, id: BankId) -> Result<Bank, PortError>;

    /// Appends a movement and applies its delta to its bank
    async fn apply_movement(&mut self, movement: &Movement) -> Result<(), PortError>;

    // ========================================================================
    // Completion
    // ========================================================================

    async fn commit(self) -> Result<(), PortError>;

    async fn rollback(self) -> Result<(), PortError>;
}

/// The transactional store behind the ledger
///
/// Query methods read committed state outside any session.
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    type Session: LedgerSession;

    /// Opens a session (BeginTx)
    async fn begin(&self) -> Result<Self::Session, PortError>;

    async fn client(&self, id: ClientId) -> Result<Option<Client>, PortError>;

    async fn insert_client(&self, client: &Client) -> Result<(), PortError>;

    async fn sale(&self, id: SaleId) -> Result<Option<Sale>, PortError>;

    async fn sale_return(&self, id: ReturnId) -> Result<Option<SaleReturn>, PortError>;

    /// Returns matching `filter`, newest first
    async fn list_returns(&self, filter: &ReturnFilter) -> Result<Vec<SaleReturn>, PortError>;

    async fn count_returns(&self, state: ReturnState) -> Result<u64, PortError>;

    async fn purchase_order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, PortError>;

    /// Sales whose lots draw on the purchase order
    async fn sales_for_purchase_order(&self, id: PurchaseOrderId) -> Result<Vec<Sale>, PortError>;

    /// The three banks in posting order
    async fn banks(&self) -> Result<Vec<Bank>, PortError>;

    /// Movements linked to a sale, oldest first
    async fn movements_for_sale(&self, sale_id: SaleId) -> Result<Vec<Movement>, PortError>;
}

/// In-memory implementation of the ledger store for testing
///
/// The whole state sits behind one `tokio::sync::Mutex`. A session holds
/// the lock for its lifetime, so sessions are serializable by construction.
/// Writes go to a working copy that replaces the shared state on commit.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::{AdapterHealth, HealthCheckResult};
    use domain_ledger::BankBook;

    /// Everything the in-memory store holds
    #[derive(Debug, Clone, Default)]
    pub struct MockState {
        pub clients: HashMap<ClientId, Client>,
        pub sales: HashMap<SaleId, Sale>,
        pub returns: HashMap<ReturnId, SaleReturn>,
        pub purchase_orders: HashMap<PurchaseOrderId, PurchaseOrder>,
        pub book: BankBook,
    }

    /// In-memory mock implementation of [`LedgerStore`]
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryLedgerStore {
        state: Arc<Mutex<MockState>>,
        fail_next_commit: Arc<AtomicBool>,
    }

    impl InMemoryLedgerStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with clients
        pub async fn with_clients(clients: Vec<Client>) -> Self {
            let store = Self::new();
            {
                let mut state = store.state.lock().await;
                for client in clients {
                    state.clients.insert(client.id, client);
                }
            }
            store
        }

        /// Pre-populates with purchase orders
        pub async fn seed_purchase_orders(&self, orders: Vec<PurchaseOrder>) {
            let mut state = self.state.lock().await;
            for order in orders {
                state.purchase_orders.insert(order.id, order);
            }
        }

        /// Makes the next commit fail as a serialization failure would
        pub fn fail_next_commit(&self) {
            self.fail_next_commit.store(true, Ordering::SeqCst);
        }

        /// A copy of the committed state
        pub async fn snapshot(&self) -> MockState {
            self.state.lock().await.clone()
        }
    }

    impl DomainPort for InMemoryLedgerStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryLedgerStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-ledger-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    /// A session over the in-memory store
    pub struct InMemorySession {
        guard: OwnedMutexGuard<MockState>,
        working: MockState,
        fail_commit: bool,
    }

    #[async_trait]
    impl LedgerSession for InMemorySession {
        async fn client_for_update(&mut self, id: ClientId) -> Result<Option<Client>, PortError> {
            Ok(self.working.clients.get(&id).cloned())
        }

        async fn adjust_client(&mut self, id: ClientId, adjustment: &ClientAdjustment) -> Result<(), PortError> {
            let client = self
                .working
                .clients
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Client", id))?;
            client.apply(adjustment);
            Ok(())
        }

        async fn sale_for_update(&mut self, id: SaleId) -> Result<Option<Sale>, PortError> {
            Ok(self.working.sales.get(&id).cloned())
        }

        async fn insert_sale(&mut self, sale: &Sale) -> Result<(), PortError> {
            if self.working.sales.contains_key(&sale.id) {
                return Err(PortError::conflict(format!("sale {} already exists", sale.id)));
            }
            self.working.sales.insert(sale.id, sale.clone());
            Ok(())
        }

        async fn update_sale(&mut self, sale: &Sale) -> Result<(), PortError> {
            if sale.paid_amount > sale.total_amount {
                return Err(PortError::validation("paid_amount exceeds total_amount"));
            }
            let stored = self
                .working
                .sales
                .get_mut(&sale.id)
                .ok_or_else(|| PortError::not_found("Sale", sale.id))?;
            *stored = sale.clone();
            Ok(())
        }

        async fn return_for_update(&mut self, id: ReturnId) -> Result<Option<SaleReturn>, PortError> {
            Ok(self.working.returns.get(&id).cloned())
        }

        async fn returns_for_sale(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturn>, PortError> {
            let mut returns: Vec<_> = self
                .working
                .returns
                .values()
                .filter(|r| r.sale_id == sale_id)
                .cloned()
                .collect();
            returns.sort_by_key(|r| r.requested_at);
            Ok(returns)
        }

        async fn insert_return(&mut self, ret: &SaleReturn) -> Result<(), PortError> {
            let pending = self
                .working
                .returns
                .values()
                .any(|r| r.sale_id == ret.sale_id && r.state == ReturnState::Requested);
            if pending && ret.state == ReturnState::Requested {
                return Err(PortError::conflict(format!(
                    "sale {} already has a requested return",
                    ret.sale_id
                )));
            }
            self.working.returns.insert(ret.id, ret.clone());
            Ok(())
        }

        async fn update_return(&mut self, ret: &SaleReturn) -> Result<(), PortError> {
            let stored = self
                .working
                .returns
                .get_mut(&ret.id)
                .ok_or_else(|| PortError::not_found("Return", ret.id))?;
            *stored = ret.clone();
            Ok(())
        }

        async fn purchase_order_for_update(&mut self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, PortError> {
            Ok(self.working.purchase_orders.get(&id).cloned())
        }

        async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), PortError> {
            self.working.purchase_orders.insert(order.id, order.clone());
            Ok(())
        }

        async fn adjust_purchase_order(
            &mut self,
            id: PurchaseOrderId,
            stock_delta: i64,
            paid_delta: Money,
        ) -> Result<(), PortError> {
            let order = self
                .working
                .purchase_orders
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("PurchaseOrder", id))?;
            let stock = i64::from(order.stock_remaining) + stock_delta;
            if stock < 0 || stock > i64::from(order.quantity) {
                return Err(PortError::validation(format!(
                    "stock of {} would become {}",
                    id, stock
                )));
            }
            order.stock_remaining = stock as u32;
            order.paid_to_distributor += paid_delta;
            Ok(())
        }

        async fn bank_for_update(&mut self, id: BankId) -> Result<Bank, PortError> {
            Ok(self.working.book.bank(id))
        }

        async fn apply_movement(&mut self, movement: &Movement) -> Result<(), PortError> {
            self.working.book.apply(movement.clone());
            Ok(())
        }

        async fn commit(mut self) -> Result<(), PortError> {
            if self.fail_commit {
                return Err(PortError::aborted(
                    "could not serialize access due to concurrent update",
                ));
            }
            *self.guard = self.working;
            Ok(())
        }

        async fn rollback(self) -> Result<(), PortError> {
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedgerStore {
        type Session = InMemorySession;

        async fn begin(&self) -> Result<Self::Session, PortError> {
            let guard = self.state.clone().lock_owned().await;
            let working = guard.clone();
            Ok(InMemorySession {
                guard,
                working,
                fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
            })
        }

        async fn client(&self, id: ClientId) -> Result<Option<Client>, PortError> {
            Ok(self.state.lock().await.clients.get(&id).cloned())
        }

        async fn insert_client(&self, client: &Client) -> Result<(), PortError> {
            self.state.lock().await.clients.insert(client.id, client.clone());
            Ok(())
        }

        async fn sale(&self, id: SaleId) -> Result<Option<Sale>, PortError> {
            Ok(self.state.lock().await.sales.get(&id).cloned())
        }

        async fn sale_return(&self, id: ReturnId) -> Result<Option<SaleReturn>, PortError> {
            Ok(self.state.lock().await.returns.get(&id).cloned())
        }

        async fn list_returns(&self, filter: &ReturnFilter) -> Result<Vec<SaleReturn>, PortError> {
            let state = self.state.lock().await;
            let mut returns: Vec<_> = state
                .returns
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            returns.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
            returns.truncate(filter.page_size());
            Ok(returns)
        }

        async fn count_returns(&self, state: ReturnState) -> Result<u64, PortError> {
            let guard = self.state.lock().await;
            Ok(guard.returns.values().filter(|r| r.state == state).count() as u64)
        }

        async fn purchase_order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, PortError> {
            Ok(self.state.lock().await.purchase_orders.get(&id).cloned())
        }

        async fn sales_for_purchase_order(&self, id: PurchaseOrderId) -> Result<Vec<Sale>, PortError> {
            let state = self.state.lock().await;
            let mut sales: Vec<_> = state
                .sales
                .values()
                .filter(|s| s.lots.iter().any(|l| l.purchase_order_id == id))
                .cloned()
                .collect();
            sales.sort_by_key(|s| s.created_at);
            Ok(sales)
        }

        async fn banks(&self) -> Result<Vec<Bank>, PortError> {
            Ok(self.state.lock().await.book.banks())
        }

        async fn movements_for_sale(&self, sale_id: SaleId) -> Result<Vec<Movement>, PortError> {
            Ok(self.state.lock().await.book.movements_for_sale(sale_id))
        }
    }
}
