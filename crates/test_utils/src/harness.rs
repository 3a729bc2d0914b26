//! In-memory ledger harness
//!
//! Wires every sales service over one [`InMemoryLedgerStore`] and a
//! [`FixedClock`], so service tests need no database.

use std::sync::Arc;

use core_kernel::{Clock, ClientId, FixedClock};
use domain_ledger::{Bank, BankId};
use domain_sales::ports::mock::InMemoryLedgerStore;
use domain_sales::{
    Client, LedgerStore, PurchasingService, ReturnService, SaleLifecycleService, TreasuryService,
};

use crate::fixtures::{ClientFixtures, TemporalFixtures};

/// Services and store for one test
pub struct TestLedger {
    pub store: Arc<InMemoryLedgerStore>,
    pub clock: Arc<FixedClock>,
    pub sales: SaleLifecycleService<InMemoryLedgerStore>,
    pub returns: ReturnService<InMemoryLedgerStore>,
    pub treasury: TreasuryService<InMemoryLedgerStore>,
    pub purchasing: PurchasingService<InMemoryLedgerStore>,
}

impl TestLedger {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let clock = Arc::new(FixedClock::new(TemporalFixtures::business_open()));
        let shared: Arc<dyn Clock> = clock.clone();

        Self {
            sales: SaleLifecycleService::new(store.clone(), shared.clone()),
            returns: ReturnService::new(store.clone(), shared.clone()),
            treasury: TreasuryService::new(store.clone(), shared.clone()),
            purchasing: PurchasingService::new(store.clone(), shared),
            store,
            clock,
        }
    }

    /// Registers the standard test client and returns its id
    pub async fn client(&self) -> ClientId {
        self.add_client(ClientFixtures::hardware_store()).await
    }

    pub async fn add_client(&self, client: Client) -> ClientId {
        let id = client.id;
        self.store
            .insert_client(&client)
            .await
            .expect("in-memory insert cannot fail");
        id
    }

    pub async fn client_state(&self, id: ClientId) -> Client {
        self.store
            .client(id)
            .await
            .expect("in-memory read cannot fail")
            .expect("client exists")
    }

    pub async fn bank(&self, id: BankId) -> Bank {
        self.store
            .banks()
            .await
            .expect("in-memory read cannot fail")
            .into_iter()
            .find(|b| b.id == id)
            .expect("all three banks exist")
    }

    pub async fn banks(&self) -> Vec<Bank> {
        self.store.banks().await.expect("in-memory read cannot fail")
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}
