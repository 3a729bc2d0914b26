//! Pre-built Test Fixtures
//!
//! Ready-to-use data for the reference scenarios the ledger is checked
//! against. Values are fixed so that expected pool amounts can be written
//! out literally in tests.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{ClientId, DistributorId, Money};
use rust_decimal_macros::dec;

use domain_sales::{Client, NewPurchaseOrder, NewSale};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Unit sale price of the reference sale
    pub fn reference_price() -> Money {
        Money::new(dec!(10000))
    }

    /// Unit cost of the reference sale
    pub fn reference_cost() -> Money {
        Money::new(dec!(6300))
    }

    /// Unit freight of the reference sale
    pub fn reference_freight() -> Money {
        Money::new(dec!(500))
    }

    /// Total of the reference sale (10 units)
    pub fn reference_total() -> Money {
        Money::new(dec!(100000))
    }

    pub fn half_of_reference() -> Money {
        Money::new(dec!(50000))
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Instant every test clock starts at (Mar 1, 2024, 09:00 UTC)
    pub fn business_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Fixture for sale inputs
pub struct SaleFixtures;

impl SaleFixtures {
    /// 10 units at 10000 with cost 6300 and freight 500
    ///
    /// Distribution: cost 63000, freight 5000, profit 32000, total 100000.
    pub fn reference(client_id: ClientId) -> NewSale {
        NewSale::new(
            client_id,
            MoneyFixtures::reference_price(),
            MoneyFixtures::reference_cost(),
            10,
        )
        .with_freight(MoneyFixtures::reference_freight())
    }

    /// 5 units at 1000 with cost 600 and no freight
    pub fn freight_free(client_id: ClientId) -> NewSale {
        NewSale::new(client_id, Money::new(dec!(1000)), Money::new(dec!(600)), 5)
            .with_freight(Money::zero())
    }

    /// Priced below cost: margin of about −60 %
    pub fn loss_making(client_id: ClientId) -> NewSale {
        NewSale::new(client_id, Money::new(dec!(100)), Money::new(dec!(150)), 1)
            .with_freight(Money::new(dec!(10)))
    }
}

/// Fixture for clients
pub struct ClientFixtures;

impl ClientFixtures {
    pub fn hardware_store() -> Client {
        Client::new("Ferretería del Norte", TemporalFixtures::business_open())
    }

    pub fn grocer() -> Client {
        Client::new("Abarrotes La Esperanza", TemporalFixtures::business_open())
    }
}

/// Fixture for purchase orders
pub struct PurchaseOrderFixtures;

impl PurchaseOrderFixtures {
    /// 100 units at 6300 + 500 freight, nothing paid yet
    pub fn reference(distributor_id: DistributorId) -> NewPurchaseOrder {
        NewPurchaseOrder {
            distributor_id,
            quantity: 100,
            unit_cost: MoneyFixtures::reference_cost(),
            unit_freight: MoneyFixtures::reference_freight(),
            initial_payment: Money::zero(),
        }
    }
}
