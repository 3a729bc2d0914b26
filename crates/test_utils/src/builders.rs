//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields that matter to them.

use core_kernel::{ClientId, DistributorId, Money, PurchaseOrderId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use domain_sales::{NewPurchaseOrder, NewSale};

use crate::fixtures::MoneyFixtures;

/// Builder for sale inputs, defaulting to the reference sale
pub struct SaleInputBuilder {
    client_id: ClientId,
    unit_sale_price: Money,
    unit_cost_price: Money,
    unit_freight: Option<Money>,
    quantity: u32,
    notes: Option<String>,
    lots: Vec<(PurchaseOrderId, u32)>,
}

impl SaleInputBuilder {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            unit_sale_price: MoneyFixtures::reference_price(),
            unit_cost_price: MoneyFixtures::reference_cost(),
            unit_freight: Some(MoneyFixtures::reference_freight()),
            quantity: 10,
            notes: None,
            lots: Vec::new(),
        }
    }

    pub fn price(mut self, amount: Decimal) -> Self {
        self.unit_sale_price = Money::new(amount);
        self
    }

    pub fn cost(mut self, amount: Decimal) -> Self {
        self.unit_cost_price = Money::new(amount);
        self
    }

    pub fn freight(mut self, amount: Decimal) -> Self {
        self.unit_freight = Some(Money::new(amount));
        self
    }

    /// Leaves freight to the configured default
    pub fn default_freight(mut self) -> Self {
        self.unit_freight = None;
        self
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn lot(mut self, purchase_order_id: PurchaseOrderId, quantity: u32) -> Self {
        self.lots.push((purchase_order_id, quantity));
        self
    }

    pub fn build(self) -> NewSale {
        let mut input = NewSale::new(self.client_id, self.unit_sale_price, self.unit_cost_price, self.quantity);
        input.unit_freight = self.unit_freight;
        input.notes = self.notes;
        for (purchase_order_id, quantity) in self.lots {
            input = input.with_lot(purchase_order_id, quantity);
        }
        input
    }
}

/// Builder for purchase order inputs
pub struct PurchaseOrderBuilder {
    distributor_id: DistributorId,
    quantity: u32,
    unit_cost: Money,
    unit_freight: Money,
    initial_payment: Money,
}

impl Default for PurchaseOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseOrderBuilder {
    pub fn new() -> Self {
        Self {
            distributor_id: DistributorId::new(),
            quantity: 100,
            unit_cost: MoneyFixtures::reference_cost(),
            unit_freight: MoneyFixtures::reference_freight(),
            initial_payment: Money::zero(),
        }
    }

    pub fn distributor(mut self, distributor_id: DistributorId) -> Self {
        self.distributor_id = distributor_id;
        self
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn unit_cost(mut self, amount: Decimal) -> Self {
        self.unit_cost = Money::new(amount);
        self
    }

    pub fn unit_freight(mut self, amount: Decimal) -> Self {
        self.unit_freight = Money::new(amount);
        self
    }

    pub fn initial_payment(mut self, amount: Decimal) -> Self {
        self.initial_payment = Money::new(amount);
        self
    }

    /// Small order with cheap units, handy for stock tests
    pub fn small() -> Self {
        Self::new().quantity(10).unit_cost(dec!(100)).unit_freight(dec!(10))
    }

    pub fn build(self) -> NewPurchaseOrder {
        NewPurchaseOrder {
            distributor_id: self.distributor_id,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            unit_freight: self.unit_freight,
            initial_payment: self.initial_payment,
        }
    }
}
