//! Purchase orders (OC)
//!
//! A purchase order stocks inventory bought from a distributor. Sales draw
//! units from its lot; returns may put them back. Apart from stock and the
//! amount paid to the distributor, its fields never change after creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{DistributorId, Money, PurchaseOrderId};
use crate::error::SalesError;

/// How much of a purchase order has been paid to the distributor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributorPaymentState {
    Pending,
    Partial,
    Paid,
}

impl fmt::Display for DistributorPaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DistributorPaymentState::Pending => "pending",
            DistributorPaymentState::Partial => "partial",
            DistributorPaymentState::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// Input for a new purchase order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub distributor_id: DistributorId,
    pub quantity: u32,
    pub unit_cost: Money,
    pub unit_freight: Money,
    pub initial_payment: Money,
}

/// A distributor purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub distributor_id: DistributorId,
    pub quantity: u32,
    pub unit_cost: Money,
    pub unit_freight: Money,
    /// `(unit_cost + unit_freight) × quantity`
    pub total_cost: Money,
    pub paid_to_distributor: Money,
    pub stock_remaining: u32,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Creates a purchase order with its full quantity in stock
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` for a zero quantity
    /// - `InvalidPrice` for a non-positive unit cost or negative freight
    /// - `ExcessPayment` if the initial payment exceeds the total cost
    pub fn new(input: &NewPurchaseOrder, at: DateTime<Utc>) -> Result<Self, SalesError> {
        if input.quantity == 0 {
            return Err(SalesError::InvalidQuantity(0));
        }
        if !input.unit_cost.is_positive() {
            return Err(SalesError::InvalidPrice {
                field: "unit_cost",
                value: input.unit_cost.amount(),
            });
        }
        if input.unit_freight.is_negative() {
            return Err(SalesError::InvalidPrice {
                field: "unit_freight",
                value: input.unit_freight.amount(),
            });
        }
        if input.initial_payment.is_negative() {
            return Err(SalesError::InvalidAmount(input.initial_payment.amount()));
        }

        let total_cost = ((input.unit_cost + input.unit_freight) * Decimal::from(input.quantity)).round_to_cents();
        if input.initial_payment > total_cost {
            return Err(SalesError::ExcessPayment {
                amount: input.initial_payment.amount(),
                remaining: total_cost.amount(),
            });
        }

        Ok(Self {
            id: PurchaseOrderId::new_v7(),
            distributor_id: input.distributor_id,
            quantity: input.quantity,
            unit_cost: input.unit_cost,
            unit_freight: input.unit_freight,
            total_cost,
            paid_to_distributor: input.initial_payment.round_to_cents(),
            stock_remaining: input.quantity,
            created_at: at,
        })
    }

    /// Cost plus freight per unit
    pub fn unit_landed_cost(&self) -> Money {
        self.unit_cost + self.unit_freight
    }

    /// Amount still owed to the distributor, never negative
    pub fn debt(&self) -> Money {
        (self.total_cost - self.paid_to_distributor).non_negative()
    }

    pub fn stock_sold(&self) -> u32 {
        self.quantity.saturating_sub(self.stock_remaining)
    }

    /// Percentage of the total cost already paid
    pub fn payment_percent(&self) -> Decimal {
        self.paid_to_distributor.percent_of(self.total_cost)
    }

    /// `paid` once at least 99.9 % is covered
    pub fn payment_state(&self) -> DistributorPaymentState {
        if self.paid_to_distributor.is_zero() {
            DistributorPaymentState::Pending
        } else if self.payment_percent() >= dec!(99.9) {
            DistributorPaymentState::Paid
        } else {
            DistributorPaymentState::Partial
        }
    }

    /// Fails unless `units` can be drawn from the lot
    pub fn ensure_stock(&self, units: u32) -> Result<(), SalesError> {
        if units > self.stock_remaining {
            return Err(SalesError::InsufficientStock {
                purchase_order_id: self.id,
                available: self.stock_remaining,
                requested: units,
            });
        }
        Ok(())
    }

    /// Units that can be restocked without exceeding the original quantity
    pub fn restockable(&self, units: u32) -> u32 {
        units.min(self.quantity - self.stock_remaining.min(self.quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(initial_payment: Money) -> PurchaseOrder {
        PurchaseOrder::new(
            &NewPurchaseOrder {
                distributor_id: DistributorId::new(),
                quantity: 100,
                unit_cost: Money::new(dec!(6300)),
                unit_freight: Money::new(dec!(500)),
                initial_payment,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_totals_and_payment_state() {
        let po = order(Money::new(dec!(200000)));

        assert_eq!(po.unit_landed_cost(), Money::new(dec!(6800)));
        assert_eq!(po.total_cost, Money::new(dec!(680000)));
        assert_eq!(po.debt(), Money::new(dec!(480000)));
        assert_eq!(po.payment_state(), DistributorPaymentState::Partial);
        assert_eq!(po.stock_remaining, 100);
        assert_eq!(order(Money::zero()).payment_state(), DistributorPaymentState::Pending);
    }

    #[test]
    fn test_stock_checks() {
        let mut po = order(Money::zero());
        assert!(po.ensure_stock(100).is_ok());
        assert!(matches!(po.ensure_stock(101), Err(SalesError::InsufficientStock { .. })));

        po.stock_remaining = 95;
        assert_eq!(po.restockable(10), 5);
        assert_eq!(po.stock_sold(), 5);
    }
}
