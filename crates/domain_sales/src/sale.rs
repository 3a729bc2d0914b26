//! Sale aggregate
//!
//! A sale carries two orthogonal states. [`PaymentState`] follows the money
//! (`pending → partial → complete`); [`LifecycleState`] follows the goods
//! (`active → returned | cancelled`). Both closed lifecycle states are
//! terminal and block further payments.
//!
//! The sale's own totals are fixed at creation. Partial returns never mutate
//! them; the return records hold the reversed portion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ClientId, Money, PurchaseOrderId, SaleId};
use domain_distribution::{payment_distribution, Distribution, UnitEconomics};
use crate::error::SalesError;

/// Payment progress of a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Nothing paid yet
    Pending,
    /// Some, but not all, of the total paid
    Partial,
    /// Remaining amount is zero
    Complete,
}

impl PaymentState {
    /// Derives the payment state from what has been paid against a total
    pub fn for_amounts(paid: Money, total: Money) -> Self {
        if !paid.is_positive() {
            PaymentState::Pending
        } else if paid >= total {
            PaymentState::Complete
        } else {
            PaymentState::Partial
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Partial => "partial",
            PaymentState::Complete => "complete",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Goods lifecycle of a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    /// Every unit has been returned
    Returned,
    /// Voided before any payment
    Cancelled,
}

impl LifecycleState {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Returned => "returned",
            LifecycleState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LifecycleState::Active)
    }

    fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!((self, target), (Active, Returned) | (Active, Cancelled))
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Units of a sale sourced from one purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub purchase_order_id: PurchaseOrderId,
    pub quantity: u32,
    /// Landed unit cost of the lot at the time of the sale
    pub unit_cost: Money,
}

/// A caller's request to draw units from a purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRequest {
    pub purchase_order_id: PurchaseOrderId,
    pub quantity: u32,
}

impl LotRequest {
    pub fn new(purchase_order_id: PurchaseOrderId, quantity: u32) -> Self {
        Self {
            purchase_order_id,
            quantity,
        }
    }
}

/// Input for creating a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub client_id: ClientId,
    pub unit_sale_price: Money,
    pub unit_cost_price: Money,
    /// Falls back to the configured default freight when absent
    pub unit_freight: Option<Money>,
    pub quantity: u32,
    pub notes: Option<String>,
    #[serde(default)]
    pub lots: Vec<LotRequest>,
}

impl NewSale {
    pub fn new(client_id: ClientId, unit_sale_price: Money, unit_cost_price: Money, quantity: u32) -> Self {
        Self {
            client_id,
            unit_sale_price,
            unit_cost_price,
            unit_freight: None,
            quantity,
            notes: None,
            lots: Vec::new(),
        }
    }

    pub fn with_freight(mut self, unit_freight: Money) -> Self {
        self.unit_freight = Some(unit_freight);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_lot(mut self, purchase_order_id: PurchaseOrderId, quantity: u32) -> Self {
        self.lots.push(LotRequest::new(purchase_order_id, quantity));
        self
    }

    /// Unit economics with the freight resolved against `default_freight`
    pub fn economics(&self, default_freight: Money) -> UnitEconomics {
        UnitEconomics::new(
            self.unit_sale_price,
            self.unit_cost_price,
            self.unit_freight.unwrap_or(default_freight),
            self.quantity,
        )
    }

    /// Checks that lot quantities cover the sale exactly
    pub fn validate_lots(&self) -> Result<(), SalesError> {
        if self.lots.is_empty() {
            return Ok(());
        }
        if let Some(lot) = self.lots.iter().find(|l| l.quantity == 0) {
            return Err(SalesError::InvalidLots(format!(
                "lot {} has no units",
                lot.purchase_order_id
            )));
        }
        let allocated: u64 = self.lots.iter().map(|l| u64::from(l.quantity)).sum();
        if allocated != u64::from(self.quantity) {
            return Err(SalesError::InvalidLots(format!(
                "lots cover {} units but the sale has {}",
                allocated, self.quantity
            )));
        }
        Ok(())
    }
}

/// A recorded sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub client_id: ClientId,
    pub quantity: u32,
    pub unit_sale_price: Money,
    pub unit_cost_price: Money,
    pub unit_freight: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub remaining_amount: Money,
    pub payment_state: PaymentState,
    pub lifecycle_state: LifecycleState,
    /// Base distribution computed at creation
    pub distribution: Distribution,
    pub lots: Vec<LotAllocation>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Opens an unpaid, active sale for an already validated distribution
    pub fn open(
        input: &NewSale,
        economics: &UnitEconomics,
        distribution: Distribution,
        lots: Vec<LotAllocation>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SaleId::new_v7(),
            client_id: input.client_id,
            quantity: economics.quantity,
            unit_sale_price: economics.unit_sale_price,
            unit_cost_price: economics.unit_cost_price,
            unit_freight: economics.freight_or_default(),
            total_amount: distribution.total,
            paid_amount: Money::zero(),
            remaining_amount: distribution.total,
            payment_state: PaymentState::Pending,
            lifecycle_state: LifecycleState::Active,
            distribution,
            lots,
            notes: input.notes.clone(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.lifecycle_state.is_terminal()
    }

    /// Fails with `SaleClosed` for returned and cancelled sales
    pub fn ensure_open(&self) -> Result<(), SalesError> {
        if self.lifecycle_state.is_terminal() {
            return Err(SalesError::SaleClosed {
                sale_id: self.id,
                state: self.lifecycle_state.to_string(),
            });
        }
        Ok(())
    }

    /// Applies a payment, recomputing the remaining amount and payment state
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `SaleClosed` if the sale was returned or cancelled
    /// - `ExcessPayment` if `amount` exceeds the remaining balance
    pub fn apply_payment(&mut self, amount: Money, at: DateTime<Utc>) -> Result<(), SalesError> {
        if !amount.is_positive() {
            return Err(SalesError::InvalidAmount(amount.amount()));
        }
        self.ensure_open()?;
        if amount > self.remaining_amount {
            return Err(SalesError::ExcessPayment {
                amount: amount.amount(),
                remaining: self.remaining_amount.amount(),
            });
        }

        self.paid_amount += amount;
        self.remaining_amount = self.total_amount - self.paid_amount;
        self.payment_state = PaymentState::for_amounts(self.paid_amount, self.total_amount);
        self.updated_at = at;
        Ok(())
    }

    /// Marks every unit as returned
    pub fn mark_returned(&mut self, at: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(LifecycleState::Returned, at)
    }

    /// Voids an unpaid sale
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), SalesError> {
        if !self.paid_amount.is_zero() {
            return Err(self.transition_error(LifecycleState::Cancelled));
        }
        self.transition(LifecycleState::Cancelled, at)
    }

    /// Share of each pool covered by what has been paid so far
    pub fn payment_distribution(&self) -> Distribution {
        payment_distribution(&self.distribution, self.paid_amount)
    }

    /// Paid share of the total, between 0 and 100
    pub fn paid_percent(&self) -> Decimal {
        self.paid_amount.percent_of(self.total_amount)
    }

    /// The lot a return restocks by default
    pub fn primary_lot(&self) -> Option<PurchaseOrderId> {
        self.lots.first().map(|l| l.purchase_order_id)
    }

    fn transition(&mut self, target: LifecycleState, at: DateTime<Utc>) -> Result<(), SalesError> {
        if !self.lifecycle_state.can_transition_to(target) {
            return Err(self.transition_error(target));
        }
        self.lifecycle_state = target;
        self.updated_at = at;
        Ok(())
    }

    fn transition_error(&self, target: LifecycleState) -> SalesError {
        SalesError::InvalidStateTransition {
            entity: "sale",
            from: self.lifecycle_state.to_string(),
            to: target.to_string(),
        }
    }
}
