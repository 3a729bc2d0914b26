//! Sale returns and their reversal
//!
//! ```text
//! requested ──approve──► approved ──process──► processed
//!     │
//!     └──reject──► rejected
//! ```
//!
//! Only processing touches banks, the client balance or stock. The reversal
//! is fixed when the return is requested; the refund is settled again at
//! processing against what the client has paid by then.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ClientId, Money, PurchaseOrderId, ReturnId, SaleId, UserId};
use domain_distribution::{scale, scale_amount, Distribution, Fraction};
use crate::error::SalesError;
use crate::sale::Sale;

/// Precision kept on the stored return proportion
const PROPORTION_PLACES: u32 = 6;

/// Return workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnState {
    Requested,
    Approved,
    Processed,
    Rejected,
}

impl ReturnState {
    pub fn code(&self) -> &'static str {
        match self {
            ReturnState::Requested => "requested",
            ReturnState::Approved => "approved",
            ReturnState::Processed => "processed",
            ReturnState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReturnState::Processed | ReturnState::Rejected)
    }

    fn can_transition_to(&self, target: ReturnState) -> bool {
        use ReturnState::*;
        matches!(
            (self, target),
            (Requested, Approved) | (Requested, Rejected) | (Approved, Processed)
        )
    }
}

impl fmt::Display for ReturnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for ReturnState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(ReturnState::Requested),
            "approved" => Ok(ReturnState::Approved),
            "processed" => Ok(ReturnState::Processed),
            "rejected" => Ok(ReturnState::Rejected),
            other => Err(format!("unknown return state: {}", other)),
        }
    }
}

/// Why the goods came back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Defective,
    WrongQuantity,
    WrongPrice,
    CustomerChangedMind,
    WrongProduct,
    Duplicate,
    Other,
}

impl ReturnReason {
    pub fn code(&self) -> &'static str {
        match self {
            ReturnReason::Defective => "defective",
            ReturnReason::WrongQuantity => "wrong_quantity",
            ReturnReason::WrongPrice => "wrong_price",
            ReturnReason::CustomerChangedMind => "customer_changed_mind",
            ReturnReason::WrongProduct => "wrong_product",
            ReturnReason::Duplicate => "duplicate",
            ReturnReason::Other => "other",
        }
    }
}

impl fmt::Display for ReturnReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for ReturnReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defective" => Ok(ReturnReason::Defective),
            "wrong_quantity" => Ok(ReturnReason::WrongQuantity),
            "wrong_price" => Ok(ReturnReason::WrongPrice),
            "customer_changed_mind" => Ok(ReturnReason::CustomerChangedMind),
            "wrong_product" => Ok(ReturnReason::WrongProduct),
            "duplicate" => Ok(ReturnReason::Duplicate),
            "other" => Ok(ReturnReason::Other),
            other => Err(format!("unknown return reason: {}", other)),
        }
    }
}

/// Whether the return covers the whole sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Total,
    Partial,
}

impl ReturnKind {
    pub fn code(&self) -> &'static str {
        match self {
            ReturnKind::Total => "total",
            ReturnKind::Partial => "partial",
        }
    }
}

/// Refund owed to the client for the paid share of the returned goods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    Pending,
    /// Nothing was paid, so nothing is refunded
    NotApplicable,
    Issued,
}

impl RefundState {
    pub fn code(&self) -> &'static str {
        match self {
            RefundState::Pending => "pending",
            RefundState::NotApplicable => "not_applicable",
            RefundState::Issued => "issued",
        }
    }
}

/// A caller's return request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub sale_id: SaleId,
    pub quantity: u32,
    pub reason: ReturnReason,
    pub notes: Option<String>,
    /// Put the units back into stock on processing
    pub restock: bool,
    /// Lot to restock; the sale's first lot when absent
    pub restock_purchase_order_id: Option<PurchaseOrderId>,
}

impl ReturnRequest {
    pub fn new(sale_id: SaleId, quantity: u32, reason: ReturnReason) -> Self {
        Self {
            sale_id,
            quantity,
            reason,
            notes: None,
            restock: true,
            restock_purchase_order_id: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn without_restock(mut self) -> Self {
        self.restock = false;
        self
    }

    pub fn restock_into(mut self, purchase_order_id: PurchaseOrderId) -> Self {
        self.restock = true;
        self.restock_purchase_order_id = Some(purchase_order_id);
        self
    }
}

/// A return against a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReturn {
    pub id: ReturnId,
    pub sale_id: SaleId,
    pub client_id: ClientId,
    pub kind: ReturnKind,
    pub reason: ReturnReason,
    pub notes: Option<String>,
    pub state: ReturnState,
    pub original_quantity: u32,
    pub requested_quantity: u32,
    /// `requested_quantity / original_quantity`
    pub proportion: Decimal,
    /// Base distribution scaled by the proportion
    pub reversal: Distribution,
    /// Paid share of the returned goods, credited back to the client
    pub refund_amount: Money,
    /// Unpaid share of the returned goods, removed from the client's debt
    pub forgiven_amount: Money,
    pub refund_state: RefundState,
    pub restock: bool,
    pub restock_purchase_order_id: Option<PurchaseOrderId>,
    pub requested_at: DateTime<Utc>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub processed_by: Option<UserId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl SaleReturn {
    /// Builds a requested return against `sale`
    ///
    /// `available` is the quantity not yet covered by processed or approved
    /// returns; the caller reads it inside the same transaction.
    ///
    /// # Errors
    ///
    /// - `SaleClosed` if the sale was returned or cancelled
    /// - `InvalidReturnQuantity` if the quantity is zero or above `available`
    pub fn request(
        sale: &Sale,
        request: &ReturnRequest,
        available: u32,
        at: DateTime<Utc>,
    ) -> Result<Self, SalesError> {
        sale.ensure_open()?;
        if request.quantity == 0 || request.quantity > available {
            return Err(SalesError::InvalidReturnQuantity {
                requested: request.quantity,
                available,
            });
        }

        let fraction = Fraction::of_units(request.quantity, sale.quantity);
        let reversal = scale(&sale.distribution, fraction);
        let (refund_amount, forgiven_amount, refund_state) =
            settlement(sale, &[], request.quantity, reversal.total);
        let kind = if request.quantity == sale.quantity {
            ReturnKind::Total
        } else {
            ReturnKind::Partial
        };
        Ok(Self {
            id: ReturnId::new_v7(),
            sale_id: sale.id,
            client_id: sale.client_id,
            kind,
            reason: request.reason,
            notes: request.notes.clone(),
            state: ReturnState::Requested,
            original_quantity: sale.quantity,
            requested_quantity: request.quantity,
            proportion: fraction.value().round_dp(PROPORTION_PLACES),
            reversal,
            refund_amount,
            forgiven_amount,
            refund_state,
            restock: request.restock,
            restock_purchase_order_id: if request.restock {
                request.restock_purchase_order_id.or_else(|| sale.primary_lot())
            } else {
                None
            },
            requested_at: at,
            approved_by: None,
            approved_at: None,
            processed_by: None,
            processed_at: None,
            rejection_reason: None,
            rejected_at: None,
        })
    }

    /// Recomputes the refund from the sale as it stands now
    ///
    /// `earlier` are the other returns of the sale; refunds already issued
    /// by processed ones are netted out of the paid amount, which is spread
    /// over the units not yet taken back.
    pub fn settle(&mut self, sale: &Sale, earlier: &[SaleReturn]) {
        let others: Vec<SaleReturn> = earlier.iter().filter(|r| r.id != self.id).cloned().collect();
        let (refund, forgiven, state) = settlement(sale, &others, self.requested_quantity, self.reversal.total);
        self.refund_amount = refund;
        self.forgiven_amount = forgiven;
        self.refund_state = state;
    }

    pub fn approve(&mut self, approver: UserId, at: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(ReturnState::Approved)?;
        self.approved_by = Some(approver);
        self.approved_at = Some(at);
        Ok(())
    }

    /// Marks the reversal as applied; the caller applies the ledger effects
    pub fn mark_processed(&mut self, processor: UserId, at: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(ReturnState::Processed)?;
        self.processed_by = Some(processor);
        self.processed_at = Some(at);
        if self.refund_state == RefundState::Pending {
            self.refund_state = RefundState::Issued;
        }
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(ReturnState::Rejected)?;
        self.rejection_reason = Some(reason.into());
        self.rejected_at = Some(at);
        Ok(())
    }

    pub fn is_total(&self) -> bool {
        self.kind == ReturnKind::Total
    }

    /// Whether this return still holds units of its sale
    pub fn reserves_quantity(&self) -> bool {
        matches!(self.state, ReturnState::Approved | ReturnState::Processed)
    }

    /// Fails unless the return may move to `target`
    pub fn ensure_transition(&self, target: ReturnState) -> Result<(), SalesError> {
        if !self.state.can_transition_to(target) {
            return Err(SalesError::InvalidStateTransition {
                entity: "return",
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, target: ReturnState) -> Result<(), SalesError> {
        self.ensure_transition(target)?;
        self.state = target;
        Ok(())
    }
}

/// Units of `sale` that can still be returned given its existing returns
pub fn returnable_quantity(sale: &Sale, returns: &[SaleReturn]) -> u32 {
    let reserved: u32 = returns
        .iter()
        .filter(|r| r.reserves_quantity())
        .map(|r| r.requested_quantity)
        .sum();
    sale.quantity.saturating_sub(reserved)
}

/// Refund, forgiven amount and refund state for `quantity` units of `sale`
fn settlement(sale: &Sale, earlier: &[SaleReturn], quantity: u32, reversal_total: Money) -> (Money, Money, RefundState) {
    let refunded: Money = earlier
        .iter()
        .filter(|r| r.state == ReturnState::Processed)
        .map(|r| r.refund_amount)
        .sum();
    let units_left = sale.quantity.saturating_sub(processed_quantity(earlier));
    let net_paid = (sale.paid_amount - refunded).non_negative();

    let refund = scale_amount(net_paid, Fraction::of_units(quantity, units_left)).min(reversal_total);
    let forgiven = (reversal_total - refund).non_negative();
    let state = if refund.is_positive() {
        RefundState::Pending
    } else {
        RefundState::NotApplicable
    };
    (refund, forgiven, state)
}

/// Units of `sale` already taken back by processed returns
pub fn processed_quantity(returns: &[SaleReturn]) -> u32 {
    returns
        .iter()
        .filter(|r| r.state == ReturnState::Processed)
        .map(|r| r.requested_quantity)
        .sum()
}
