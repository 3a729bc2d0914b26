//! Client balances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, Money};

/// A buying client and the running figures the ledger keeps for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    /// What the client owes; negative when the client holds a credit
    pub outstanding_balance: Money,
    /// Lifetime value of sales net of returns
    pub total_purchases: Money,
    /// Lifetime payments
    pub total_paid: Money,
    pub purchase_count: u32,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: ClientId::new_v7(),
            name: name.into(),
            outstanding_balance: Money::zero(),
            total_purchases: Money::zero(),
            total_paid: Money::zero(),
            purchase_count: 0,
            last_purchase_at: None,
            created_at: at,
        }
    }

    /// Applies an adjustment in place (used by the in-memory store)
    pub fn apply(&mut self, adjustment: &ClientAdjustment) {
        self.outstanding_balance += adjustment.balance;
        self.total_purchases += adjustment.purchases;
        self.total_paid += adjustment.paid;
        self.purchase_count = self.purchase_count.saturating_add_signed(adjustment.purchase_count);
        if let Some(at) = adjustment.last_purchase_at {
            self.last_purchase_at = Some(at);
        }
    }
}

/// Increments applied to a client's running figures
///
/// Stores apply these atomically (`balance = balance + $n`), never as a
/// read-modify-write in application code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAdjustment {
    pub balance: Money,
    pub purchases: Money,
    pub paid: Money,
    pub purchase_count: i32,
    pub last_purchase_at: Option<DateTime<Utc>>,
}

impl ClientAdjustment {
    /// A new sale: the client owes its full total
    pub fn sale(total: Money, at: DateTime<Utc>) -> Self {
        Self {
            balance: total,
            purchases: total,
            purchase_count: 1,
            last_purchase_at: Some(at),
            ..Default::default()
        }
    }

    /// A payment toward a sale
    pub fn payment(amount: Money) -> Self {
        Self {
            balance: -amount,
            paid: amount,
            ..Default::default()
        }
    }

    /// A processed return: the unpaid share of the reversal is forgiven and
    /// the refund of the paid share is credited to the client
    pub fn return_settlement(reversal_total: Money, forgiven: Money, refund: Money) -> Self {
        Self {
            balance: -(forgiven + refund),
            purchases: -reversal_total,
            ..Default::default()
        }
    }

    /// A cancelled, unpaid sale
    pub fn cancellation(total: Money) -> Self {
        Self {
            balance: -total,
            purchases: -total,
            purchase_count: -1,
            ..Default::default()
        }
    }
}
