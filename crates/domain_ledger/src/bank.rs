//! The three capital pools
//!
//! Exactly three banks exist. They are addressed by the closed [`BankId`]
//! enum and their balances change only by applying a [`BankDelta`] derived
//! from a movement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::Money;
use domain_distribution::Distribution;
use crate::error::LedgerError;

/// Identifier of a capital pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankId {
    /// Recovers the purchase cost of goods sold; receives client payments
    CostRecovery,
    /// Recovers freight
    Freight,
    /// Accumulates profit
    Profit,
}

impl BankId {
    /// All banks, in posting order
    pub const ALL: [BankId; 3] = [BankId::CostRecovery, BankId::Freight, BankId::Profit];

    /// Stable storage code
    pub fn code(&self) -> &'static str {
        match self {
            BankId::CostRecovery => "cost_recovery",
            BankId::Freight => "freight",
            BankId::Profit => "profit",
        }
    }

    /// The share of `distribution` routed to this bank
    pub fn amount_in(&self, distribution: &Distribution) -> Money {
        match self {
            BankId::CostRecovery => distribution.cost_pool,
            BankId::Freight => distribution.freight_pool,
            BankId::Profit => distribution.profit_pool,
        }
    }

    /// Short label used in movement concepts
    pub fn pool_label(&self) -> &'static str {
        match self {
            BankId::CostRecovery => "cost",
            BankId::Freight => "freight",
            BankId::Profit => "profit",
        }
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BankId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cost_recovery" => Ok(BankId::CostRecovery),
            "freight" => Ok(BankId::Freight),
            "profit" => Ok(BankId::Profit),
            other => Err(LedgerError::UnknownBank(other.to_string())),
        }
    }
}

/// Change to a bank's running balances
///
/// Stores apply deltas as atomic increments; nothing reads a balance,
/// adds to it in application code, and writes it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDelta {
    pub capital: Money,
    pub inflow: Money,
    pub outflow: Money,
}

/// A capital pool and its running balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub id: BankId,
    pub current_capital: Money,
    pub cumulative_inflow: Money,
    pub cumulative_outflow: Money,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bank {
    /// A bank with no history
    pub fn empty(id: BankId) -> Self {
        Self {
            id,
            current_capital: Money::zero(),
            cumulative_inflow: Money::zero(),
            cumulative_outflow: Money::zero(),
            updated_at: None,
        }
    }

    /// Applies a balance delta
    pub fn apply(&mut self, delta: &BankDelta, at: DateTime<Utc>) {
        self.current_capital += delta.capital;
        self.cumulative_inflow += delta.inflow;
        self.cumulative_outflow += delta.outflow;
        self.updated_at = Some(at);
    }

    /// Fails when the bank cannot cover `amount`
    pub fn ensure_available(&self, amount: Money) -> Result<(), LedgerError> {
        if self.current_capital < amount {
            return Err(LedgerError::InsufficientFunds {
                bank: self.id,
                available: self.current_capital.amount(),
                requested: amount.amount(),
            });
        }
        Ok(())
    }
}
