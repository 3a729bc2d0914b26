//! Append-only ledger entries
//!
//! A movement is written once per bank-affecting event and never edited.
//! Corrections are new, offsetting movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, MovementId, SaleId};
use domain_distribution::Distribution;
use crate::bank::{BankDelta, BankId};
use crate::error::LedgerError;

/// Direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Inflow,
    Outflow,
    TransferIn,
    TransferOut,
}

impl MovementKind {
    /// True for kinds that add capital to the bank
    pub fn is_credit(&self) -> bool {
        matches!(self, MovementKind::Inflow | MovementKind::TransferIn)
    }

    pub fn code(&self) -> &'static str {
        match self {
            MovementKind::Inflow => "inflow",
            MovementKind::Outflow => "outflow",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::TransferOut => "transfer_out",
        }
    }
}

/// Business event that produced a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementCategory {
    Sale,
    Payment,
    Return,
    Cancellation,
    Transfer,
    DistributorPayment,
}

impl MovementCategory {
    pub fn code(&self) -> &'static str {
        match self {
            MovementCategory::Sale => "sale",
            MovementCategory::Payment => "payment",
            MovementCategory::Return => "return",
            MovementCategory::Cancellation => "cancellation",
            MovementCategory::Transfer => "transfer",
            MovementCategory::DistributorPayment => "distributor_payment",
        }
    }
}

/// An immutable ledger entry against one bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub bank: BankId,
    pub related_sale_id: Option<SaleId>,
    pub kind: MovementKind,
    /// Signed amount: positive for credits, negative for debits
    pub amount: Money,
    pub concept: String,
    pub category: MovementCategory,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Records a movement of `magnitude` against `bank`
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if `magnitude` is negative. Zero is accepted so that a
    /// sale always leaves one entry per bank, even an empty freight pool.
    pub fn record(
        bank: BankId,
        kind: MovementKind,
        magnitude: Money,
        concept: impl Into<String>,
        category: MovementCategory,
        at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if magnitude.is_negative() {
            return Err(LedgerError::InvalidAmount(magnitude.amount()));
        }
        let magnitude = magnitude.round_to_cents();
        Ok(Self {
            id: MovementId::new_v7(),
            bank,
            related_sale_id: None,
            kind,
            amount: if kind.is_credit() { magnitude } else { -magnitude },
            concept: concept.into(),
            category,
            created_at: at,
        })
    }

    /// Links the movement to a sale
    pub fn for_sale(mut self, sale_id: SaleId) -> Self {
        self.related_sale_id = Some(sale_id);
        self
    }

    /// Unsigned size of the movement
    pub fn magnitude(&self) -> Money {
        self.amount.abs()
    }

    /// The balance change this movement causes on its bank
    pub fn delta(&self) -> BankDelta {
        let magnitude = self.magnitude();
        if self.kind.is_credit() {
            BankDelta {
                capital: magnitude,
                inflow: magnitude,
                outflow: Money::zero(),
            }
        } else {
            BankDelta {
                capital: -magnitude,
                inflow: Money::zero(),
                outflow: magnitude,
            }
        }
    }
}

/// Builds one movement per bank for the pools of `distribution`
///
/// `concept` receives the bank and returns the audit text for its entry.
pub fn distribution_movements<F>(
    distribution: &Distribution,
    kind: MovementKind,
    category: MovementCategory,
    sale_id: SaleId,
    at: DateTime<Utc>,
    concept: F,
) -> Result<Vec<Movement>, LedgerError>
where
    F: Fn(BankId) -> String,
{
    BankId::ALL
        .iter()
        .map(|bank| {
            Movement::record(*bank, kind, bank.amount_in(distribution), concept(*bank), category, at)
                .map(|m| m.for_sale(sale_id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_outflow_is_negative() {
        let m = Movement::record(
            BankId::Profit,
            MovementKind::Outflow,
            Money::new(dec!(120)),
            "Return reversal",
            MovementCategory::Return,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(m.amount, Money::new(dec!(-120)));
        assert_eq!(m.delta().capital, Money::new(dec!(-120)));
        assert_eq!(m.delta().outflow, Money::new(dec!(120)));
        assert_eq!(m.delta().inflow, Money::zero());
    }

    #[test]
    fn test_negative_magnitude_rejected() {
        let result = Movement::record(
            BankId::Freight,
            MovementKind::Inflow,
            Money::new(dec!(-1)),
            "bad",
            MovementCategory::Sale,
            Utc::now(),
        );
        assert_eq!(result, Err(LedgerError::InvalidAmount(dec!(-1))));
    }
}
