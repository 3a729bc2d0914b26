//! Inter-bank transfers
//!
//! A transfer is a pair of movements: transfer-out (negative) on the origin
//! and transfer-in (positive) on the destination. Both must be applied in
//! the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::Money;
use crate::bank::{Bank, BankId};
use crate::error::LedgerError;
use crate::movement::{Movement, MovementCategory, MovementKind};

/// The two legs of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub outgoing: Movement,
    pub incoming: Movement,
}

impl TransferPlan {
    /// Legs in application order
    pub fn into_movements(self) -> [Movement; 2] {
        [self.outgoing, self.incoming]
    }
}

/// Plans a transfer of `amount` from `origin` to `destination`
///
/// `origin` must be the balance read inside the transaction that will apply
/// the plan.
///
/// # Errors
///
/// - `InvalidAmount` if `amount` is not positive
/// - `SameBankTransfer` if both ends are the same bank
/// - `InsufficientFunds` if the origin cannot cover `amount`
pub fn plan_transfer(
    origin: &Bank,
    destination: BankId,
    amount: Money,
    concept: &str,
    at: DateTime<Utc>,
) -> Result<TransferPlan, LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(amount.amount()));
    }
    if origin.id == destination {
        return Err(LedgerError::SameBankTransfer(destination));
    }
    origin.ensure_available(amount)?;

    let outgoing = Movement::record(
        origin.id,
        MovementKind::TransferOut,
        amount,
        format!("Transfer to {}: {}", destination, concept),
        MovementCategory::Transfer,
        at,
    )?;
    let incoming = Movement::record(
        destination,
        MovementKind::TransferIn,
        amount,
        format!("Transfer from {}: {}", origin.id, concept),
        MovementCategory::Transfer,
        at,
    )?;

    Ok(TransferPlan { outgoing, incoming })
}
