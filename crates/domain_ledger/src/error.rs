//! Ledger domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::bank::BankId;

/// Errors that can occur while building or applying movements
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Movement magnitudes are unsigned; the kind carries the sign
    #[error("Invalid movement amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Cannot transfer from {0} to itself")]
    SameBankTransfer(BankId),

    #[error("Insufficient funds in {bank}: available {available}, requested {requested}")]
    InsufficientFunds {
        bank: BankId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Unknown bank: {0}")]
    UnknownBank(String),
}
