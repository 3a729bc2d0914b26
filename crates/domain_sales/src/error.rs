//! Sales domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{ClientId, PortError, PurchaseOrderId, ReturnId, SaleId};
use domain_distribution::DistributionError;
use domain_ledger::{BankId, LedgerError};

/// Errors returned by the sale lifecycle and return managers
///
/// Only [`SalesError::TransactionFailed`] is retryable. Everything else is
/// terminal for the given input.
#[derive(Debug, Error)]
pub enum SalesError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    #[error("Invalid {field}: {value}")]
    InvalidPrice { field: &'static str, value: Decimal },

    #[error("Invalid sale input: {}", .0.join("; "))]
    InvalidSaleInput(Vec<String>),

    #[error("Sale with negative margin: {margin_percent}%")]
    NegativeMargin { margin_percent: Decimal },

    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Sale not found: {0}")]
    SaleNotFound(SaleId),

    #[error("Return not found: {0}")]
    ReturnNotFound(ReturnId),

    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(PurchaseOrderId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Payment of {amount} exceeds remaining balance {remaining}")]
    ExcessPayment { amount: Decimal, remaining: Decimal },

    #[error("Invalid return quantity {requested}: between 1 and {available} units can be returned")]
    InvalidReturnQuantity { requested: u32, available: u32 },

    #[error("A return request is already pending for sale {0}")]
    DuplicateReturnRequest(SaleId),

    #[error("Invalid {entity} state transition from {from} to {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Sale {sale_id} is {state} and accepts no further operations")]
    SaleClosed { sale_id: SaleId, state: String },

    #[error("Invalid lot allocation: {0}")]
    InvalidLots(String),

    #[error("Insufficient stock in {purchase_order_id}: available {available}, requested {requested}")]
    InsufficientStock {
        purchase_order_id: PurchaseOrderId,
        available: u32,
        requested: u32,
    },

    #[error("Insufficient funds in {bank}: available {available}, requested {requested}")]
    InsufficientFunds {
        bank: BankId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    /// The store aborted the transaction; nothing was applied
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[source] PortError),
}

impl SalesError {
    /// True only for failures where retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SalesError::TransactionFailed(_))
    }
}

impl From<DistributionError> for SalesError {
    fn from(error: DistributionError) -> Self {
        match error {
            DistributionError::InvalidQuantity(q) => SalesError::InvalidQuantity(q),
            DistributionError::InvalidPrice { field, value } => SalesError::InvalidPrice { field, value },
        }
    }
}

impl From<LedgerError> for SalesError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InvalidAmount(value) => SalesError::InvalidAmount(value),
            LedgerError::InsufficientFunds { bank, available, requested } => {
                SalesError::InsufficientFunds { bank, available, requested }
            }
            other => SalesError::Ledger(other),
        }
    }
}

impl From<PortError> for SalesError {
    fn from(error: PortError) -> Self {
        if error.is_transient() {
            SalesError::TransactionFailed(error.to_string())
        } else {
            SalesError::Storage(error)
        }
    }
}
