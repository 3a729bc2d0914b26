//! Distribution domain errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while validating unit economics
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistributionError {
    #[error("Invalid quantity: {0} (must be greater than zero)")]
    InvalidQuantity(u32),

    #[error("Invalid {field}: {value}")]
    InvalidPrice { field: &'static str, value: Decimal },
}
