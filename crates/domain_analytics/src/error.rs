//! Analytics domain errors

use thiserror::Error;

use core_kernel::{PortError, PurchaseOrderId};

/// Errors raised while building read models
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(PurchaseOrderId),

    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}
