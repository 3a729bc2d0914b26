//! Sales domain services
//!
//! Each service orchestrates one family of operations over a
//! [`LedgerStore`](crate::ports::LedgerStore). Every operation that touches
//! more than one entity runs inside a single session and either commits all
//! of its effects or none of them.

mod sales;
mod returns;
mod treasury;
mod purchasing;

pub use sales::SaleLifecycleService;
pub use returns::ReturnService;
pub use treasury::TreasuryService;
pub use purchasing::PurchasingService;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use core_kernel::Money;
use domain_distribution::{DEFAULT_FREIGHT_PER_UNIT, LOW_MARGIN_WARNING_PERCENT};

use crate::error::SalesError;
use crate::ports::LedgerSession;

/// Business settings the sale lifecycle applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPolicy {
    /// Freight per unit used when a sale gives none
    pub default_freight: Money,
    /// Net margin under which a sale is logged as thin
    pub low_margin_percent: Decimal,
}

impl Default for SalesPolicy {
    fn default() -> Self {
        Self {
            default_freight: Money::new(DEFAULT_FREIGHT_PER_UNIT),
            low_margin_percent: LOW_MARGIN_WARNING_PERCENT,
        }
    }
}

/// Commits the session when `outcome` is `Ok`, rolls it back otherwise
///
/// The original error is returned unchanged; a failed rollback is only
/// logged since the store discards uncommitted work anyway.
pub(crate) async fn complete<S, T>(session: S, outcome: Result<T, SalesError>) -> Result<T, SalesError>
where
    S: LedgerSession,
{
    match outcome {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = session.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}
