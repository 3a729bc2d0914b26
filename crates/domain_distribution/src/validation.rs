//! Pre-flight checks for sale economics
//!
//! These never mutate anything. `validate_sale_input` collects every
//! problem instead of stopping at the first one so a caller can show them
//! all at once; `validate_margin` is the business rule that blocks
//! loss-making sales and flags thin ones.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::distribution::{Distribution, UnitEconomics};

/// Outcome of the margin rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginCheck {
    /// False when the sale must not be created
    pub allowed: bool,
    /// Net margin the check was evaluated on
    pub margin_percent: Decimal,
    pub warnings: Vec<String>,
}

/// Applies the margin rule to a computed distribution
///
/// Negative profit is blocked, zero profit and margins under
/// `low_margin_percent` produce warnings.
pub fn validate_margin(distribution: &Distribution, low_margin_percent: Decimal) -> MarginCheck {
    let margin_percent = distribution.net_margin_percent();
    let mut warnings = Vec::new();

    if distribution.is_loss_making() {
        return MarginCheck {
            allowed: false,
            margin_percent,
            warnings: vec![format!("Negative margin: {}%", margin_percent)],
        };
    }

    if distribution.profit_pool.is_zero() {
        warnings.push("Sale produces no profit".to_string());
    } else if margin_percent < low_margin_percent {
        warnings.push(format!(
            "Low margin: {}% (below {}%)",
            margin_percent, low_margin_percent
        ));
    }

    MarginCheck {
        allowed: true,
        margin_percent,
        warnings,
    }
}

/// Collected errors and warnings for a sale line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates every field of a sale line, collecting all problems
pub fn validate_sale_input(economics: &UnitEconomics) -> ValidationReport {
    let mut report = ValidationReport::default();

    if economics.quantity == 0 {
        report.errors.push("Quantity must be greater than 0".to_string());
    }
    if !economics.unit_sale_price.is_positive() {
        report.errors.push("Sale price must be greater than 0".to_string());
    }
    if !economics.unit_cost_price.is_positive() {
        report.errors.push("Cost price must be greater than 0".to_string());
    }

    let freight = economics.freight_or_default();
    if freight.is_negative() {
        report.errors.push("Freight cannot be negative".to_string());
    }

    if report.is_valid() {
        let landed = economics.unit_cost_price + freight;
        if economics.unit_sale_price < landed {
            report.warnings.push(format!(
                "Sale price {} is below cost plus freight {}",
                economics.unit_sale_price, landed
            ));
        }
    }

    report
}
