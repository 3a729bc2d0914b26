//! GYA Distribution Domain
//!
//! Pure functions that split a sale into the three capital pools
//! (cost recovery, freight, profit) and scale those splits proportionally
//! for partial payments and returns. No I/O happens in this crate.
//!
//! # Key Concepts
//!
//! - **Distribution**: cost + freight + profit pools and the sale total
//! - **Fraction**: a clamped `[0, 1]` share used to scale a distribution
//! - **Margin check**: the rule that blocks loss-making sales
//!
//! # Precision
//!
//! Pools are rounded to cents. Computing a distribution from cent-precise
//! prices is exact; scaling rounds each field independently unless
//! [`RoundingPolicy::ResidueToProfit`] is requested.

pub mod distribution;
pub mod allocator;
pub mod validation;
pub mod error;

pub use distribution::{Distribution, UnitEconomics, compute_distribution, cent_tolerance};
pub use allocator::{Fraction, RoundingPolicy, scale, scale_with_policy, scale_amount, payment_distribution};
pub use validation::{MarginCheck, ValidationReport, validate_margin, validate_sale_input};
pub use error::DistributionError;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Freight per unit assumed when a sale does not state one
pub const DEFAULT_FREIGHT_PER_UNIT: Decimal = dec!(500);

/// Net margin under which a sale is flagged as thin
pub const LOW_MARGIN_WARNING_PERCENT: Decimal = dec!(10);
