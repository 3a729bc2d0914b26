//! The GYA three-way split
//!
//! For a sale of `quantity` units:
//!
//! ```text
//! cost    = unit_cost   × quantity
//! freight = unit_freight × quantity
//! profit  = (unit_sale_price − unit_cost − unit_freight) × quantity
//! total   = unit_sale_price × quantity
//! ```
//!
//! The sale price already includes freight recovery, so freight is never
//! added on top of it. A negative profit pool is reported, not rejected.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, percentage};
use crate::error::DistributionError;
use crate::DEFAULT_FREIGHT_PER_UNIT;

/// Allocation of a sale total across the three capital pools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Amount routed to the cost-recovery pool
    pub cost_pool: Money,
    /// Amount routed to the freight pool
    pub freight_pool: Money,
    /// Amount routed to the profit pool (negative for a loss-making sale)
    pub profit_pool: Money,
    /// Sale total
    pub total: Money,
}

impl Distribution {
    /// A distribution with every field at zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// Cost plus freight
    pub fn total_cost(&self) -> Money {
        self.cost_pool + self.freight_pool
    }

    /// Sum of the three pools
    pub fn pool_sum(&self) -> Money {
        self.cost_pool + self.freight_pool + self.profit_pool
    }

    /// `total − (cost + freight + profit)`
    pub fn drift(&self) -> Money {
        self.total - self.pool_sum()
    }

    /// Whether the pools sum to the total within `tolerance`
    pub fn is_balanced(&self, tolerance: Money) -> bool {
        self.drift().abs() <= tolerance
    }

    /// profit / total × 100, or zero for an empty total
    pub fn net_margin_percent(&self) -> Decimal {
        percentage(self.profit_pool.amount(), self.total.amount())
    }

    /// profit / (cost + freight) × 100, or zero when there is no cost
    pub fn gross_margin_percent(&self) -> Decimal {
        percentage(self.profit_pool.amount(), self.total_cost().amount())
    }

    pub fn is_loss_making(&self) -> bool {
        self.profit_pool.is_negative()
    }
}

/// Per-unit prices and quantity of a sale line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEconomics {
    pub unit_sale_price: Money,
    pub unit_cost_price: Money,
    /// Freight per unit; [`DEFAULT_FREIGHT_PER_UNIT`] when absent
    pub unit_freight: Option<Money>,
    pub quantity: u32,
}

impl UnitEconomics {
    pub fn new(unit_sale_price: Money, unit_cost_price: Money, unit_freight: Money, quantity: u32) -> Self {
        Self {
            unit_sale_price,
            unit_cost_price,
            unit_freight: Some(unit_freight),
            quantity,
        }
    }

    /// Freight per unit, falling back to the house default
    pub fn freight_or_default(&self) -> Money {
        self.unit_freight
            .unwrap_or_else(|| Money::new(DEFAULT_FREIGHT_PER_UNIT))
    }

    /// Computes the distribution for these economics
    pub fn distribution(&self) -> Result<Distribution, DistributionError> {
        compute_distribution(
            self.unit_sale_price,
            self.unit_cost_price,
            self.freight_or_default(),
            self.quantity,
        )
    }
}

/// Computes the GYA distribution for a sale
///
/// # Arguments
///
/// * `unit_sale_price` - Price charged per unit (freight included), must be > 0
/// * `unit_cost_price` - Purchase cost per unit, must be > 0
/// * `unit_freight` - Freight per unit, must be ≥ 0
/// * `quantity` - Units sold, must be > 0
///
/// # Errors
///
/// `InvalidQuantity` for a zero quantity, `InvalidPrice` for any price
/// outside its range.
///
/// # Example
///
/// ```rust
/// use core_kernel::Money;
/// use domain_distribution::compute_distribution;
/// use rust_decimal_macros::dec;
///
/// let d = compute_distribution(
///     Money::new(dec!(10000)),
///     Money::new(dec!(6300)),
///     Money::new(dec!(500)),
///     10,
/// ).unwrap();
/// assert_eq!(d.profit_pool, Money::new(dec!(32000)));
/// ```
pub fn compute_distribution(
    unit_sale_price: Money,
    unit_cost_price: Money,
    unit_freight: Money,
    quantity: u32,
) -> Result<Distribution, DistributionError> {
    if quantity == 0 {
        return Err(DistributionError::InvalidQuantity(quantity));
    }
    if !unit_sale_price.is_positive() {
        return Err(DistributionError::InvalidPrice {
            field: "unit_sale_price",
            value: unit_sale_price.amount(),
        });
    }
    if !unit_cost_price.is_positive() {
        return Err(DistributionError::InvalidPrice {
            field: "unit_cost_price",
            value: unit_cost_price.amount(),
        });
    }
    if unit_freight.is_negative() {
        return Err(DistributionError::InvalidPrice {
            field: "unit_freight",
            value: unit_freight.amount(),
        });
    }

    let qty = Decimal::from(quantity);
    let unit_profit = unit_sale_price - unit_cost_price - unit_freight;

    Ok(Distribution {
        cost_pool: (unit_cost_price * qty).round_to_cents(),
        freight_pool: (unit_freight * qty).round_to_cents(),
        profit_pool: (unit_profit * qty).round_to_cents(),
        total: (unit_sale_price * qty).round_to_cents(),
    })
}

/// Rounding tolerance accepted between the pool sum and the total
pub fn cent_tolerance() -> Money {
    Money::new(dec!(0.01))
}
