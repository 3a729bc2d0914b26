//! Proportional allocation of a distribution
//!
//! Used forward (the share of a sale already paid) and backward (the share
//! of a sale being returned). Every field is scaled by the same fraction and
//! rounded to cents on its own, so the pools may drift from the total by a
//! cent per field. [`RoundingPolicy::ResidueToProfit`] removes that drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::Money;
use crate::distribution::Distribution;

/// A fraction clamped to `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fraction(Decimal);

impl Fraction {
    pub const ZERO: Fraction = Fraction(Decimal::ZERO);
    pub const ONE: Fraction = Fraction(Decimal::ONE);

    /// Clamps `value` into `[0, 1]`
    pub fn clamped(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE))
    }

    /// `part / whole`, zero when `whole` is zero
    pub fn of(part: Money, whole: Money) -> Self {
        part.ratio_of(whole)
            .map(Self::clamped)
            .unwrap_or(Self::ZERO)
    }

    /// `part / whole` for unit counts, zero when `whole` is zero
    pub fn of_units(part: u32, whole: u32) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        Self::clamped(Decimal::from(part) / Decimal::from(whole))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_whole(&self) -> bool {
        self.0 == Decimal::ONE
    }
}

impl From<Decimal> for Fraction {
    fn from(value: Decimal) -> Self {
        Self::clamped(value)
    }
}

/// How cent rounding residue is handled when scaling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Each field rounded on its own; drift of up to a cent per pool is tolerated
    #[default]
    Independent,
    /// Profit pool absorbs the residue so that pools sum exactly to the total
    ResidueToProfit,
}

/// Scales every pool and the total by `fraction`, rounding each field to cents
///
/// Fractions outside `[0, 1]` are clamped.
pub fn scale(distribution: &Distribution, fraction: impl Into<Fraction>) -> Distribution {
    scale_with_policy(distribution, fraction, RoundingPolicy::Independent)
}

/// Scales a distribution under an explicit rounding policy
pub fn scale_with_policy(
    distribution: &Distribution,
    fraction: impl Into<Fraction>,
    policy: RoundingPolicy,
) -> Distribution {
    let f = fraction.into().value();
    let mut scaled = Distribution {
        cost_pool: distribution.cost_pool.scale(f),
        freight_pool: distribution.freight_pool.scale(f),
        profit_pool: distribution.profit_pool.scale(f),
        total: distribution.total.scale(f),
    };

    if policy == RoundingPolicy::ResidueToProfit {
        scaled.profit_pool = scaled.total - scaled.cost_pool - scaled.freight_pool;
    }

    scaled
}

/// Scales a single amount by `fraction`, rounded to cents
pub fn scale_amount(amount: Money, fraction: impl Into<Fraction>) -> Money {
    amount.scale(fraction.into().value())
}

/// Share of `base` attributable to `paid` out of `base.total`
///
/// This is the reporting view of a partially paid sale. It is computed on
/// demand and never stored.
pub fn payment_distribution(base: &Distribution, paid: Money) -> Distribution {
    scale(base, Fraction::of(paid, base.total))
}
