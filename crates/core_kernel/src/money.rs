//! Money types with precise decimal arithmetic
//!
//! All ledger amounts are single-currency values backed by `rust_decimal`.
//! Amounts are stored with 4 decimal places internally so that unit prices
//! multiplied by quantities stay exact; anything that lands in a bank or on
//! a sale record is rounded to cents with [`Money::round_to_cents`].

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Number of decimal places used for stored monetary amounts
pub const CENT_PLACES: u32 = 2;

const INTERNAL_PLACES: u32 = 4;

/// Rounds a decimal to cents, half away from zero
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CENT_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes `part / whole * 100` rounded to 2 places, or zero when `whole` is zero
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_cents(part / whole * dec!(100))
}

/// A monetary amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(INTERNAL_PLACES, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Creates Money from an integer amount of cents
    pub fn from_minor(cents: i64) -> Self {
        Self(Decimal::new(cents, CENT_PLACES))
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Rounds to whole cents (half away from zero)
    pub fn round_to_cents(&self) -> Self {
        Self(round_cents(self.0))
    }

    /// Multiplies by a scalar
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.0 * factor)
    }

    /// Multiplies by a scalar and rounds the result to cents
    pub fn scale(&self, factor: Decimal) -> Self {
        Self(round_cents(self.0 * factor))
    }

    /// Ratio of this amount to `whole`, or `None` when `whole` is zero
    pub fn ratio_of(&self, whole: Money) -> Option<Decimal> {
        if whole.is_zero() {
            None
        } else {
            Some(self.0 / whole.0)
        }
    }

    /// This amount as a percentage of `whole` (2 dp), zero when `whole` is zero
    pub fn percent_of(&self, whole: Money) -> Decimal {
        percentage(self.0, whole.0)
    }

    /// Clamps negative amounts to zero
    pub fn non_negative(&self) -> Self {
        if self.is_negative() {
            Self::zero()
        } else {
            *self
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, factor: Decimal) -> Self {
        self.multiply(factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_arithmetic_is_associative(
            a in -1_000_000i64..1_000_000i64,
            b in -1_000_000i64..1_000_000i64,
            c in -1_000_000i64..1_000_000i64
        ) {
            let ma = Money::from_minor(a);
            let mb = Money::from_minor(b);
            let mc = Money::from_minor(c);

            prop_assert_eq!((ma + mb) + mc, ma + (mb + mc));
        }

        #[test]
        fn scaled_amount_never_exceeds_original(
            cents in 0i64..1_000_000_000i64,
            permille in 0u32..=1000u32
        ) {
            let money = Money::from_minor(cents);
            let scaled = money.scale(Decimal::new(permille as i64, 3));
            prop_assert!(scaled <= money);
        }
    }
}
