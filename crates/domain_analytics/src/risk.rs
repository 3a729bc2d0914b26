//! Client and distributor scoring
//!
//! Pure threshold functions over aggregate history. Scores are integers in
//! `0..=100`; every function is monotonic in its inputs so that a better
//! history never produces a worse outcome.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::Money;

/// Weight of punctuality in the credit score
const PUNCTUALITY_WEIGHT: Decimal = dec!(0.4);

/// Days without purchases after which an indebted client is delinquent
pub const DELINQUENT_AFTER_DAYS: u32 = 60;

/// Days without purchases after which a client is inactive
pub const INACTIVE_AFTER_DAYS: u32 = 180;

fn clamp_percent(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(dec!(100))
}

fn to_score(value: Decimal) -> u8 {
    clamp_percent(value)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap_or(0)
}

/// Credit score of a client
///
/// Punctuality weighs 40 points, the share of late payments up to 30 and
/// the use of the credit line up to 30. The credit line is ignored when
/// `credit_limit` is zero.
pub fn credit_score(
    on_time_percent: Decimal,
    late_percent: Decimal,
    outstanding_debt: Money,
    credit_limit: Money,
) -> u8 {
    let punctuality = clamp_percent(on_time_percent) * PUNCTUALITY_WEIGHT;

    let late = clamp_percent(late_percent);
    let lateness = if late <= dec!(5) {
        dec!(30)
    } else if late <= dec!(15) {
        dec!(25)
    } else if late <= dec!(30) {
        dec!(20)
    } else if late <= dec!(45) {
        dec!(10)
    } else {
        Decimal::ZERO
    };

    let utilization = match outstanding_debt.non_negative().ratio_of(credit_limit) {
        None => dec!(30),
        Some(ratio) => {
            let used = ratio * dec!(100);
            if used > dec!(90) {
                Decimal::ZERO
            } else if used > dec!(75) {
                dec!(10)
            } else if used > dec!(50) {
                dec!(20)
            } else {
                dec!(30)
            }
        }
    };

    to_score(punctuality + lateness + utilization)
}

/// Client score derived from purchase history alone
///
/// Starts at 50, moves by the debt-to-purchases ratio and the on-time
/// share, and is clamped to `0..=100`.
pub fn client_score_from_history(total_purchases: Money, outstanding_debt: Money, on_time_percent: Decimal) -> u8 {
    let mut score = dec!(50);

    score += if !outstanding_debt.is_positive() {
        dec!(30)
    } else {
        match outstanding_debt.ratio_of(total_purchases) {
            Some(ratio) if ratio < dec!(0.10) => dec!(20),
            Some(ratio) if ratio < dec!(0.30) => dec!(10),
            _ => dec!(-20),
        }
    };

    let on_time = clamp_percent(on_time_percent);
    score += if on_time >= dec!(80) {
        dec!(20)
    } else if on_time >= dec!(50) {
        dec!(10)
    } else {
        dec!(-10)
    };

    to_score(score)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCategory {
    Vip,
    Frequent,
    Occasional,
    New,
    Inactive,
    Delinquent,
}

impl fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientCategory::Vip => "vip",
            ClientCategory::Frequent => "frequent",
            ClientCategory::Occasional => "occasional",
            ClientCategory::New => "new",
            ClientCategory::Inactive => "inactive",
            ClientCategory::Delinquent => "delinquent",
        };
        f.write_str(s)
    }
}

/// Buckets a client by ordered rules
///
/// Delinquency wins over inactivity, which wins over every volume bucket.
pub fn categorize_client(
    score: u8,
    purchase_count: u32,
    days_since_last_purchase: u32,
    outstanding_debt: Money,
    total_purchases: Money,
) -> ClientCategory {
    if outstanding_debt.is_positive() && days_since_last_purchase > DELINQUENT_AFTER_DAYS {
        return ClientCategory::Delinquent;
    }
    if days_since_last_purchase > INACTIVE_AFTER_DAYS {
        return ClientCategory::Inactive;
    }
    if purchase_count < 3 {
        return ClientCategory::New;
    }
    if score >= 85 && (purchase_count >= 10 || total_purchases >= Money::new(dec!(1000000))) {
        return ClientCategory::Vip;
    }
    if purchase_count >= 5 && days_since_last_purchase <= 30 {
        return ClientCategory::Frequent;
    }
    ClientCategory::Occasional
}

/// Suggested credit limit, rounded to the nearest thousand
///
/// Twice the average purchase, scaled by the score band and raised when
/// the client has generated more profit than an average purchase.
pub fn credit_limit(average_purchase: Money, score: u8, profit_generated: Money) -> Money {
    let mut limit = average_purchase.non_negative().amount() * dec!(2);

    limit *= match score {
        80..=u8::MAX => dec!(1.5),
        60..=79 => dec!(1.2),
        40..=59 => Decimal::ONE,
        _ => dec!(0.5),
    };

    if profit_generated > average_purchase {
        limit *= dec!(1.3);
    }

    let thousands = (limit / dec!(1000)).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Money::new(thousands * dec!(1000))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributorCategory {
    Strategic,
    Preferred,
    Regular,
    Occasional,
    New,
}

/// Buckets a distributor by order count, volume and margin
pub fn categorize_distributor(
    order_count: u32,
    total_ordered: Money,
    average_margin_percent: Decimal,
) -> DistributorCategory {
    if order_count < 2 {
        return DistributorCategory::New;
    }
    if total_ordered > Money::new(dec!(100000)) && average_margin_percent >= dec!(30) {
        return DistributorCategory::Strategic;
    }
    if total_ordered > Money::new(dec!(50000)) || average_margin_percent >= dec!(40) {
        return DistributorCategory::Preferred;
    }
    if order_count >= 3 {
        return DistributorCategory::Regular;
    }
    DistributorCategory::Occasional
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(value: Decimal) -> Money {
        Money::new(value)
    }

    #[test]
    fn test_perfect_client_scores_100() {
        assert_eq!(credit_score(dec!(100), dec!(0), Money::zero(), m(dec!(10000))), 100);
    }

    #[test]
    fn test_credit_score_tiers() {
        // 80 * 0.4 + 25 + 20
        assert_eq!(credit_score(dec!(80), dec!(10), m(dec!(6000)), m(dec!(10000))), 77);
        // maxed-out line, chronic lateness
        assert_eq!(credit_score(dec!(20), dec!(60), m(dec!(9500)), m(dec!(10000))), 8);
    }

    #[test]
    fn test_zero_limit_ignores_utilization() {
        assert_eq!(credit_score(dec!(50), dec!(50), m(dec!(1000000)), Money::zero()), 50);
    }

    #[test]
    fn test_out_of_range_inputs_clamped() {
        assert_eq!(credit_score(dec!(150), dec!(-10), Money::zero(), Money::zero()), 100);
    }

    #[test]
    fn test_history_score() {
        assert_eq!(client_score_from_history(m(dec!(100000)), Money::zero(), dec!(90)), 100);
        assert_eq!(client_score_from_history(m(dec!(100000)), m(dec!(5000)), dec!(60)), 80);
        assert_eq!(client_score_from_history(m(dec!(100000)), m(dec!(50000)), dec!(10)), 20);
        assert_eq!(client_score_from_history(Money::zero(), m(dec!(100)), dec!(10)), 20);
    }

    #[test]
    fn test_categorization_priority() {
        let debt = m(dec!(5000));
        let volume = m(dec!(2000000));

        assert_eq!(categorize_client(95, 20, 61, debt, volume), ClientCategory::Delinquent);
        assert_eq!(categorize_client(95, 20, 181, Money::zero(), volume), ClientCategory::Inactive);
        assert_eq!(categorize_client(95, 2, 1, Money::zero(), volume), ClientCategory::New);
        assert_eq!(categorize_client(95, 4, 1, Money::zero(), volume), ClientCategory::Vip);
        assert_eq!(categorize_client(70, 6, 10, debt, volume), ClientCategory::Frequent);
        assert_eq!(categorize_client(70, 6, 45, debt, volume), ClientCategory::Occasional);
    }

    #[test]
    fn test_credit_limit() {
        assert_eq!(credit_limit(m(dec!(10000)), 85, m(dec!(5000))), m(dec!(30000)));
        assert_eq!(credit_limit(m(dec!(10000)), 85, m(dec!(20000))), m(dec!(39000)));
        assert_eq!(credit_limit(m(dec!(10000)), 30, Money::zero()), m(dec!(10000)));
        assert_eq!(credit_limit(m(dec!(1234)), 50, Money::zero()), m(dec!(2000)));
    }

    #[test]
    fn test_distributor_categories() {
        assert_eq!(categorize_distributor(1, m(dec!(1000000)), dec!(50)), DistributorCategory::New);
        assert_eq!(categorize_distributor(5, m(dec!(150000)), dec!(30)), DistributorCategory::Strategic);
        assert_eq!(categorize_distributor(2, m(dec!(60000)), dec!(10)), DistributorCategory::Preferred);
        assert_eq!(categorize_distributor(3, m(dec!(1000)), dec!(10)), DistributorCategory::Regular);
        assert_eq!(categorize_distributor(2, m(dec!(1000)), dec!(10)), DistributorCategory::Occasional);
    }
}
