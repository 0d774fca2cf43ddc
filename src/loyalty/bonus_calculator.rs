use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

/// Fixed bonus granted once per calendar year on the holder's birthday
pub const BIRTHDAY_BONUS: Decimal = Decimal::ONE_THOUSAND;

/// Pure bonus arithmetic for the loyalty program
pub struct BonusCalculator;

impl BonusCalculator {
    /// Accrual percentage for a cumulative lifetime spend
    ///
    /// Boundaries are inclusive upward: exactly 15,000 already earns 3%.
    pub fn bonus_percentage(total_spent: Decimal) -> u32 {
        if total_spent >= Decimal::from(250_000) {
            10
        } else if total_spent >= Decimal::from(150_000) {
            7
        } else if total_spent >= Decimal::from(100_000) {
            6
        } else if total_spent >= Decimal::from(60_000) {
            5
        } else if total_spent >= Decimal::from(30_000) {
            4
        } else if total_spent >= Decimal::from(15_000) {
            3
        } else {
            1
        }
    }

    /// Bonus earned by a purchase at the rate for the given lifetime spend
    ///
    /// Callers accruing a purchase must pass the spend as it was BEFORE the
    /// purchase: the bonus is earned at the pre-purchase tier, not the tier
    /// the purchase itself unlocks.
    pub fn calculate_bonus(amount: Decimal, total_spent: Decimal) -> Decimal {
        amount * Decimal::from(Self::bonus_percentage(total_spent)) / Decimal::ONE_HUNDRED
    }

    /// Cap a redemption request: never more than the balance held, never
    /// more than the order is worth, never negative
    pub fn redemption_cap(requested: Decimal, balance: Decimal, order_total: Decimal) -> Decimal {
        requested.min(balance).min(order_total).max(Decimal::ZERO)
    }

    /// Whether the birthday bonus is due today
    ///
    /// Due when today matches the stored birth date's month and day and no
    /// grant has been recorded for the current calendar year.
    pub fn birthday_bonus_due(
        birth_date: Option<NaiveDate>,
        last_bonus: Option<NaiveDate>,
        today: NaiveDate,
    ) -> bool {
        let Some(birth_date) = birth_date else {
            return false;
        };
        if birth_date.month() != today.month() || birth_date.day() != today.day() {
            return false;
        }
        match last_bonus {
            Some(last) => last.year() < today.year(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_boundaries_take_higher_tier() {
        assert_eq!(BonusCalculator::bonus_percentage(dec!(0)), 1);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(14999.99)), 1);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(15000)), 3);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(29999.99)), 3);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(30000)), 4);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(60000)), 5);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(100000)), 6);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(150000)), 7);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(249999.99)), 7);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(250000)), 10);
        assert_eq!(BonusCalculator::bonus_percentage(dec!(1000000)), 10);
    }

    #[test]
    fn test_bonus_uses_exact_decimal_arithmetic() {
        assert_eq!(
            BonusCalculator::calculate_bonus(dec!(1000), dec!(0)),
            dec!(10)
        );
        assert_eq!(
            BonusCalculator::calculate_bonus(dec!(333.33), dec!(0)),
            dec!(3.3333)
        );
        assert_eq!(
            BonusCalculator::calculate_bonus(dec!(1000), dec!(250000)),
            dec!(100)
        );
    }

    #[test]
    fn test_bonus_at_pre_purchase_tier() {
        // Starting at 14,999 the purchase of 5,000 earns 1%, not the 3%
        // the resulting 19,999 would imply
        let bonus = BonusCalculator::calculate_bonus(dec!(5000), dec!(14999));
        assert_eq!(bonus, dec!(50));
    }

    #[test]
    fn test_redemption_cap_is_min_of_three() {
        assert_eq!(
            BonusCalculator::redemption_cap(dec!(500), dec!(300), dec!(1000)),
            dec!(300)
        );
        assert_eq!(
            BonusCalculator::redemption_cap(dec!(200), dec!(300), dec!(1000)),
            dec!(200)
        );
        assert_eq!(
            BonusCalculator::redemption_cap(dec!(5000), dec!(9000), dec!(1200)),
            dec!(1200)
        );
        assert_eq!(
            BonusCalculator::redemption_cap(dec!(-10), dec!(300), dec!(1000)),
            dec!(0)
        );
    }

    #[test]
    fn test_birthday_due_on_matching_day() {
        let birth = NaiveDate::from_ymd_opt(1990, 5, 14);
        let today = NaiveDate::from_ymd_opt(2026, 5, 14).unwrap();

        assert!(BonusCalculator::birthday_bonus_due(birth, None, today));
    }

    #[test]
    fn test_birthday_not_due_on_other_days() {
        let birth = NaiveDate::from_ymd_opt(1990, 5, 14);
        let today = NaiveDate::from_ymd_opt(2026, 5, 15).unwrap();

        assert!(!BonusCalculator::birthday_bonus_due(birth, None, today));
        assert!(!BonusCalculator::birthday_bonus_due(None, None, today));
    }

    #[test]
    fn test_birthday_granted_at_most_once_per_year() {
        let birth = NaiveDate::from_ymd_opt(1990, 5, 14);
        let today = NaiveDate::from_ymd_opt(2026, 5, 14).unwrap();

        // Second invocation on the same day: already stamped this year
        assert!(!BonusCalculator::birthday_bonus_due(birth, today.into(), today));

        // Granted last year: due again
        let last_year = NaiveDate::from_ymd_opt(2025, 5, 14);
        assert!(BonusCalculator::birthday_bonus_due(birth, last_year, today));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// The cap never exceeds any of its three inputs and is never negative
    #[test]
    fn prop_redemption_cap_bounds() {
        proptest!(|(
            requested_cents in 0u64..10_000_000,
            balance_cents in 0u64..10_000_000,
            total_cents in 0u64..10_000_000
        )| {
            let requested = Decimal::from(requested_cents) / Decimal::ONE_HUNDRED;
            let balance = Decimal::from(balance_cents) / Decimal::ONE_HUNDRED;
            let total = Decimal::from(total_cents) / Decimal::ONE_HUNDRED;

            let cap = BonusCalculator::redemption_cap(requested, balance, total);
            prop_assert!(cap >= Decimal::ZERO);
            prop_assert!(cap <= requested);
            prop_assert!(cap <= balance);
            prop_assert!(cap <= total);
            prop_assert_eq!(cap, requested.min(balance).min(total));
        });
    }

    /// Percentage is monotone in lifetime spend
    #[test]
    fn prop_percentage_monotone() {
        proptest!(|(a_cents in 0u64..100_000_000, b_cents in 0u64..100_000_000)| {
            let a = Decimal::from(a_cents) / Decimal::ONE_HUNDRED;
            let b = Decimal::from(b_cents) / Decimal::ONE_HUNDRED;
            if a <= b {
                prop_assert!(
                    BonusCalculator::bonus_percentage(a) <= BonusCalculator::bonus_percentage(b)
                );
            }
        });
    }

    /// Bonus equals amount * rate / 100 exactly
    #[test]
    fn prop_bonus_formula() {
        proptest!(|(amount_cents in 0u64..10_000_000, spent_cents in 0u64..100_000_000)| {
            let amount = Decimal::from(amount_cents) / Decimal::ONE_HUNDRED;
            let spent = Decimal::from(spent_cents) / Decimal::ONE_HUNDRED;

            let rate = Decimal::from(BonusCalculator::bonus_percentage(spent));
            prop_assert_eq!(
                BonusCalculator::calculate_bonus(amount, spent),
                amount * rate / Decimal::ONE_HUNDRED
            );
        });
    }
}
