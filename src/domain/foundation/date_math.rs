//! Billing-date rollover arithmetic.
//!
//! Both functions are total over valid `NaiveDate`s: the anchor day is
//! clamped to the length of the target month, and the result is always
//! strictly after `today`.

use chrono::{Datelike, NaiveDate};

/// Returns the last calendar day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Builds `year-month-day`, clamping `day` to the month's length.
pub fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.min(last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn shift_month(year: i32, month: u32, by: u32) -> (i32, u32) {
    let zero_based = month - 1 + by;
    (year + (zero_based / 12) as i32, zero_based % 12 + 1)
}

/// Next date after `today` on the anchor's day-of-month.
///
/// Day 31 lands on April 30, and Jan-31 rolls Feb-28/29 then Mar-31.
pub fn next_monthly_date(reference: NaiveDate, today: NaiveDate) -> NaiveDate {
    let anchor_day = reference.day();
    let candidate = clamped_date(today.year(), today.month(), anchor_day);
    if candidate > today {
        return candidate;
    }
    let (year, month) = shift_month(today.year(), today.month(), 1);
    clamped_date(year, month, anchor_day)
}

/// Next date after `today` on the anchor's month and day.
///
/// A Feb-29 anchor falls on Feb-28 in non-leap years.
pub fn next_annual_date(reference: NaiveDate, today: NaiveDate) -> NaiveDate {
    let candidate = clamped_date(today.year(), reference.month(), reference.day());
    if candidate > today {
        return candidate;
    }
    clamped_date(today.year() + 1, reference.month(), reference.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn last_day_handles_leap_february() {
        assert_eq!(last_day_of_month(2024, 2), 29);
        assert_eq!(last_day_of_month(2025, 2), 28);
        assert_eq!(last_day_of_month(2025, 12), 31);
        assert_eq!(last_day_of_month(2025, 4), 30);
    }

    #[test]
    fn monthly_keeps_anchor_day() {
        assert_eq!(next_monthly_date(d(2025, 3, 1), d(2025, 3, 1)), d(2025, 4, 1));
        assert_eq!(next_monthly_date(d(2025, 3, 15), d(2025, 3, 10)), d(2025, 3, 15));
    }

    #[test]
    fn monthly_clamps_day_31_to_april_30() {
        assert_eq!(next_monthly_date(d(2025, 1, 31), d(2025, 3, 31)), d(2025, 4, 30));
    }

    #[test]
    fn monthly_jan_31_rolls_through_february_and_back() {
        let anchor = d(2025, 1, 31);
        let feb = next_monthly_date(anchor, anchor);
        assert_eq!(feb, d(2025, 2, 28));
        let mar = next_monthly_date(anchor, feb);
        assert_eq!(mar, d(2025, 3, 31));

        let leap_anchor = d(2024, 1, 31);
        assert_eq!(next_monthly_date(leap_anchor, leap_anchor), d(2024, 2, 29));
        assert_eq!(next_monthly_date(leap_anchor, d(2024, 2, 29)), d(2024, 3, 31));
    }

    #[test]
    fn monthly_crosses_year_end() {
        assert_eq!(next_monthly_date(d(2025, 6, 20), d(2025, 12, 25)), d(2026, 1, 20));
    }

    #[test]
    fn annual_advances_one_year_when_date_passed() {
        assert_eq!(next_annual_date(d(2024, 5, 10), d(2025, 5, 10)), d(2026, 5, 10));
        assert_eq!(next_annual_date(d(2024, 5, 10), d(2025, 1, 1)), d(2025, 5, 10));
    }

    #[test]
    fn annual_feb_29_clamps_in_common_years() {
        let anchor = d(2024, 2, 29);
        assert_eq!(next_annual_date(anchor, anchor), d(2025, 2, 28));
        assert_eq!(next_annual_date(anchor, d(2027, 3, 1)), d(2028, 2, 29));
    }

    fn any_date() -> impl Strategy<Value = NaiveDate> {
        (1990i32..2100, 1u32..=12, 1u32..=31).prop_map(|(y, m, day)| clamped_date(y, m, day))
    }

    proptest! {
        #[test]
        fn monthly_is_strictly_after_today(anchor in any_date(), today in any_date()) {
            prop_assert!(next_monthly_date(anchor, today) > today);
        }

        #[test]
        fn annual_is_strictly_after_today(anchor in any_date(), today in any_date()) {
            prop_assert!(next_annual_date(anchor, today) > today);
        }

        #[test]
        fn monthly_chain_is_increasing_and_at_most_a_month_apart(anchor in any_date()) {
            let mut today = anchor;
            for _ in 0..30 {
                let next = next_monthly_date(anchor, today);
                prop_assert!(next > today);
                prop_assert!((next - today).num_days() <= 31);
                prop_assert_eq!(next.day(), anchor.day().min(last_day_of_month(next.year(), next.month())));
                today = next;
            }
        }

        #[test]
        fn annual_chain_keeps_anchor_month(anchor in any_date()) {
            let mut today = anchor;
            for _ in 0..10 {
                let next = next_annual_date(anchor, today);
                prop_assert!(next > today);
                prop_assert_eq!(next.month(), anchor.month());
                today = next;
            }
        }
    }
}
