//! Calendar arithmetic on `jiff::civil::Date` for schedules and compounding.
//!
//! Day counts and offsets are plain integers so callers can step through
//! thousands of dates without building `Span`s themselves.

use jiff::ToSpan;
use jiff::civil::{Date, Weekday};

/// Days per year used for elapsed-time fractions (continuous compounding and
/// discounting).
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Number of days from `d1` to `d2` (negative when `d2 < d1`).
#[inline]
pub fn days_between(d1: Date, d2: Date) -> i32 {
    (d2 - d1).get_days()
}

#[inline]
pub fn add_days(d: Date, n: i32) -> Date {
    d.saturating_add(n.days())
}

/// Add `n` calendar months, clamping the day to the end of the target month
/// (Jan 31 + 1 month = Feb 28/29).
#[inline]
pub fn add_months(d: Date, n: i32) -> Date {
    d.saturating_add(n.months())
}

#[inline]
pub fn add_years(d: Date, n: i32) -> Date {
    add_months(d, n * 12)
}

/// Elapsed years between two dates as a fraction of [`DAYS_PER_YEAR`].
#[inline]
pub fn years_between(d1: Date, d2: Date) -> f64 {
    f64::from(days_between(d1, d2)) / DAYS_PER_YEAR
}

#[inline]
pub fn is_weekday(d: Date) -> bool {
    !matches!(d.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// First day of the month containing `d`, or of the following month when `d`
/// is not already a month start.
pub fn next_month_start(d: Date) -> Date {
    if d.day() == 1 {
        d
    } else {
        add_months(d.first_of_month(), 1)
    }
}

/// Every calendar day in `[start, end]`.
pub fn daily_dates(start: Date, end: Date) -> Vec<Date> {
    if end < start {
        return Vec::new();
    }
    start.series(1.day()).take_while(|d| *d <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2024, 2, 29), date(2025, 2, 28)), 365);
        assert_eq!(days_between(date(2024, 1, 1), date(2025, 1, 1)), 366);
        assert_eq!(days_between(date(2000, 3, 1), date(2100, 3, 1)), 36_524);
        assert_eq!(days_between(date(2025, 12, 31), date(2026, 1, 1)), 1);
        assert_eq!(days_between(date(2026, 1, 1), date(2025, 12, 31)), -1);
    }

    #[test]
    fn test_add_days_crosses_leap_day() {
        assert_eq!(add_days(date(2024, 2, 28), 1), date(2024, 2, 29));
        assert_eq!(add_days(date(2024, 2, 29), 1), date(2024, 3, 1));
        assert_eq!(add_days(date(2025, 1, 1), -1), date(2024, 12, 31));
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(date(2025, 1, 31), 1), date(2025, 2, 28));
        assert_eq!(add_months(date(2024, 1, 31), 1), date(2024, 2, 29));
        assert_eq!(add_months(date(2025, 11, 15), 3), date(2026, 2, 15));
        assert_eq!(add_months(date(2025, 3, 15), -4), date(2024, 11, 15));
    }

    #[test]
    fn test_add_years_from_leap_day() {
        assert_eq!(add_years(date(2024, 2, 29), 1), date(2025, 2, 28));
        assert_eq!(add_years(date(2024, 2, 29), 4), date(2028, 2, 29));
    }

    #[test]
    fn test_next_month_start() {
        assert_eq!(next_month_start(date(2025, 3, 1)), date(2025, 3, 1));
        assert_eq!(next_month_start(date(2025, 3, 2)), date(2025, 4, 1));
        assert_eq!(next_month_start(date(2025, 12, 31)), date(2026, 1, 1));
    }

    #[test]
    fn test_daily_dates_inclusive() {
        let days = daily_dates(date(2025, 1, 30), date(2025, 2, 2));
        assert_eq!(
            days,
            vec![
                date(2025, 1, 30),
                date(2025, 1, 31),
                date(2025, 2, 1),
                date(2025, 2, 2)
            ]
        );
        assert!(daily_dates(date(2025, 2, 2), date(2025, 2, 1)).is_empty());
    }

    #[test]
    fn test_is_weekday() {
        // 2025-01-04 is a Saturday
        assert!(!is_weekday(date(2025, 1, 4)));
        assert!(!is_weekday(date(2025, 1, 5)));
        assert!(is_weekday(date(2025, 1, 6)));
    }
}
