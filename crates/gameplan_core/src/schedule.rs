//! Calendar frequencies and the date grids they generate.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::date_math::{
    add_days, add_months, daily_dates, days_between, is_weekday, next_month_start,
};
use crate::error::ValidationError;

/// A calendar step between consecutive flow dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    /// Monday through Friday
    BusinessDaily,
    Weekly,
    BiWeekly,
    /// A fixed day count between dates
    EveryNDays(u16),
    /// Same day of month as the start date (clamped to month end)
    Monthly,
    /// First day of every month, starting at the first month start on or after the start date
    MonthStart,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Nominal number of periods in a year, used to annualize amounts
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Frequency::Daily => 365.0,
            Frequency::BusinessDaily => 260.0,
            Frequency::Weekly => 52.0,
            Frequency::BiWeekly => 26.0,
            Frequency::EveryNDays(n) => 365.0 / f64::from((*n).max(1)),
            Frequency::Monthly | Frequency::MonthStart => 12.0,
            Frequency::Quarterly => 4.0,
            Frequency::Yearly => 1.0,
        }
    }

    /// Every date of this frequency in `[start, end]`.
    ///
    /// Month-based steps are computed from `start` rather than from the
    /// previous date, so a schedule anchored on the 31st does not drift to the
    /// 28th after February.
    pub fn dates(&self, start: Date, end: Date) -> Vec<Date> {
        if end < start {
            return Vec::new();
        }
        match self {
            Frequency::Daily => daily_dates(start, end),
            Frequency::BusinessDaily => daily_dates(start, end)
                .into_iter()
                .filter(|d| is_weekday(*d))
                .collect(),
            Frequency::Weekly => step_days(start, end, 7),
            Frequency::BiWeekly => step_days(start, end, 14),
            Frequency::EveryNDays(n) => step_days(start, end, i32::from((*n).max(1))),
            Frequency::Monthly => step_months(start, end, 1),
            Frequency::MonthStart => step_months(next_month_start(start), end, 1),
            Frequency::Quarterly => step_months(start, end, 3),
            Frequency::Yearly => step_months(start, end, 12),
        }
    }

    /// Start of the resampling bucket containing `d`
    pub fn bucket_start(&self, d: Date) -> Date {
        match self {
            Frequency::Daily | Frequency::BusinessDaily | Frequency::EveryNDays(_) => d,
            Frequency::Weekly | Frequency::BiWeekly => {
                let offset = i32::from(d.weekday().to_monday_zero_offset());
                add_days(d, -offset)
            }
            Frequency::Monthly | Frequency::MonthStart => jiff::civil::date(d.year(), d.month(), 1),
            Frequency::Quarterly => {
                let month = ((d.month() - 1) / 3) * 3 + 1;
                jiff::civil::date(d.year(), month, 1)
            }
            Frequency::Yearly => jiff::civil::date(d.year(), 1, 1),
        }
    }
}

fn step_days(start: Date, end: Date, step: i32) -> Vec<Date> {
    let span = days_between(start, end);
    (0..=span / step).map(|k| add_days(start, k * step)).collect()
}

fn step_months(start: Date, end: Date, step: i32) -> Vec<Date> {
    let mut dates = Vec::new();
    let mut k = 0;
    loop {
        let d = add_months(start, k * step);
        if d > end {
            break;
        }
        dates.push(d);
        k += 1;
    }
    dates
}

/// A validated `(start, end, frequency)` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Date,
    end: Date,
    frequency: Frequency,
}

impl DateRange {
    pub fn new(start: Date, end: Date, frequency: Frequency) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        if frequency == Frequency::EveryNDays(0) {
            return Err(ValidationError::InvalidParameter {
                name: "day count",
                value: 0.0,
                reason: "fixed day-count frequency must be at least one day",
            });
        }
        Ok(Self {
            start,
            end,
            frequency,
        })
    }

    /// A daily horizon of `years` calendar years starting at `start`
    pub fn daily_horizon(start: Date, years: i32) -> Result<Self, ValidationError> {
        Self::new(start, add_months(start, years * 12), Frequency::Daily)
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn dates(&self) -> Vec<Date> {
        self.frequency.dates(self.start, self.end)
    }

    pub fn with_frequency(&self, frequency: Frequency) -> Self {
        Self { frequency, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_monthly_anchored_on_start_day() {
        let dates = Frequency::Monthly.dates(date(2025, 1, 31), date(2025, 4, 30));
        assert_eq!(
            dates,
            vec![
                date(2025, 1, 31),
                date(2025, 2, 28),
                date(2025, 3, 31),
                date(2025, 4, 30)
            ]
        );
    }

    #[test]
    fn test_month_start_rolls_forward() {
        let dates = Frequency::MonthStart.dates(date(2025, 1, 15), date(2025, 4, 1));
        assert_eq!(
            dates,
            vec![date(2025, 2, 1), date(2025, 3, 1), date(2025, 4, 1)]
        );
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // Fri 2025-01-03 .. Tue 2025-01-07
        let dates = Frequency::BusinessDaily.dates(date(2025, 1, 3), date(2025, 1, 7));
        assert_eq!(
            dates,
            vec![date(2025, 1, 3), date(2025, 1, 6), date(2025, 1, 7)]
        );
    }

    #[test]
    fn test_fixed_day_count() {
        let dates = Frequency::EveryNDays(10).dates(date(2025, 1, 1), date(2025, 1, 25));
        assert_eq!(
            dates,
            vec![date(2025, 1, 1), date(2025, 1, 11), date(2025, 1, 21)]
        );
    }

    #[test]
    fn test_single_day_range() {
        let d = date(2025, 6, 1);
        assert_eq!(Frequency::Yearly.dates(d, d), vec![d]);
    }

    #[test]
    fn test_date_range_rejects_end_before_start() {
        let err = DateRange::new(date(2025, 2, 1), date(2025, 1, 1), Frequency::Daily).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDateRange { .. }));
        let every_zero = Frequency::EveryNDays(0);
        assert!(DateRange::new(date(2025, 1, 1), date(2025, 2, 1), every_zero).is_err());
    }

    #[test]
    fn test_bucket_start() {
        let d = date(2025, 8, 14); // Thursday
        assert_eq!(Frequency::Monthly.bucket_start(d), date(2025, 8, 1));
        assert_eq!(Frequency::Quarterly.bucket_start(d), date(2025, 7, 1));
        assert_eq!(Frequency::Yearly.bucket_start(d), date(2025, 1, 1));
        assert_eq!(Frequency::Weekly.bucket_start(d), date(2025, 8, 11));
    }
}
