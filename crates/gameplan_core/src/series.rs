//! Date-indexed numeric series and the alignment rules the engine relies on.
//!
//! Every series keeps its dates strictly increasing. Alignment across series
//! happens over the sorted union of their dates; a date missing from one side
//! contributes zero (exact reindex) or the last known value (forward fill),
//! depending on the operation.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::date_math::daily_dates;
use crate::error::ValidationError;
use crate::schedule::Frequency;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    dates: Vec<Date>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dates: Vec<Date>, values: Vec<f64>) -> Result<Self, ValidationError> {
        if dates.len() != values.len() {
            return Err(ValidationError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::UnorderedDates);
        }
        Ok(Self { dates, values })
    }

    /// Callers guarantee equal lengths and strictly increasing dates.
    pub(crate) fn from_sorted(dates: Vec<Date>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        Self { dates, values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn constant(dates: Vec<Date>, value: f64) -> Result<Self, ValidationError> {
        let values = vec![value; dates.len()];
        Self::new(dates, values)
    }

    pub fn zeros(dates: Vec<Date>) -> Result<Self, ValidationError> {
        Self::constant(dates, 0.0)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<Date> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<Date> {
        self.dates.last().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Date, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Value recorded exactly on `date`
    pub fn get(&self, date: Date) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Value on `date`, or on the closest earlier date
    pub fn value_at_or_before(&self, date: Date) -> Option<f64> {
        match self.dates.binary_search(&date) {
            Ok(idx) => Some(self.values[idx]),
            Err(0) => None,
            Err(idx) => Some(self.values[idx - 1]),
        }
    }

    /// Sum of all values
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Sum of values on dates in `[from, until)`
    pub fn sum_between(&self, from: Date, until: Date) -> f64 {
        self.iter()
            .filter(|(d, _)| *d >= from && *d < until)
            .map(|(_, v)| v)
            .sum()
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    pub fn negate(&self) -> Self {
        self.map(|v| -v)
    }

    /// Element-wise combination with a series on the same dates; values of
    /// `other` missing on a date of `self` are treated as zero.
    pub fn zip_with(&self, other: &TimeSeries, f: impl Fn(f64, f64) -> f64) -> Self {
        let aligned = other.reindex(&self.dates, 0.0);
        Self {
            dates: self.dates.clone(),
            values: self
                .values
                .iter()
                .zip(aligned.values.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        }
    }

    /// Exact-match reindex onto `dates`; dates with no observation get `fill`.
    ///
    /// `dates` must be strictly increasing.
    pub fn reindex(&self, dates: &[Date], fill: f64) -> Self {
        let mut values = Vec::with_capacity(dates.len());
        let mut j = 0;
        for d in dates {
            while j < self.dates.len() && self.dates[j] < *d {
                j += 1;
            }
            if j < self.dates.len() && self.dates[j] == *d {
                values.push(self.values[j]);
            } else {
                values.push(fill);
            }
        }
        Self::from_sorted(dates.to_vec(), values)
    }

    /// Forward-fill reindex onto `dates`: each date takes the value of the
    /// latest observation on or before it, or `before_first` when there is none.
    ///
    /// `dates` must be strictly increasing.
    pub fn reindex_ffill(&self, dates: &[Date], before_first: f64) -> Self {
        let mut values = Vec::with_capacity(dates.len());
        let mut j = 0;
        let mut last: Option<f64> = None;
        for d in dates {
            while j < self.dates.len() && self.dates[j] <= *d {
                last = Some(self.values[j]);
                j += 1;
            }
            values.push(last.unwrap_or(before_first));
        }
        Self::from_sorted(dates.to_vec(), values)
    }

    /// Sorted, de-duplicated union of the dates of every series
    pub fn union_dates<'a>(series: impl IntoIterator<Item = &'a TimeSeries>) -> Vec<Date> {
        let mut dates: Vec<Date> = series
            .into_iter()
            .flat_map(|s| s.dates.iter().copied())
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Date-aligned sum over the union of all dates, missing values as zero
    pub fn sum_aligned<'a>(series: impl IntoIterator<Item = &'a TimeSeries> + Clone) -> Self {
        let dates = Self::union_dates(series.clone());
        let mut values = vec![0.0; dates.len()];
        for s in series {
            // union contains every date of s, so a merge walk finds each one
            let mut k = 0;
            for (d, v) in s.iter() {
                while dates[k] < d {
                    k += 1;
                }
                values[k] += v;
            }
        }
        Self::from_sorted(dates, values)
    }

    pub fn add(&self, other: &TimeSeries) -> Self {
        Self::sum_aligned([self, other])
    }

    /// Upsample onto a daily grid covering `[first_date, last_date]`,
    /// zero-filling days without an observation.
    pub fn to_daily(&self) -> Self {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => self.reindex(&daily_dates(first, last), 0.0),
            _ => Self::empty(),
        }
    }

    /// Sum values into buckets of `frequency`, keyed by bucket start
    pub fn resample_sum(&self, frequency: Frequency) -> Self {
        let mut dates: Vec<Date> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (d, v) in self.iter() {
            let bucket = frequency.bucket_start(d);
            if dates.last() == Some(&bucket) {
                if let Some(total) = values.last_mut() {
                    *total += v;
                }
            } else {
                dates.push(bucket);
                values.push(v);
            }
        }
        Self::from_sorted(dates, values)
    }

    /// Last observation of each bucket of `frequency`, keyed by bucket start
    pub fn resample_last(&self, frequency: Frequency) -> Self {
        let mut dates: Vec<Date> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (d, v) in self.iter() {
            let bucket = frequency.bucket_start(d);
            if dates.last() == Some(&bucket) {
                if let Some(last) = values.last_mut() {
                    *last = v;
                }
            } else {
                dates.push(bucket);
                values.push(v);
            }
        }
        Self::from_sorted(dates, values)
    }

    pub fn cumulative_sum(&self) -> Self {
        let mut running = 0.0;
        let values = self
            .values
            .iter()
            .map(|v| {
                running += v;
                running
            })
            .collect();
        Self::from_sorted(self.dates.clone(), values)
    }

    /// Observations on or after `date`
    pub fn slice_from(&self, date: Date) -> Self {
        let idx = self.dates.partition_point(|d| *d < date);
        Self::from_sorted(self.dates[idx..].to_vec(), self.values[idx..].to_vec())
    }
}
