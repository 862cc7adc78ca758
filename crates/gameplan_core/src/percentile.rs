//! Weighted income percentiles over population microdata.
//!
//! Records come from an external survey extract; this module only filters them
//! into a cohort and ranks a salary against the cohort's weighted CDF.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::growth::income::INCOME_PERCENTILES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

/// One survey respondent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub total_income: f64,
    pub age: u8,
    pub sex: Sex,
    pub metro_area: String,
    /// Sampling weight
    pub weight: f64,
}

/// Demographic filter; unset fields match everyone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct CohortFilter {
    /// Substring of the metro area name
    pub metro_area: Option<String>,
    /// Inclusive age bounds
    pub ages: Option<(u8, u8)>,
    pub sex: Option<Sex>,
}

impl CohortFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metro_area(mut self, area: impl Into<String>) -> Self {
        self.metro_area = Some(area.into());
        self
    }

    pub fn age_between(mut self, low: u8, high: u8) -> Self {
        self.ages = Some((low.min(high), low.max(high)));
        self
    }

    /// Ages within `window` years of `age`
    pub fn age_around(self, age: u8, window: u8) -> Self {
        self.age_between(age.saturating_sub(window), age.saturating_add(window))
    }

    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn matches(&self, record: &PopulationRecord) -> bool {
        let area = self
            .metro_area
            .as_deref()
            .is_none_or(|area| record.metro_area.contains(area));
        let age = self
            .ages
            .is_none_or(|(low, high)| (low..=high).contains(&record.age));
        let sex = self.sex.is_none_or(|sex| record.sex == sex);
        area && age && sex
    }
}

/// Incomes sorted ascending with their cumulative normalized weight
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeDistribution {
    incomes: Vec<f64>,
    cdf: Vec<f64>,
}

impl IncomeDistribution {
    /// Build from the records `filter` accepts. Negative incomes count as zero.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a PopulationRecord>,
        filter: &CohortFilter,
    ) -> Result<Self, ValidationError> {
        let mut rows: Vec<(f64, f64)> = Vec::new();
        for record in records.into_iter().filter(|r| filter.matches(r)) {
            if !record.weight.is_finite() || record.weight < 0.0 {
                return Err(ValidationError::InvalidParameter {
                    name: "sampling weight",
                    value: record.weight,
                    reason: "must be finite and non-negative",
                });
            }
            if !record.total_income.is_finite() {
                return Err(ValidationError::InvalidParameter {
                    name: "income",
                    value: record.total_income,
                    reason: "must be finite",
                });
            }
            rows.push((record.total_income.max(0.0), record.weight));
        }

        let total: f64 = rows.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "cohort weight",
                value: total,
                reason: "cohort is empty or carries no weight",
            });
        }

        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut running = 0.0;
        let (incomes, cdf) = rows
            .into_iter()
            .map(|(income, w)| {
                running += w / total;
                (income, running)
            })
            .unzip();
        tracing::debug!(total_weight = total, "built income distribution");
        Ok(Self { incomes, cdf })
    }

    pub fn len(&self) -> usize {
        self.incomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incomes.is_empty()
    }

    /// Share of cohort weight earning at or below `income`, on a 0-100 scale
    pub fn percentile_of(&self, income: f64) -> f64 {
        let idx = self.incomes.partition_point(|x| *x <= income);
        if idx == 0 {
            0.0
        } else {
            (self.cdf[idx - 1] * 100.0).min(100.0)
        }
    }

    /// Lowest income whose cumulative weight reaches `q` (0-1)
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let idx = self.cdf.partition_point(|c| *c < q.clamp(0.0, 1.0) - 1e-12);
        self.incomes.get(idx.min(self.incomes.len().saturating_sub(1))).copied()
    }
}

/// `"1st"`, `"22nd"`, `"13th"`; rounds to the nearest whole percentile
pub fn ordinal_label(percentile: f64) -> String {
    let n = percentile.round().clamp(0.0, 100.0) as u32;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Decile column of the income growth table that `percentile` falls in
pub fn growth_bucket(percentile: f64) -> u8 {
    let p = percentile.clamp(0.0, 99.0);
    let bucket = ((p / 10.0).floor() * 10.0) as u8;
    let lowest = INCOME_PERCENTILES[0];
    let highest = INCOME_PERCENTILES[INCOME_PERCENTILES.len() - 1];
    bucket.clamp(lowest, highest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn record(income: f64, age: u8, sex: Sex, area: &str, weight: f64) -> PopulationRecord {
        PopulationRecord {
            total_income: income,
            age,
            sex,
            metro_area: area.into(),
            weight,
        }
    }

    #[test]
    fn test_weighted_rank_of_injected_value() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut records: Vec<PopulationRecord> = (0..500)
            .map(|_| {
                record(
                    rng.random_range(20_000.0..200_000.0),
                    30,
                    Sex::Female,
                    "Seattle",
                    rng.random_range(0.5..3.0),
                )
            })
            .collect();
        records.push(record(95_123.0, 30, Sex::Female, "Seattle", 2.0));

        let total: f64 = records.iter().map(|r| r.weight).sum();
        let at_or_below: f64 = records
            .iter()
            .filter(|r| r.total_income <= 95_123.0)
            .map(|r| r.weight)
            .sum();
        let expected = 100.0 * at_or_below / total;

        let dist = IncomeDistribution::from_records(&records, &CohortFilter::new()).unwrap();
        let got = dist.percentile_of(95_123.0);
        assert!((got - expected).abs() < 1e-9, "rank {got} vs expected {expected}");
    }

    #[test]
    fn test_cohort_filter() {
        let records = vec![
            record(50_000.0, 30, Sex::Male, "New York-Newark", 1.0),
            record(70_000.0, 45, Sex::Male, "New York-Newark", 1.0),
            record(90_000.0, 31, Sex::Female, "Boston", 1.0),
        ];
        let filter = CohortFilter::new().metro_area("New York").age_around(30, 2);
        assert_eq!(records.iter().filter(|r| filter.matches(r)).count(), 1);
        let filter = CohortFilter::new().sex(Sex::Female);
        let dist = IncomeDistribution::from_records(&records, &filter).unwrap();
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.percentile_of(90_000.0), 100.0);
        assert_eq!(dist.percentile_of(10.0), 0.0);
    }

    #[test]
    fn test_empty_cohort_is_an_error() {
        let records = vec![record(1.0, 30, Sex::Male, "Austin", 1.0)];
        let filter = CohortFilter::new().metro_area("Denver");
        assert!(IncomeDistribution::from_records(&records, &filter).is_err());
    }

    #[test]
    fn test_quantile() {
        let records: Vec<_> = (1..=4)
            .map(|i| record(f64::from(i) * 10.0, 40, Sex::Male, "x", 1.0))
            .collect();
        let dist = IncomeDistribution::from_records(&records, &CohortFilter::new()).unwrap();
        assert_eq!(dist.quantile(0.5), Some(20.0));
        assert_eq!(dist.quantile(1.0), Some(40.0));
        assert_eq!(dist.quantile(0.0), Some(10.0));
    }

    #[test]
    fn test_ordinal_label() {
        assert_eq!(ordinal_label(1.2), "1st");
        assert_eq!(ordinal_label(22.0), "22nd");
        assert_eq!(ordinal_label(43.0), "43rd");
        assert_eq!(ordinal_label(11.0), "11th");
        assert_eq!(ordinal_label(12.4), "12th");
        assert_eq!(ordinal_label(67.6), "68th");
    }

    #[test]
    fn test_growth_bucket() {
        assert_eq!(growth_bucket(100.0), 90);
        assert_eq!(growth_bucket(95.0), 90);
        assert_eq!(growth_bucket(57.3), 50);
        assert_eq!(growth_bucket(3.0), 10);
    }
}
