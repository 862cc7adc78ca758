//! Income growth anchored on an age -> income-by-percentile reference table.

use std::collections::BTreeMap;
use std::sync::Arc;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::GrowthCurve;
use super::fit::Polynomial;
use crate::date_math::days_between;
use crate::error::{EngineError, FitError, ValidationError};

/// Percentile columns the reference data is published for
pub const INCOME_PERCENTILES: [u8; 9] = [10, 20, 30, 40, 50, 60, 70, 80, 90];

/// Reference incomes by age (in days) for each percentile column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTable {
    ages: Vec<f64>,
    columns: BTreeMap<u8, Vec<f64>>,
}

impl IncomeTable {
    pub fn new(ages: Vec<f64>, columns: BTreeMap<u8, Vec<f64>>) -> Result<Self, ValidationError> {
        if ages.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::UnorderedDates);
        }
        if let Some(bad) = columns.values().find(|c| c.len() != ages.len()) {
            return Err(ValidationError::LengthMismatch {
                dates: ages.len(),
                values: bad.len(),
            });
        }
        Ok(Self { ages, columns })
    }

    pub fn percentiles(&self) -> Vec<u8> {
        self.columns.keys().copied().collect()
    }

    pub fn contains(&self, percentile: u8) -> bool {
        self.columns.contains_key(&percentile)
    }

    /// `(age_days, income)` rows of one percentile column
    pub fn points(&self, percentile: u8) -> Option<Vec<(f64, f64)>> {
        self.columns
            .get(&percentile)
            .map(|col| self.ages.iter().copied().zip(col.iter().copied()).collect())
    }
}

/// Salary trajectory variants built from neighbouring percentile columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeScenario {
    Optimistic,
    StatusQuo,
    Pessimistic,
}

impl IncomeScenario {
    /// Scenarios available around `bucket`, with the column each one uses.
    ///
    /// The top bucket has no optimistic case and the bottom bucket has no
    /// pessimistic case.
    pub fn around(bucket: u8) -> Vec<(IncomeScenario, u8)> {
        let mut scenarios = Vec::with_capacity(3);
        if bucket < 90 {
            scenarios.push((IncomeScenario::Optimistic, bucket + 10));
        }
        scenarios.push((IncomeScenario::StatusQuo, bucket));
        if bucket > 10 {
            scenarios.push((IncomeScenario::Pessimistic, bucket - 10));
        }
        scenarios
    }

    pub fn label(&self) -> &'static str {
        match self {
            IncomeScenario::Optimistic => "Optimistic",
            IncomeScenario::StatusQuo => "Status Quo",
            IncomeScenario::Pessimistic => "Pessimistic",
        }
    }
}

/// Cubic fit of one percentile's age/income curve, re-based on a reference date
#[derive(Debug, Clone)]
pub struct IncomeGrowthModel {
    birth_date: Date,
    table: Arc<IncomeTable>,
    percentile: u8,
    degree: usize,
    fitted: Polynomial,
}

impl IncomeGrowthModel {
    pub fn new(
        birth_date: Date,
        table: Arc<IncomeTable>,
        percentile: u8,
    ) -> Result<Self, EngineError> {
        let fitted = Self::fit(&table, percentile, 3)?;
        Ok(Self {
            birth_date,
            table,
            percentile,
            degree: 3,
            fitted,
        })
    }

    fn fit(table: &IncomeTable, percentile: u8, degree: usize) -> Result<Polynomial, EngineError> {
        let points = table
            .points(percentile)
            .ok_or_else(|| ValidationError::InvalidPercentile {
                value: percentile,
                valid: table.percentiles(),
            })?;
        let poly = Polynomial::fit(&points, degree)?;
        tracing::debug!(percentile, degree = poly.degree(), "fitted income curve");
        Ok(poly)
    }

    pub fn percentile(&self) -> u8 {
        self.percentile
    }

    /// Switch percentile columns and refit. The model is unchanged on error.
    pub fn set_percentile(&mut self, percentile: u8) -> Result<(), EngineError> {
        self.fitted = Self::fit(&self.table, percentile, self.degree)?;
        self.percentile = percentile;
        Ok(())
    }

    /// Same birth date and table, different column
    pub fn with_percentile(&self, percentile: u8) -> Result<Self, EngineError> {
        let mut model = self.clone();
        model.set_percentile(percentile)?;
        Ok(model)
    }

    /// Growth anchors relative to `reference`.
    ///
    /// The first point is `(0, 1.0)`: the fitted income at the user's age on
    /// `reference`. Every later table row becomes
    /// `(age - age_at_reference, income / fitted_at_reference)`.
    pub fn growth_points(&self, reference: Date) -> Result<Vec<(f64, f64)>, FitError> {
        let age_at_reference = f64::from(days_between(self.birth_date, reference));
        let level = self.fitted.eval(age_at_reference);
        if !level.is_finite() || level <= 0.0 {
            return Err(FitError::NonFinite);
        }

        let mut points = vec![(0.0, 1.0)];
        if let Some(rows) = self.table.points(self.percentile) {
            points.extend(
                rows.into_iter()
                    .filter(|(age, _)| *age > age_at_reference)
                    .map(|(age, income)| (age - age_at_reference, income / level)),
            );
        }
        Ok(points)
    }

    pub fn growth_curve(&self, reference: Date) -> Result<GrowthCurve, FitError> {
        Ok(GrowthCurve::polynomial(self.growth_points(reference)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    /// Incomes rise into the late 40s then taper, higher columns scaled up
    fn synthetic_table() -> IncomeTable {
        let ages: Vec<f64> = (22..=65).step_by(3).map(|y| f64::from(y) * 365.25).collect();
        let columns = INCOME_PERCENTILES
            .iter()
            .map(|p| {
                let scale = 20_000.0 + 1_500.0 * f64::from(*p);
                let incomes = ages
                    .iter()
                    .map(|a| {
                        let years = a / 365.25 - 22.0;
                        scale * (1.0 + 0.06 * years - 0.0009 * years * years)
                    })
                    .collect();
                (*p, incomes)
            })
            .collect();
        IncomeTable::new(ages, columns).unwrap()
    }

    #[test]
    fn test_growth_points_start_at_reference() {
        let table = Arc::new(synthetic_table());
        let model = IncomeGrowthModel::new(date(1990, 6, 1), table, 50).unwrap();
        let points = model.growth_points(date(2025, 6, 1)).unwrap();

        assert_eq!(points[0], (0.0, 1.0));
        assert!(points.len() > 5);
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        // still climbing a few years out from age 35
        assert!(points[1].1 > 1.0, "expected growth, got {}", points[1].1);
    }

    #[test]
    fn test_invalid_percentile_rejected() {
        let table = Arc::new(synthetic_table());
        let err = IncomeGrowthModel::new(date(1990, 6, 1), table.clone(), 55).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InvalidPercentile { value: 55, .. })
        ));

        let mut model = IncomeGrowthModel::new(date(1990, 6, 1), table, 50).unwrap();
        assert!(model.set_percentile(95).is_err());
        assert_eq!(model.percentile(), 50);
        model.set_percentile(70).unwrap();
        assert_eq!(model.percentile(), 70);
    }

    #[test]
    fn test_scenarios_at_edges() {
        let top: Vec<_> = IncomeScenario::around(90).into_iter().map(|(s, _)| s).collect();
        assert_eq!(top, vec![IncomeScenario::StatusQuo, IncomeScenario::Pessimistic]);

        let bottom: Vec<_> = IncomeScenario::around(10).into_iter().map(|(s, _)| s).collect();
        assert_eq!(bottom, vec![IncomeScenario::Optimistic, IncomeScenario::StatusQuo]);

        assert_eq!(IncomeScenario::around(50).len(), 3);
    }

    #[test]
    fn test_growth_curve_normalized() {
        let table = Arc::new(synthetic_table());
        let model = IncomeGrowthModel::new(date(1995, 1, 1), table, 30).unwrap();
        let curve = model.growth_curve(date(2025, 1, 1)).unwrap();
        let factors = curve.cumulative_factors(&[0.0, 3650.0]).unwrap();
        assert!((factors[0] - 1.0).abs() < 1e-9);
        assert!(factors[1] > 1.0);
    }
}
