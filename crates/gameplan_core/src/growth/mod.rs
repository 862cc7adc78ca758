//! Growth curves: cumulative multiplicative factors over elapsed time.
//!
//! A [`GrowthSpec`] turns a [`GrowthCurve`] into a dated factor series sampled
//! at its own growth frequency (yearly by default). Flows then look that
//! series up on their payment grid with forward fill, so a yearly raise holds
//! until the next growth date.

pub mod fit;
pub mod income;

use jiff::civil::Date;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::date_math::{add_years, days_between};
use crate::error::FitError;
use crate::schedule::Frequency;
use crate::series::TimeSeries;

pub use fit::{CurveForm, FittedCurve, Polynomial};
pub use income::{IncomeGrowthModel, IncomeScenario, IncomeTable};

/// Default horizon of a growth series when neither the `GrowthSpec` nor the owner
/// supplies an end date
pub const DEFAULT_GROWTH_YEARS: i32 = 20;

fn default_degree() -> usize {
    3
}

fn default_low() -> f64 {
    0.01
}

fn default_high() -> f64 {
    0.05
}

/// Shape of a growth trajectory.
///
/// Fitted variants take `(day_offset, factor)` anchors; their output is
/// normalized so the factor at offset 0 is exactly 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GrowthCurve {
    None,
    /// Fixed rate per growth period
    Compound { rate: f64 },
    /// Per-period rate drawn uniformly from `[low, high]`
    Stochastic {
        #[serde(default = "default_low")]
        low: f64,
        #[serde(default = "default_high")]
        high: f64,
        seed: u64,
    },
    Polynomial {
        points: Vec<(f64, f64)>,
        #[serde(default = "default_degree")]
        degree: usize,
    },
    /// Saturating S-curve; `cap` seeds the upper asymptote
    Logistic {
        points: Vec<(f64, f64)>,
        #[serde(default)]
        cap: Option<f64>,
    },
    Linear { points: Vec<(f64, f64)> },
    Exponential { points: Vec<(f64, f64)> },
}

/// A fitted curve ready for evaluation at arbitrary day offsets
#[derive(Debug, Clone)]
enum FittedFn {
    Poly(Polynomial),
    Curve(FittedCurve),
}

impl FittedFn {
    fn eval(&self, x: f64) -> f64 {
        match self {
            FittedFn::Poly(p) => p.eval(x),
            FittedFn::Curve(c) => c.eval(x),
        }
    }
}

impl GrowthCurve {
    pub fn stochastic(seed: u64) -> Self {
        GrowthCurve::Stochastic {
            low: default_low(),
            high: default_high(),
            seed,
        }
    }

    pub fn polynomial(points: Vec<(f64, f64)>) -> Self {
        GrowthCurve::Polynomial {
            points,
            degree: default_degree(),
        }
    }

    pub fn logistic(points: Vec<(f64, f64)>) -> Self {
        GrowthCurve::Logistic { points, cap: None }
    }

    fn fitted(&self) -> Result<Option<FittedFn>, FitError> {
        let fitted = match self {
            GrowthCurve::Polynomial { points, degree } => {
                FittedFn::Poly(Polynomial::fit(points, *degree)?)
            }
            GrowthCurve::Logistic { points, cap } => {
                FittedFn::Curve(FittedCurve::fit(CurveForm::Logistic, points, *cap)?)
            }
            GrowthCurve::Linear { points } => {
                FittedFn::Curve(FittedCurve::fit(CurveForm::Linear, points, None)?)
            }
            GrowthCurve::Exponential { points } => {
                FittedFn::Curve(FittedCurve::fit(CurveForm::Exponential, points, None)?)
            }
            GrowthCurve::None | GrowthCurve::Compound { .. } | GrowthCurve::Stochastic { .. } => {
                return Ok(None);
            }
        };
        Ok(Some(fitted))
    }

    /// Cumulative factors at each of `offsets` (days from the curve start,
    /// ascending, the first being 0).
    pub fn cumulative_factors(&self, offsets: &[f64]) -> Result<Vec<f64>, FitError> {
        match self {
            GrowthCurve::None => Ok(vec![1.0; offsets.len()]),
            GrowthCurve::Compound { rate } => Ok((0..offsets.len())
                .map(|k| (1.0 + rate).powi(k as i32))
                .collect()),
            GrowthCurve::Stochastic { low, high, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                let mut factor = 1.0;
                Ok((0..offsets.len())
                    .map(|k| {
                        if k > 0 {
                            factor *= 1.0 + low + (high - low) * rng.random::<f64>();
                        }
                        factor
                    })
                    .collect())
            }
            _ => {
                let Some(f) = self.fitted()? else {
                    return Ok(vec![1.0; offsets.len()]);
                };
                let origin = f.eval(0.0);
                if !origin.is_finite() || origin <= 0.0 {
                    return Err(FitError::NonFinite);
                }
                offsets
                    .iter()
                    .map(|x| {
                        let v = f.eval(*x) / origin;
                        if v.is_finite() {
                            Ok(v)
                        } else {
                            Err(FitError::NonFinite)
                        }
                    })
                    .collect()
            }
        }
    }
}

/// A growth curve bound to a sampling frequency, optional window and clip bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSpec {
    pub curve: GrowthCurve,
    #[serde(default = "GrowthSpec::default_frequency")]
    pub frequency: Frequency,
    /// Growth starts here; defaults to the owning flow's start
    #[serde(default)]
    pub start: Option<Date>,
    #[serde(default)]
    pub end: Option<Date>,
    #[serde(default)]
    pub min_val: Option<f64>,
    #[serde(default)]
    pub max_val: Option<f64>,
}

impl GrowthSpec {
    fn default_frequency() -> Frequency {
        Frequency::Yearly
    }

    pub fn new(curve: GrowthCurve) -> Self {
        Self {
            curve,
            frequency: Self::default_frequency(),
            start: None,
            end: None,
            min_val: None,
            max_val: None,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_start(mut self, start: Date) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: Date) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_bounds(mut self, min_val: Option<f64>, max_val: Option<f64>) -> Self {
        self.min_val = min_val;
        self.max_val = max_val;
        self
    }

    /// Cumulative factor per growth date.
    ///
    /// `default_start` / `default_end` come from the owner and apply when the
    /// `GrowthSpec` does not pin its own window. Factors are clipped to
    /// `[min_val, max_val]` and floored at zero.
    pub fn factor_series(
        &self,
        default_start: Date,
        default_end: Option<Date>,
    ) -> Result<TimeSeries, FitError> {
        let start = self.start.unwrap_or(default_start);
        let end = self
            .end
            .or(default_end)
            .unwrap_or_else(|| add_years(start, DEFAULT_GROWTH_YEARS));

        let dates = self.frequency.dates(start, end);
        let offsets: Vec<f64> = dates
            .iter()
            .map(|d| f64::from(days_between(start, *d)))
            .collect();

        let factors = self
            .curve
            .cumulative_factors(&offsets)?
            .into_iter()
            .map(|v| {
                let v = self.min_val.map_or(v, |lo| v.max(lo));
                let v = self.max_val.map_or(v, |hi| v.min(hi));
                v.max(0.0)
            })
            .collect();

        Ok(TimeSeries::from_sorted(dates, factors))
    }

    /// Factors looked up on `grid` with forward fill; 1.0 before growth starts.
    pub fn factors_on(&self, grid: &[Date]) -> Result<Vec<f64>, FitError> {
        let (Some(first), Some(last)) = (grid.first(), grid.last()) else {
            return Ok(Vec::new());
        };
        let series = self.factor_series(*first, Some(*last))?;
        Ok(series.reindex_ffill(grid, 1.0).values().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_compound_matches_closed_form() {
        let spec = GrowthSpec::new(GrowthCurve::Compound { rate: 0.03 });
        let series = spec
            .factor_series(date(2025, 1, 1), Some(date(2030, 1, 1)))
            .unwrap();
        assert_eq!(series.len(), 6);
        for (k, v) in series.values().iter().enumerate() {
            let expected = 1.03_f64.powi(k as i32);
            assert!((v - expected).abs() < 1e-12, "year {k}: {v} vs {expected}");
        }
    }

    #[test]
    fn test_fitted_curves_start_at_one() {
        let points = vec![(0.0, 1.3), (365.0, 1.4), (730.0, 1.55), (1095.0, 1.6)];
        let curves = [
            GrowthCurve::polynomial(points.clone()),
            GrowthCurve::logistic(points.clone()),
            GrowthCurve::Linear {
                points: points.clone(),
            },
            GrowthCurve::Exponential { points },
        ];
        for curve in curves {
            let factors = curve.cumulative_factors(&[0.0, 365.0, 730.0]).unwrap();
            assert!(
                (factors[0] - 1.0).abs() < 1e-9,
                "{curve:?} starts at {}",
                factors[0]
            );
        }
    }

    #[test]
    fn test_stochastic_is_seeded_and_bounded() {
        let spec = GrowthSpec::new(GrowthCurve::stochastic(7));
        let a = spec.factor_series(date(2025, 1, 1), None).unwrap();
        let b = spec.factor_series(date(2025, 1, 1), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.values()[0], 1.0);
        for w in a.values().windows(2) {
            let step = w[1] / w[0] - 1.0;
            assert!((0.01..=0.05).contains(&step), "step {step} outside [1%, 5%]");
        }
    }

    #[test]
    fn test_clip_bounds() {
        let spec =
            GrowthSpec::new(GrowthCurve::Compound { rate: 0.10 }).with_bounds(None, Some(1.2));
        let series = spec
            .factor_series(date(2025, 1, 1), Some(date(2030, 1, 1)))
            .unwrap();
        assert!(series.values().iter().all(|v| *v <= 1.2));
        assert_eq!(series.last_value(), Some(1.2));
    }

    #[test]
    fn test_factors_on_grid_forward_fill() {
        let spec =
            GrowthSpec::new(GrowthCurve::Compound { rate: 0.10 }).with_start(date(2025, 3, 1));
        let grid = [
            date(2025, 1, 1),
            date(2025, 6, 1),
            date(2026, 2, 1),
            date(2026, 3, 1),
        ];
        let factors = spec.factors_on(&grid).unwrap();
        assert_eq!(factors[0], 1.0);
        assert!((factors[1] - 1.0).abs() < 1e-12);
        assert!((factors[2] - 1.0).abs() < 1e-12);
        assert!((factors[3] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_fit_failure_propagates() {
        let curve = GrowthCurve::logistic(vec![(0.0, 1.0)]);
        assert!(matches!(
            curve.cumulative_factors(&[0.0, 1.0]),
            Err(FitError::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let json = r#"{"curve": {"type": "Compound", "rate": 0.02}}"#;
        let spec: GrowthSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec, GrowthSpec::new(GrowthCurve::Compound { rate: 0.02 }));

        let curve: GrowthCurve =
            serde_json::from_str(r#"{"type": "Stochastic", "seed": 9}"#).unwrap();
        assert_eq!(curve, GrowthCurve::stochastic(9));
    }
}
