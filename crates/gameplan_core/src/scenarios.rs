//! Batches of independent seeded projections and their percentile bands.
//!
//! Each run receives its own seed drawn from the batch seed, so a batch is
//! reproducible regardless of how runs are scheduled across threads.

use jiff::civil::Date;
use rand::{Rng, SeedableRng, rngs::StdRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::series::TimeSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub iterations: usize,
    pub seed: u64,
    /// Quantiles in `[0, 1]` to report
    pub percentiles: Vec<f64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            seed: 0,
            percentiles: vec![0.05, 0.50, 0.95],
        }
    }
}

/// One projection and the seed that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRun {
    pub seed: u64,
    pub series: TimeSeries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioBatch {
    runs: Vec<ScenarioRun>,
}

/// Per-date quantiles across a batch
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileBands {
    dates: Vec<Date>,
    bands: Vec<(f64, TimeSeries)>,
}

impl PercentileBands {
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    pub fn bands(&self) -> &[(f64, TimeSeries)] {
        &self.bands
    }

    pub fn band(&self, percentile: f64) -> Option<&TimeSeries> {
        self.bands
            .iter()
            .find(|(p, _)| (p - percentile).abs() < 1e-9)
            .map(|(_, s)| s)
    }
}

fn run_seeds(seed: u64, iterations: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..iterations).map(|_| rng.random::<u64>()).collect()
}

/// Run `project` once per iteration, in parallel when the `parallel` feature
/// is on. The first failing run's error is returned.
pub fn run_scenarios<F>(config: &ScenarioConfig, project: F) -> Result<ScenarioBatch>
where
    F: Fn(u64) -> Result<TimeSeries> + Sync,
{
    let seeds = run_seeds(config.seed, config.iterations);
    let run = |seed: u64| project(seed).map(|series| ScenarioRun { seed, series });

    #[cfg(feature = "parallel")]
    let runs: Result<Vec<ScenarioRun>> = seeds.into_par_iter().map(run).collect();

    #[cfg(not(feature = "parallel"))]
    let runs: Result<Vec<ScenarioRun>> = seeds.into_iter().map(run).collect();

    let runs = runs?;
    tracing::debug!(iterations = runs.len(), "scenario batch complete");
    Ok(ScenarioBatch { runs })
}

/// Linear interpolation between closest ranks of an ascending slice
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

impl ScenarioBatch {
    pub fn runs(&self) -> &[ScenarioRun] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Quantiles of every run on the union of run dates. Runs are
    /// forward-filled past their end and take their first value before it.
    pub fn bands(&self, percentiles: &[f64]) -> Result<PercentileBands> {
        if let Some(bad) = percentiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(ValidationError::InvalidParameter {
                name: "percentile",
                value: *bad,
                reason: "must lie in [0, 1]",
            }
            .into());
        }
        let dates = TimeSeries::union_dates(self.runs.iter().map(|r| &r.series));
        let aligned: Vec<TimeSeries> = self
            .runs
            .iter()
            .map(|r| {
                let first = r.series.values().first().copied().unwrap_or(0.0);
                r.series.reindex_ffill(&dates, first)
            })
            .collect();

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(percentiles.len()); dates.len()];
        let mut cross_section = Vec::with_capacity(aligned.len());
        for (i, column) in columns.iter_mut().enumerate() {
            cross_section.clear();
            cross_section.extend(aligned.iter().map(|s| s.values()[i]));
            cross_section.sort_by(f64::total_cmp);
            column.extend(
                percentiles
                    .iter()
                    .map(|p| quantile_sorted(&cross_section, *p).unwrap_or(0.0)),
            );
        }

        let bands = percentiles
            .iter()
            .enumerate()
            .map(|(k, p)| {
                let values = columns.iter().map(|c| c[k]).collect();
                (*p, TimeSeries::from_sorted(dates.clone(), values))
            })
            .collect();
        Ok(PercentileBands { dates, bands })
    }

    /// Seed of the run whose final value sits closest to the `q` quantile of
    /// final values, so a representative path can be rebuilt on demand
    pub fn seed_near(&self, q: f64) -> Option<u64> {
        let finals: Vec<(u64, f64)> = self
            .runs
            .iter()
            .filter_map(|r| r.series.last_value().map(|v| (r.seed, v)))
            .collect();
        let mut sorted: Vec<f64> = finals.iter().map(|(_, v)| *v).collect();
        sorted.sort_by(f64::total_cmp);
        let target = quantile_sorted(&sorted, q)?;
        finals
            .into_iter()
            .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
            .map(|(seed, _)| seed)
    }
}
