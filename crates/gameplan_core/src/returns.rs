//! Return distributions and per-ticker simulated return paths.
//!
//! Profiles carry annualized parameters. Paths are simulated on business days,
//! so each profile is rescaled to a per-business-day distribution before
//! sampling.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use jiff::civil::Date;
use rand::{Rng, SeedableRng, distr::Distribution, rngs::StdRng};
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::schedule::Frequency;
use crate::series::TimeSeries;

/// Trading days per year used to scale annual parameters
pub const BUSINESS_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReturnProfile {
    None,
    Fixed { rate: f64 },
    Normal {
        mean: f64,
        std_dev: f64,
    },
    LogNormal {
        mean: f64,
        std_dev: f64,
    },
    /// Fat-tailed returns: `mean + scale * t(df)`
    StudentT {
        mean: f64,
        scale: f64,
        df: f64,
    },
}

impl ReturnProfile {
    // S&P 500 total return, 1927-2023
    pub const SP_500_HISTORICAL_FIXED: ReturnProfile = ReturnProfile::Fixed { rate: 0.0990829 };
    pub const SP_500_HISTORICAL_NORMAL: ReturnProfile = ReturnProfile::Normal {
        mean: 0.11471,
        std_dev: 0.18146,
    };
    pub const SP_500_HISTORICAL_STUDENT_T: ReturnProfile = ReturnProfile::StudentT {
        mean: 0.11471,
        scale: 0.140558,
        df: 5.0,
    };
    // US 10-year treasuries
    pub const US_LONG_BOND_HISTORICAL_NORMAL: ReturnProfile = ReturnProfile::Normal {
        mean: 0.0491,
        std_dev: 0.0780,
    };

    /// The same profile expressed per business day
    pub fn daily(&self) -> ReturnProfile {
        let root = BUSINESS_DAYS_PER_YEAR.sqrt();
        match *self {
            ReturnProfile::None => ReturnProfile::None,
            ReturnProfile::Fixed { rate } => ReturnProfile::Fixed {
                rate: (1.0 + rate).powf(1.0 / BUSINESS_DAYS_PER_YEAR) - 1.0,
            },
            ReturnProfile::Normal { mean, std_dev } => ReturnProfile::Normal {
                mean: mean / BUSINESS_DAYS_PER_YEAR,
                std_dev: std_dev / root,
            },
            ReturnProfile::LogNormal { mean, std_dev } => ReturnProfile::LogNormal {
                mean: mean / BUSINESS_DAYS_PER_YEAR,
                std_dev: std_dev / root,
            },
            ReturnProfile::StudentT { mean, scale, df } => ReturnProfile::StudentT {
                mean: mean / BUSINESS_DAYS_PER_YEAR,
                scale: scale / root,
                df,
            },
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, MarketError> {
        match *self {
            ReturnProfile::None => Ok(0.0),
            ReturnProfile::Fixed { rate } => Ok(rate),
            ReturnProfile::Normal { mean, std_dev } => rand_distr::Normal::new(mean, std_dev)
                .map(|d| d.sample(rng))
                .map_err(|_| MarketError::InvalidDistributionParameters {
                    profile_type: "Normal return",
                    mean,
                    std_dev,
                    reason: "std_dev must be non-negative and finite",
                }),
            ReturnProfile::LogNormal { mean, std_dev } => rand_distr::LogNormal::new(mean, std_dev)
                .map(|d| d.sample(rng) - 1.0)
                .map_err(|_| MarketError::InvalidDistributionParameters {
                    profile_type: "LogNormal return",
                    mean,
                    std_dev,
                    reason: "std_dev must be positive and finite",
                }),
            ReturnProfile::StudentT { mean, scale, df } => rand_distr::StudentT::new(df)
                .map(|d| mean + scale * d.sample(rng))
                .map_err(|_| MarketError::InvalidDistributionParameters {
                    profile_type: "StudentT return",
                    mean,
                    std_dev: scale,
                    reason: "degrees of freedom must be positive and finite",
                }),
        }
    }

    pub fn sample_sequence<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
    ) -> Result<Vec<f64>, MarketError> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// One simulated business-day return path for a ticker
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPath {
    ticker: String,
    /// Daily returns keyed by business date
    returns: TimeSeries,
}

impl ReturnPath {
    pub fn simulate<R: Rng + ?Sized>(
        ticker: impl Into<String>,
        profile: &ReturnProfile,
        start: Date,
        end: Date,
        rng: &mut R,
    ) -> Result<Self, MarketError> {
        let dates = Frequency::BusinessDaily.dates(start, end);
        let returns = profile.daily().sample_sequence(rng, dates.len())?;
        Ok(Self {
            ticker: ticker.into(),
            returns: TimeSeries::from_sorted(dates, returns),
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn returns(&self) -> &TimeSeries {
        &self.returns
    }

    /// Growth factor to apply on each business date: one plus the previous
    /// business day's return, 1.0 on the first date. Floored at zero.
    pub fn compound_factors(&self) -> TimeSeries {
        let mut values = Vec::with_capacity(self.returns.len());
        let mut previous: Option<f64> = None;
        for r in self.returns.values() {
            values.push(previous.map_or(1.0, |p| (1.0 + p).max(0.0)));
            previous = Some(*r);
        }
        TimeSeries::from_sorted(self.returns.dates().to_vec(), values)
    }
}

/// Generates each ticker's path once and hands out shared references to it
#[derive(Debug)]
pub struct ReturnsCache {
    seed: u64,
    start: Date,
    end: Date,
    default_profile: ReturnProfile,
    profiles: Mutex<FxHashMap<String, ReturnProfile>>,
    paths: Mutex<FxHashMap<String, Arc<ReturnPath>>>,
}

impl ReturnsCache {
    pub fn new(seed: u64, start: Date, end: Date) -> Self {
        Self {
            seed,
            start,
            end,
            default_profile: ReturnProfile::SP_500_HISTORICAL_NORMAL,
            profiles: Mutex::new(FxHashMap::default()),
            paths: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn with_default_profile(mut self, profile: ReturnProfile) -> Self {
        self.default_profile = profile;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// First simulated date
    pub fn start(&self) -> Date {
        self.start
    }

    /// Last simulated date
    pub fn end(&self) -> Date {
        self.end
    }

    /// Whether every path from this cache spans `[start, end]`
    pub fn covers(&self, start: Date, end: Date) -> bool {
        self.start <= start && end <= self.end
    }

    /// Assign a profile to a ticker. Has no effect on a path that was already
    /// generated.
    pub fn set_profile(&self, ticker: impl Into<String>, profile: ReturnProfile) {
        let ticker = ticker.into();
        if self.lock_paths().contains_key(&ticker) {
            tracing::warn!(ticker = %ticker, "return path already generated, keeping it");
        }
        self.lock_profiles().insert(ticker, profile);
    }

    fn lock_paths(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, Arc<ReturnPath>>> {
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_profiles(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, ReturnProfile>> {
        self.profiles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ticker_seed(&self, ticker: &str) -> u64 {
        let mut hasher = FxHasher::default();
        ticker.hash(&mut hasher);
        self.seed ^ hasher.finish()
    }

    /// The ticker's path, simulated on first request
    pub fn path(&self, ticker: &str) -> Result<Arc<ReturnPath>, MarketError> {
        let mut paths = self.lock_paths();
        if let Some(path) = paths.get(ticker) {
            return Ok(Arc::clone(path));
        }

        let profile = self
            .lock_profiles()
            .get(ticker)
            .copied()
            .unwrap_or(self.default_profile);
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let path = ReturnPath::simulate(ticker, &profile, self.start, self.end, &mut rng)?;
        let path = Arc::new(path);
        tracing::debug!(ticker, points = path.returns().len(), "simulated return path");
        paths.insert(ticker.to_string(), Arc::clone(&path));
        Ok(path)
    }
}
