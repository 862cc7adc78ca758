//! Compounding balances driven by dated contributions and debits.
//!
//! The balance on each day of the asset's grid follows
//!
//! ```text
//! balance[t_i] = flow[t_i] + r(t_{i-1}, t_i) * balance[t_{i-1}],   balance before t_0 = 0
//! ```
//!
//! evaluated strictly in date order.

use std::str::FromStr;
use std::sync::Arc;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, FlowCollection, OnConflict};
use crate::date_math::{DAYS_PER_YEAR, daily_dates, days_between};
use crate::error::{MarketError, Result, ValidationError};
use crate::flows::{CashFlow, FlowKind};
use crate::returns::{ReturnPath, ReturnsCache};
use crate::schedule::DateRange;
use crate::series::TimeSeries;

pub const INITIAL_BALANCE_LABEL: &str = "initial_balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    CashSavings,
    InterestBearing,
    Equity,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::CashSavings => "cash_savings",
            AssetType::InterestBearing => "interest_bearing",
            AssetType::Equity => "equity",
        }
    }
}

impl FromStr for AssetType {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cash_savings" | "cash" => Ok(AssetType::CashSavings),
            "interest_bearing" => Ok(AssetType::InterestBearing),
            "equity" => Ok(AssetType::Equity),
            other => Err(ValidationError::UnknownAssetType(other.to_string())),
        }
    }
}

/// How a balance grows between consecutive days
#[derive(Debug, Clone)]
pub enum AssetGrowth {
    /// Continuous compounding at a fixed annual rate
    InterestBearing { annual_rate: f64 },
    /// Realized factors from a shared simulated return path
    Equity { path: Arc<ReturnPath> },
}

#[derive(Debug, Clone)]
pub struct Asset {
    asset_type: AssetType,
    initial_balance: f64,
    horizon: DateRange,
    flows: FlowCollection,
    growth: AssetGrowth,
}

impl Asset {
    fn new(
        asset_type: AssetType,
        initial_balance: f64,
        horizon: DateRange,
        growth: AssetGrowth,
    ) -> Result<Self> {
        crate::flows::check_finite("initial balance", initial_balance)?;
        let mut asset = Self {
            asset_type,
            initial_balance,
            horizon,
            flows: FlowCollection::new(),
            growth,
        };
        let seed = CashFlow::once(
            FlowKind::Contribution,
            INITIAL_BALANCE_LABEL,
            horizon.start(),
            initial_balance,
        )
        .build()?;
        asset.add_contribution(INITIAL_BALANCE_LABEL, seed, OnConflict::Error)?;
        Ok(asset)
    }

    /// Checking and savings cash
    pub fn cash_savings(
        initial_balance: f64,
        annual_rate: f64,
        horizon: DateRange,
    ) -> Result<Self> {
        Self::interest_bearing_as(AssetType::CashSavings, initial_balance, annual_rate, horizon)
    }

    pub fn interest_bearing(
        initial_balance: f64,
        annual_rate: f64,
        horizon: DateRange,
    ) -> Result<Self> {
        Self::interest_bearing_as(AssetType::InterestBearing, initial_balance, annual_rate, horizon)
    }

    fn interest_bearing_as(
        asset_type: AssetType,
        initial_balance: f64,
        annual_rate: f64,
        horizon: DateRange,
    ) -> Result<Self> {
        crate::flows::check_finite("interest rate", annual_rate)?;
        Self::new(
            asset_type,
            initial_balance,
            horizon,
            AssetGrowth::InterestBearing { annual_rate },
        )
    }

    /// A holding of `ticker` whose returns come from `cache`.
    ///
    /// The cache window must span the whole horizon.
    pub fn equity(
        ticker: &str,
        initial_value: f64,
        horizon: DateRange,
        cache: &ReturnsCache,
    ) -> Result<Self> {
        if !cache.covers(horizon.start(), horizon.end()) {
            return Err(MarketError::HorizonNotCovered {
                ticker: ticker.to_string(),
                start: horizon.start(),
                end: horizon.end(),
                path_start: cache.start(),
                path_end: cache.end(),
            }
            .into());
        }
        let path = cache.path(ticker)?;
        Self::new(AssetType::Equity, initial_value, horizon, AssetGrowth::Equity { path })
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn horizon(&self) -> DateRange {
        self.horizon
    }

    pub fn growth(&self) -> &AssetGrowth {
        &self.growth
    }

    pub fn flows(&self) -> &FlowCollection {
        &self.flows
    }

    /// Register an inflow against this asset
    pub fn add_contribution(
        &mut self,
        label: impl Into<String>,
        flow: CashFlow,
        on_conflict: OnConflict,
    ) -> Result<()> {
        if flow.is_outflow() {
            return Err(ValidationError::KindMismatch {
                expected: "contribution",
                found: flow.kind().name(),
            }
            .into());
        }
        self.flows.insert(label, flow, on_conflict)?;
        Ok(())
    }

    /// Register an outflow against this asset
    pub fn add_debit(
        &mut self,
        label: impl Into<String>,
        flow: CashFlow,
        on_conflict: OnConflict,
    ) -> Result<()> {
        if !flow.is_outflow() {
            return Err(ValidationError::KindMismatch {
                expected: "debit",
                found: flow.kind().name(),
            }
            .into());
        }
        self.flows.insert(label, flow, on_conflict)?;
        Ok(())
    }

    /// Register or replace a derived flow without conflict checks
    pub(crate) fn set_flow(&mut self, label: &str, flow: CashFlow) {
        self.flows.upsert(label, flow);
    }

    /// Drop a derived flow if present
    pub(crate) fn clear_flow(&mut self, label: &str) {
        if self.flows.contains(label) {
            self.flows.remove(label);
        }
    }

    pub fn remove_flow(&mut self, label: &str) -> Option<CashFlow> {
        self.flows.remove(label)
    }

    pub fn contains_flow(&self, label: &str) -> bool {
        self.flows.contains(label)
    }

    /// Daily grid covering the horizon and every registered flow date
    fn grid(&self, net: &TimeSeries) -> Vec<Date> {
        let first = net
            .first_date()
            .map_or(self.horizon.start(), |d| d.min(self.horizon.start()));
        let last = net
            .last_date()
            .map_or(self.horizon.end(), |d| d.max(self.horizon.end()));
        daily_dates(first, last)
    }

    /// Growth factor for the step ending on each grid date
    fn step_factors(&self, grid: &[Date]) -> Vec<f64> {
        match &self.growth {
            AssetGrowth::InterestBearing { annual_rate } => {
                let mut factors = Vec::with_capacity(grid.len());
                factors.push(1.0);
                factors.extend(grid.windows(2).map(|w| {
                    let days = f64::from(days_between(w[0], w[1]));
                    (annual_rate * days / DAYS_PER_YEAR).exp()
                }));
                factors
            }
            AssetGrowth::Equity { path } => {
                let mut factors = path.compound_factors().reindex(grid, 1.0).values().to_vec();
                if let Some(first) = factors.first_mut() {
                    *first = 1.0;
                }
                factors
            }
        }
    }

    /// Balance on every day from the earliest flow or horizon start through
    /// the later of the horizon end and the last flow.
    ///
    /// Recomputed from the registered flows on every call.
    pub fn value_through_time(&self) -> TimeSeries {
        let net = self.flows.total();
        let grid = self.grid(&net);
        let flow = net.reindex(&grid, 0.0);
        let factors = self.step_factors(&grid);

        let mut balance = 0.0;
        let values = flow
            .values()
            .iter()
            .zip(&factors)
            .map(|(x, r)| {
                balance = x + r * balance;
                balance
            })
            .collect();
        TimeSeries::from_sorted(grid, values)
    }

    pub fn value_at(&self, date: Date) -> Option<f64> {
        self.value_through_time().value_at_or_before(date)
    }
}

pub type Assets = Collection<Asset>;

impl Assets {
    /// Every asset's balance on the union of their grids.
    ///
    /// Before an asset's first date its first balance is used; after its last
    /// date its final balance carries forward.
    pub fn aligned_paths(&self) -> (Vec<Date>, Vec<(String, TimeSeries)>) {
        let paths: Vec<(String, TimeSeries)> = self
            .iter()
            .map(|(label, asset)| (label.to_string(), asset.value_through_time()))
            .collect();
        let grid = TimeSeries::union_dates(paths.iter().map(|(_, s)| s));
        let aligned = paths
            .into_iter()
            .map(|(label, s)| {
                let first = s.values().first().copied().unwrap_or(0.0);
                (label, s.reindex_ffill(&grid, first))
            })
            .collect();
        (grid, aligned)
    }

    /// Sum of all asset balances per day
    pub fn total_value(&self) -> TimeSeries {
        let (grid, paths) = self.aligned_paths();
        let mut values = vec![0.0; grid.len()];
        for (_, path) in &paths {
            for (total, v) in values.iter_mut().zip(path.values()) {
                *total += v;
            }
        }
        TimeSeries::from_sorted(grid, values)
    }

    pub fn value_at(&self, date: Date) -> f64 {
        self.total_value().value_at_or_before(date).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::returns::ReturnProfile;
    use crate::schedule::Frequency;
    use jiff::civil::date;

    fn horizon(years: i32) -> DateRange {
        DateRange::daily_horizon(date(2025, 1, 1), years).unwrap()
    }

    #[test]
    fn test_continuous_compounding_closed_form() {
        let asset = Asset::cash_savings(10_000.0, 0.04, horizon(5)).unwrap();
        let path = asset.value_through_time();
        let t0 = date(2025, 1, 1);
        for (d, v) in path.iter().step_by(97) {
            let expected = 10_000.0 * (0.04 * f64::from(days_between(t0, d)) / DAYS_PER_YEAR).exp();
            assert!(
                ((v - expected) / expected).abs() < 1e-10,
                "{d}: {v} vs closed form {expected}"
            );
        }
    }

    #[test]
    fn test_zero_rate_stays_flat() {
        let asset = Asset::cash_savings(2_500.0, 0.0, horizon(2)).unwrap();
        let path = asset.value_through_time();
        assert_eq!(path.first_date(), Some(date(2025, 1, 1)));
        assert_eq!(path.last_date(), Some(date(2027, 1, 1)));
        assert!(path.values().iter().all(|v| *v == 2_500.0));
    }

    #[test]
    fn test_contributions_and_debits() {
        let mut asset = Asset::cash_savings(0.0, 0.0, horizon(1)).unwrap();
        let deposits = CashFlow::recurring(
            FlowKind::Contribution,
            "deposits",
            date(2025, 1, 1),
            date(2025, 12, 1),
            Frequency::Monthly,
            1_000.0,
        )
        .build()
        .unwrap();
        let rent = CashFlow::recurring(
            FlowKind::Expense { pretax: false },
            "rent",
            date(2025, 1, 15),
            date(2025, 12, 15),
            Frequency::Monthly,
            400.0,
        )
        .build()
        .unwrap();
        asset.add_contribution("deposits", deposits, OnConflict::Error).unwrap();
        asset.add_debit("rent", rent.clone(), OnConflict::Error).unwrap();
        assert!(asset.add_contribution("rent2", rent, OnConflict::Error).is_err());

        let end = asset.value_at(date(2025, 12, 31)).unwrap();
        assert!((end - 12.0 * 600.0).abs() < 1e-9);
        assert!((asset.value_at(date(2025, 1, 14)).unwrap() - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_flow_before_horizon_extends_grid() {
        let mut asset = Asset::cash_savings(100.0, 0.0, horizon(1)).unwrap();
        let early = CashFlow::once(FlowKind::Contribution, "early", date(2024, 12, 25), 50.0)
            .build()
            .unwrap();
        asset.add_contribution("early", early, OnConflict::Error).unwrap();
        let path = asset.value_through_time();
        assert_eq!(path.first_date(), Some(date(2024, 12, 25)));
        assert_eq!(path.last_value(), Some(150.0));
    }

    #[test]
    fn test_equity_with_fixed_returns() {
        let cache = ReturnsCache::new(1, date(2025, 1, 1), date(2026, 1, 1));
        cache.set_profile("FIX", ReturnProfile::Fixed { rate: 0.10 });
        let asset = Asset::equity("FIX", 1_000.0, horizon(1), &cache).unwrap();
        let path = asset.value_through_time();
        // weekends carry the balance unchanged
        assert_eq!(path.get(date(2025, 1, 4)), path.get(date(2025, 1, 3)));
        let end = path.last_value().unwrap();
        assert!(end > 1_090.0 && end < 1_110.0, "one year of 10% returned {end}");
    }

    #[test]
    fn test_equity_horizon_past_cache_window() {
        let cache = ReturnsCache::new(1, date(2025, 1, 1), date(2026, 1, 1));
        cache.set_profile("FIX", ReturnProfile::Fixed { rate: 0.10 });
        let err = Asset::equity("FIX", 1_000.0, horizon(5), &cache).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Market(MarketError::HorizonNotCovered { ref ticker, path_end, .. })
                if ticker == "FIX" && path_end == date(2026, 1, 1)
        ));

        let early = DateRange::daily_horizon(date(2024, 6, 1), 1).unwrap();
        assert!(Asset::equity("FIX", 1_000.0, early, &cache).is_err());
    }

    #[test]
    fn test_equity_keeps_growing_over_long_horizon() {
        let range = horizon(5);
        let cache = ReturnsCache::new(1, range.start(), range.end());
        cache.set_profile("FIX", ReturnProfile::Fixed { rate: 0.10 });
        let asset = Asset::equity("FIX", 1_000.0, range, &cache).unwrap();
        let year1 = asset.value_at(date(2026, 1, 1)).unwrap();
        let year5 = asset.value_at(date(2030, 1, 1)).unwrap();
        assert!(year5 > year1 * 1.4, "year 1 {year1}, year 5 {year5}");
    }

    #[test]
    fn test_asset_type_parse() {
        assert_eq!("equity".parse::<AssetType>().unwrap(), AssetType::Equity);
        assert_eq!(
            "crypto".parse::<AssetType>().unwrap_err(),
            ValidationError::UnknownAssetType("crypto".into())
        );
    }

    #[test]
    fn test_assets_total_value() {
        let mut assets = Assets::new();
        assets
            .insert("a", Asset::cash_savings(100.0, 0.0, horizon(1)).unwrap(), OnConflict::Error)
            .unwrap();
        let later = DateRange::daily_horizon(date(2025, 6, 1), 1).unwrap();
        assets
            .insert("b", Asset::cash_savings(50.0, 0.0, later).unwrap(), OnConflict::Error)
            .unwrap();
        let total = assets.total_value();
        assert_eq!(total.first_date(), Some(date(2025, 1, 1)));
        assert!(total.values().iter().all(|v| (*v - 150.0).abs() < 1e-12));
        assert_eq!(assets.value_at(date(2030, 1, 1)), 150.0);
    }
}
