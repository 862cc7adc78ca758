//! Tests for the asset compounding recurrence
//!
//! These tests verify that:
//! - An untouched interest-bearing balance matches continuous compounding exactly
//! - Contributions compound from the day they land
//! - Equity balances follow the shared per-ticker return path

use jiff::civil::date;

use crate::asset::Asset;
use crate::collection::OnConflict;
use crate::date_math::{DAYS_PER_YEAR, days_between};
use crate::flows::{CashFlow, FlowKind};
use crate::returns::{ReturnProfile, ReturnsCache};
use crate::schedule::DateRange;

#[test]
fn test_closed_form_for_several_rates() {
    let start = date(2024, 3, 1);
    let horizon = DateRange::daily_horizon(start, 10).unwrap();
    for rate in [0.0, 0.015, 0.05, -0.01] {
        let asset = Asset::interest_bearing(25_000.0, rate, horizon).unwrap();
        let path = asset.value_through_time();
        assert_eq!(path.len() as i32, days_between(start, horizon.end()) + 1);
        for (d, v) in path.iter() {
            let years = f64::from(days_between(start, d)) / DAYS_PER_YEAR;
            let expected = 25_000.0 * (rate * years).exp();
            assert!(
                ((v - expected) / expected).abs() < 1e-10,
                "rate {rate} on {d}: {v} vs {expected}"
            );
        }
    }
}

#[test]
fn test_each_deposit_compounds_from_its_date() {
    let start = date(2025, 1, 1);
    let horizon = DateRange::daily_horizon(start, 3).unwrap();
    let mut asset = Asset::cash_savings(1_000.0, 0.04, horizon).unwrap();
    let deposit_day = date(2026, 1, 1);
    let deposit = CashFlow::once(FlowKind::Contribution, "gift", deposit_day, 500.0)
        .build()
        .unwrap();
    asset.add_contribution("gift", deposit, OnConflict::Error).unwrap();

    let end = horizon.end();
    let growth = |from| (0.04 * f64::from(days_between(from, end)) / DAYS_PER_YEAR).exp();
    let expected = 1_000.0 * growth(start) + 500.0 * growth(deposit_day);
    let got = asset.value_at(end).unwrap();
    assert!((got - expected).abs() < 1e-6, "{got} vs {expected}");
}

#[test]
fn test_equity_assets_share_a_ticker_path() {
    let start = date(2025, 1, 1);
    let horizon = DateRange::daily_horizon(start, 5).unwrap();
    let cache = ReturnsCache::new(99, start, horizon.end());
    let a = Asset::equity("VTI", 1_000.0, horizon, &cache).unwrap();
    let b = Asset::equity("VTI", 3_000.0, horizon, &cache).unwrap();

    // same returns, so balances stay in proportion
    let pa = a.value_through_time();
    let pb = b.value_through_time();
    for (va, vb) in pa.values().iter().zip(pb.values()) {
        assert!((vb - 3.0 * va).abs() < 1e-6 * vb.abs().max(1.0));
    }

    let bonds = ReturnsCache::new(99, start, horizon.end());
    bonds.set_profile("BND", ReturnProfile::US_LONG_BOND_HISTORICAL_NORMAL);
    let c = Asset::equity("BND", 1_000.0, horizon, &bonds).unwrap();
    assert_ne!(c.value_through_time(), pa);
}
