//! Criterion benchmarks for gameplan_core projections
//!
//! Run with: cargo bench -p gameplan_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gameplan_core::flows::expense;
use gameplan_core::portfolio::RETIREMENT_401K;
use gameplan_core::scenarios::{ScenarioConfig, run_scenarios};
use gameplan_core::schedule::{DateRange, Frequency};
use gameplan_core::{
    Asset, CashFlow, EmployerMatch, FlowKind, OnConflict, Portfolio, ReturnsCache, Salary,
};
use jiff::civil::date;

fn horizon(years: i32) -> DateRange {
    DateRange::daily_horizon(date(2025, 1, 1), years).unwrap()
}

fn saver_with_deposits(years: i32) -> Asset {
    let range = horizon(years);
    let mut asset = Asset::interest_bearing(10_000.0, 0.04, range).unwrap();
    let deposits = CashFlow::recurring(
        FlowKind::Contribution,
        "deposits",
        range.start(),
        range.end(),
        Frequency::Monthly,
        500.0,
    )
    .no_discount()
    .build()
    .unwrap();
    asset.add_contribution("deposits", deposits, OnConflict::Error).unwrap();
    asset
}

fn household(years: i32, seed: u64) -> Portfolio {
    let range = horizon(years);
    let (start, end) = (range.start(), range.end());
    let mut plan = Portfolio::new(15_000.0, 0.01, range).unwrap();

    let salary = Salary::annual(120_000.0, Frequency::Monthly, start)
        .tax_rate(0.25)
        .last_paycheck(end)
        .build()
        .unwrap();
    plan.add_income_stream("salary", salary, OnConflict::Error).unwrap();

    let cache = ReturnsCache::new(seed, start, end);
    let account = Asset::equity("VTI", 20_000.0, range, &cache).unwrap();
    plan.add_asset(RETIREMENT_401K, account, OnConflict::Error).unwrap();
    plan.add_401k_contribution(
        "salary",
        0.05,
        Some(EmployerMatch {
            upto: 0.05,
            pct_match: 0.5,
        }),
        OnConflict::Error,
    )
    .unwrap();

    plan.add_expense("rent", expense::rent(2_400.0, start, end).build().unwrap(), OnConflict::Error)
        .unwrap();
    plan.add_expense(
        "utilities",
        expense::utilities(180.0, start, end, seed).build().unwrap(),
        OnConflict::Error,
    )
    .unwrap();
    plan.add_expense(
        "misc_spending",
        expense::misc_spending(900.0, start, end, seed).build().unwrap(),
        OnConflict::Error,
    )
    .unwrap();
    plan
}

fn bench_asset_compounding(c: &mut Criterion) {
    let mut group = c.benchmark_group("asset_value_through_time");

    for years in [1, 10, 30].iter() {
        let asset = saver_with_deposits(*years);
        group.bench_with_input(BenchmarkId::new("years", years), years, |b, _| {
            b.iter(|| black_box(&asset).value_through_time())
        });
    }

    group.finish();
}

fn bench_portfolio_recompute(c: &mut Criterion) {
    let mut plan = household(30, 42);

    c.bench_function("recompute_cash_savings_30yr", |b| {
        b.iter(|| black_box(&mut plan).recompute_cash_savings().unwrap())
    });
    c.bench_function("net_worth_30yr", |b| b.iter(|| black_box(&plan).net_worth()));
}

fn bench_scenarios(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios");
    group.sample_size(10);

    for iterations in [10, 50].iter() {
        let config = ScenarioConfig {
            iterations: *iterations,
            seed: 7,
            ..ScenarioConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("iterations", iterations), iterations, |b, _| {
            b.iter(|| {
                run_scenarios(black_box(&config), |seed| {
                    Ok(household(10, seed).net_worth())
                })
                .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_asset_compounding,
    bench_portfolio_recompute,
    bench_scenarios
);
criterion_main!(benches);
