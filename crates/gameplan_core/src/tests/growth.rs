//! Tests for growth-driven flows
//!
//! These tests verify that:
//! - Rent follows its logistic anchors and never decreases
//! - Salary growth from the income model starts at the current salary
//! - Growth is applied before discounting and never compounds on recompute

use std::collections::BTreeMap;
use std::sync::Arc;

use jiff::civil::date;

use crate::date_math::add_years;
use crate::flows::expense::{self, RENT_GROWTH_POINTS};
use crate::flows::Salary;
use crate::growth::{GrowthCurve, GrowthSpec, IncomeGrowthModel, IncomeScenario, IncomeTable};
use crate::schedule::Frequency;

#[test]
fn test_rent_growth_scenario() {
    let start = date(2025, 1, 1);
    let mut rent = expense::rent(2_000.0, start, add_years(start, 10))
        .no_discount()
        .build()
        .unwrap();
    let values = rent.effective().values().to_vec();
    assert_eq!(values.len(), 121);
    assert!((values[0] - 2_000.0).abs() < 1e-9);
    assert!(values.windows(2).all(|w| w[1] >= w[0] - 1e-9), "rent decreased");

    let year_five = rent.effective().get(add_years(start, 5)).unwrap();
    assert!((year_five - 3_500.0).abs() < 25.0, "rent at year 5: {year_five}");
    let year_ten = rent.effective().get(add_years(start, 10)).unwrap();
    assert!((year_ten - 4_500.0).abs() < 50.0, "rent at year 10: {year_ten}");

    rent.recompute().unwrap();
    assert_eq!(rent.effective().values(), values.as_slice());

    // default discounting pulls every future payment down
    let discounted = expense::rent(2_000.0, start, add_years(start, 10)).build().unwrap();
    assert!(
        discounted
            .effective()
            .values()
            .iter()
            .zip(&values)
            .skip(1)
            .all(|(d, g)| d < g)
    );
    assert_eq!(RENT_GROWTH_POINTS[1], (1825.0, 1.75));
}

fn table() -> Arc<IncomeTable> {
    let years: Vec<f64> = (22..=65).map(f64::from).collect();
    let ages: Vec<f64> = years.iter().map(|y| y * 365.25).collect();
    let columns = [30u8, 40, 50, 60, 70]
        .into_iter()
        .map(|p| {
            let scale = f64::from(p) * 1_000.0;
            let incomes = years
                .iter()
                .map(|y| scale * (1.0 + 0.04 * (y - 22.0) - 0.0004 * (y - 22.0).powi(2)))
                .collect();
            (p, incomes)
        })
        .collect::<BTreeMap<u8, Vec<f64>>>();
    Arc::new(IncomeTable::new(ages, columns).unwrap())
}

#[test]
fn test_salary_from_income_model() {
    let first_paycheck = date(2025, 1, 1);
    let model = IncomeGrowthModel::new(date(1995, 1, 1), table(), 50).unwrap();
    let stream = Salary::annual(90_000.0, Frequency::Monthly, first_paycheck)
        .last_paycheck(date(2055, 1, 1))
        .growth_from_model(&model)
        .unwrap()
        .build()
        .unwrap();
    let gross = stream.gross();
    assert!((gross.values()[0] - 7_500.0).abs() < 1e-6);
    let peak = gross.values().iter().copied().fold(f64::MIN, f64::max);
    assert!(peak > 7_500.0, "no growth from the income model");

    let scenarios = Salary::annual(90_000.0, Frequency::Monthly, first_paycheck)
        .last_paycheck(date(2035, 1, 1))
        .scenarios(&model, 50)
        .unwrap();
    let labels: Vec<_> = scenarios.iter().map(|(s, p, _)| (*s, *p)).collect();
    assert_eq!(
        labels,
        vec![
            (IncomeScenario::Optimistic, 60),
            (IncomeScenario::StatusQuo, 50),
            (IncomeScenario::Pessimistic, 40)
        ]
    );
    assert!(IncomeGrowthModel::new(date(1995, 1, 1), table(), 55).is_err());
}

#[test]
fn test_bounds_clip_growth() {
    let start = date(2025, 1, 1);
    let flow = expense::expense("gym", start, add_years(start, 10), Frequency::Yearly, 100.0)
        .no_discount()
        .growth(GrowthSpec::new(GrowthCurve::Compound { rate: 0.10 }).with_bounds(None, Some(1.5)))
        .build()
        .unwrap();
    let last = flow.effective().last_value().unwrap();
    assert!((last - 150.0).abs() < 1e-9);
}
