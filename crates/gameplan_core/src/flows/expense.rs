//! Expense presets with their default growth, volatility and discounting.

use jiff::civil::Date;

use super::{CashFlow, CashFlowBuilder, FlowKind};
use crate::growth::{GrowthCurve, GrowthSpec};
use crate::schedule::Frequency;

/// Yearly discount rate expenses carry unless told otherwise
pub const DEFAULT_EXPENSE_DISCOUNT_RATE: f64 = 0.02;

/// Logistic anchors for rent: 1.75x after five years, 2.25x after ten
pub const RENT_GROWTH_POINTS: [(f64, f64); 3] = [(0.0, 1.0), (1825.0, 1.75), (3650.0, 2.25)];

/// Roughly 2% a year
pub const UTILITIES_GROWTH_POINTS: [(f64, f64); 2] = [(0.0, 1.0), (365.0, 1.02)];

pub const MISC_GROWTH_POINTS: [(f64, f64); 3] = [(0.0, 1.0), (1825.0, 1.25), (3650.0, 1.4)];

pub const DEFAULT_LOCAL_VOL: f64 = 0.15;

/// A plain recurring post-tax expense with default discounting and no growth
pub fn expense(
    name: impl Into<String>,
    start: Date,
    end: Date,
    frequency: Frequency,
    amount: f64,
) -> CashFlowBuilder {
    CashFlow::recurring(
        FlowKind::Expense { pretax: false },
        name,
        start,
        end,
        frequency,
        amount,
    )
    .discount(DEFAULT_EXPENSE_DISCOUNT_RATE)
}

/// Monthly rent on the first of each month, growing along a logistic curve
pub fn rent(amount: f64, start: Date, end: Date) -> CashFlowBuilder {
    expense("rent", start, end, Frequency::MonthStart, amount)
        .growth(GrowthSpec::new(GrowthCurve::logistic(RENT_GROWTH_POINTS.to_vec())))
}

/// Monthly utilities: near-linear growth with 15% local volatility
pub fn utilities(amount: f64, start: Date, end: Date, seed: u64) -> CashFlowBuilder {
    expense("utilities", start, end, Frequency::MonthStart, amount)
        .growth(GrowthSpec::new(GrowthCurve::Linear {
            points: UTILITIES_GROWTH_POINTS.to_vec(),
        }))
        .local_vol(DEFAULT_LOCAL_VOL, seed)
}

/// Discretionary spending; growth is re-sampled monthly
pub fn misc_spending(amount: f64, start: Date, end: Date, seed: u64) -> CashFlowBuilder {
    expense("misc_spending", start, end, Frequency::MonthStart, amount)
        .growth(
            GrowthSpec::new(GrowthCurve::logistic(MISC_GROWTH_POINTS.to_vec()))
                .with_frequency(Frequency::Monthly),
        )
        .local_vol(DEFAULT_LOCAL_VOL, seed)
}
