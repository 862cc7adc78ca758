//! Contributions and deductions derived from an income flow.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{CashFlow, FlowKind};
use crate::error::{Result, ValidationError};
use crate::schedule::Frequency;
use crate::series::TimeSeries;

/// Window over which a [`PeriodicCap`] applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CapPeriod {
    Monthly,
    Yearly,
}

impl CapPeriod {
    fn frequency(self) -> Frequency {
        match self {
            CapPeriod::Monthly => Frequency::Monthly,
            CapPeriod::Yearly => Frequency::Yearly,
        }
    }
}

/// A dollar ceiling per calendar month or year
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeriodicCap {
    /// Maximum total per window
    pub amount: f64,
    pub period: CapPeriod,
}

impl PeriodicCap {
    pub fn monthly(amount: f64) -> Self {
        Self {
            amount,
            period: CapPeriod::Monthly,
        }
    }

    pub fn yearly(amount: f64) -> Self {
        Self {
            amount,
            period: CapPeriod::Yearly,
        }
    }

    /// Per-date ceiling: the window's cap split evenly across the pay dates
    /// that fall inside that window.
    pub fn per_date_limits(&self, dates: &[jiff::civil::Date]) -> Vec<f64> {
        let freq = self.period.frequency();
        let buckets: Vec<_> = dates.iter().map(|d| freq.bucket_start(*d)).collect();
        let mut counts: FxHashMap<jiff::civil::Date, usize> = FxHashMap::default();
        for b in &buckets {
            *counts.entry(*b).or_insert(0) += 1;
        }
        buckets
            .iter()
            .map(|b| self.amount / counts.get(b).copied().unwrap_or(1) as f64)
            .collect()
    }

    fn apply(&self, series: &TimeSeries) -> TimeSeries {
        let limits = self.per_date_limits(series.dates());
        let values = series
            .values()
            .iter()
            .zip(limits)
            .map(|(v, cap)| v.min(cap))
            .collect();
        TimeSeries::from_sorted(series.dates().to_vec(), values)
    }
}

/// Exactly one of a fixed per-period amount or a fraction of gross pay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DeductionAmount {
    Fixed(f64),
    Percentage(f64),
}

impl DeductionAmount {
    /// Both or neither supplied is a usage error
    pub fn from_options(amount: Option<f64>, percentage: Option<f64>) -> Result<Self> {
        match (amount, percentage) {
            (Some(amount), None) => Ok(DeductionAmount::Fixed(amount)),
            (None, Some(pct)) => Ok(DeductionAmount::Percentage(pct)),
            _ => Err(ValidationError::AmountOrPercentage.into()),
        }
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        let (name, value) = match self {
            DeductionAmount::Fixed(v) => ("amount", *v),
            DeductionAmount::Percentage(v) => ("percentage", *v),
        };
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidParameter {
                name,
                value,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }

    /// Per-date values against `income`'s effective pay
    fn values_for(&self, income: &CashFlow) -> TimeSeries {
        match self {
            DeductionAmount::Fixed(amount) => income.effective().map(|_| *amount),
            DeductionAmount::Percentage(pct) => income.effective().scale(*pct),
        }
    }
}

fn default_label(kind: FlowKind, amount: &DeductionAmount, source: &str) -> String {
    let noun = match kind {
        FlowKind::Deduction => "Deduction",
        _ => "Contribution",
    };
    match amount {
        DeductionAmount::Percentage(pct) => format!("{:.0}% {noun} from {source}", pct * 100.0),
        DeductionAmount::Fixed(v) => format!("${v:.0} {noun} from {source}"),
    }
}

/// A flow of `kind` on `income`'s pay dates, optionally capped per window
pub fn from_income(
    kind: FlowKind,
    income: &CashFlow,
    amount: DeductionAmount,
    cap: Option<PeriodicCap>,
    label: Option<String>,
) -> Result<CashFlow> {
    amount.validate()?;
    if let Some(cap) = cap {
        if !cap.amount.is_finite() || cap.amount < 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "cap",
                value: cap.amount,
                reason: "must be finite and non-negative",
            }
            .into());
        }
    }

    let mut values = amount.values_for(income);
    if let Some(cap) = cap {
        values = cap.apply(&values);
    }
    let label = label.unwrap_or_else(|| default_label(kind, &amount, income.name()));
    Ok(CashFlow::derived(kind, label, values, income.frequency()))
}

/// `pct` of `income` per pay date, paid into an asset
pub fn contribution_from_income(
    income: &CashFlow,
    pct: f64,
    cap: Option<PeriodicCap>,
    label: Option<String>,
) -> Result<CashFlow> {
    from_income(
        FlowKind::Contribution,
        income,
        DeductionAmount::Percentage(pct),
        cap,
        label,
    )
}

/// `pct` of `income` per pay date, withheld from pay
pub fn deduction_from_income(
    income: &CashFlow,
    pct: f64,
    cap: Option<PeriodicCap>,
    label: Option<String>,
) -> Result<CashFlow> {
    from_income(
        FlowKind::Deduction,
        income,
        DeductionAmount::Percentage(pct),
        cap,
        label,
    )
}
