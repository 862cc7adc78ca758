//! Dated monetary flows with growth, local volatility and discounting.
//!
//! Every flow keeps the values it was built with (`base`) and derives
//! `effective` values from them:
//!
//! ```text
//! effective[i] = base[i] * growth[i] * noise[i] / (1 + r)^(years since first date)
//! ```
//!
//! Growth is applied to the base values first and discounting to the grown
//! result. Recomputation always starts again from `base`, so calling it any
//! number of times yields the same series.

pub mod contribution;
pub mod expense;
pub mod salary;

use jiff::civil::Date;
use rand::{SeedableRng, distr::Distribution, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::date_math::years_between;
use crate::error::{EngineError, Result, ValidationError};
use crate::growth::GrowthSpec;
use crate::schedule::{DateRange, Frequency};
use crate::series::TimeSeries;

pub use contribution::{CapPeriod, DeductionAmount, PeriodicCap};
pub use salary::{IncomeStream, Paycheck, Salary};

/// Closed set of flow roles; the payload carries kind-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowKind {
    Income { tax_rate: f64 },
    Expense { pretax: bool },
    Contribution,
    Deduction,
}

impl FlowKind {
    /// Outflows reduce their owner's balance and count negatively in totals
    pub fn is_outflow(&self) -> bool {
        matches!(self, FlowKind::Expense { .. } | FlowKind::Deduction)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::Income { .. } => "income",
            FlowKind::Expense { .. } => "expense",
            FlowKind::Contribution => "contribution",
            FlowKind::Deduction => "deduction",
        }
    }
}

/// Gaussian noise on the growth factor, with standard deviation `scale` as a
/// fraction of the nominal value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalVol {
    pub scale: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashFlow {
    kind: FlowKind,
    name: String,
    frequency: Option<Frequency>,
    base: TimeSeries,
    growth: Option<GrowthSpec>,
    discount_rate: Option<f64>,
    local_vol: Option<LocalVol>,
    effective: TimeSeries,
}

#[derive(Debug, Clone)]
enum Schedule {
    Recurring {
        start: Date,
        end: Date,
        frequency: Frequency,
        amount: f64,
    },
    Explicit {
        dates: Vec<Date>,
        values: Vec<f64>,
        frequency: Option<Frequency>,
    },
}

/// Builder for [`CashFlow`]; validation happens in [`CashFlowBuilder::build`]
#[derive(Debug, Clone)]
#[must_use]
pub struct CashFlowBuilder {
    kind: FlowKind,
    name: String,
    schedule: Schedule,
    growth: Option<GrowthSpec>,
    discount_rate: Option<f64>,
    local_vol: Option<LocalVol>,
}

impl CashFlowBuilder {
    pub fn growth(mut self, spec: GrowthSpec) -> Self {
        self.growth = Some(spec);
        self
    }

    pub fn no_growth(mut self) -> Self {
        self.growth = None;
        self
    }

    /// Yearly discount rate applied after growth
    pub fn discount(mut self, yearly_rate: f64) -> Self {
        self.discount_rate = Some(yearly_rate);
        self
    }

    pub fn no_discount(mut self) -> Self {
        self.discount_rate = None;
        self
    }

    pub fn local_vol(mut self, scale: f64, seed: u64) -> Self {
        self.local_vol = Some(LocalVol { scale, seed });
        self
    }

    pub fn no_local_vol(mut self) -> Self {
        self.local_vol = None;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Nominal frequency of an explicit schedule
    pub fn frequency(mut self, frequency: Frequency) -> Self {
        if let Schedule::Explicit { frequency: f, .. } = &mut self.schedule {
            *f = Some(frequency);
        }
        self
    }

    /// Mark an expense as paid from gross income; no effect on other kinds
    pub fn pretax(mut self, pretax: bool) -> Self {
        if let FlowKind::Expense { .. } = self.kind {
            self.kind = FlowKind::Expense { pretax };
        }
        self
    }

    pub fn build(self) -> Result<CashFlow> {
        let (base, frequency) = match self.schedule {
            Schedule::Recurring {
                start,
                end,
                frequency,
                amount,
            } => {
                check_finite("amount", amount)?;
                let range = DateRange::new(start, end, frequency)?;
                (TimeSeries::constant(range.dates(), amount)?, Some(frequency))
            }
            Schedule::Explicit {
                dates,
                values,
                frequency,
            } => {
                if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                    return Err(ValidationError::InvalidParameter {
                        name: "value",
                        value: *bad,
                        reason: "flow values must be finite",
                    }
                    .into());
                }
                (TimeSeries::new(dates, values)?, frequency)
            }
        };

        if let FlowKind::Income { tax_rate } = self.kind {
            check_unit_interval("tax rate", tax_rate)?;
        }
        if let Some(rate) = self.discount_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ValidationError::InvalidParameter {
                    name: "discount rate",
                    value: rate,
                    reason: "must be finite and non-negative",
                }
                .into());
            }
        }
        if let Some(vol) = self.local_vol {
            if !vol.scale.is_finite() || vol.scale < 0.0 {
                return Err(ValidationError::InvalidParameter {
                    name: "local volatility",
                    value: vol.scale,
                    reason: "must be finite and non-negative",
                }
                .into());
            }
        }

        let mut flow = CashFlow {
            kind: self.kind,
            name: self.name,
            frequency,
            effective: base.clone(),
            base,
            growth: self.growth,
            discount_rate: self.discount_rate,
            local_vol: self.local_vol,
        };
        flow.recompute()?;
        Ok(flow)
    }
}

pub(crate) fn check_finite(
    name: &'static str,
    value: f64,
) -> std::result::Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::InvalidParameter {
            name,
            value,
            reason: "must be finite",
        })
    }
}

pub(crate) fn check_unit_interval(
    name: &'static str,
    value: f64,
) -> std::result::Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidParameter {
            name,
            value,
            reason: "must lie in [0, 1]",
        })
    }
}

impl CashFlow {
    /// `amount` on every date of `frequency` in `[start, end]`
    pub fn recurring(
        kind: FlowKind,
        name: impl Into<String>,
        start: Date,
        end: Date,
        frequency: Frequency,
        amount: f64,
    ) -> CashFlowBuilder {
        CashFlowBuilder {
            kind,
            name: name.into(),
            schedule: Schedule::Recurring {
                start,
                end,
                frequency,
                amount,
            },
            growth: None,
            discount_rate: None,
            local_vol: None,
        }
    }

    /// A single dated amount
    pub fn once(
        kind: FlowKind,
        name: impl Into<String>,
        date: Date,
        amount: f64,
    ) -> CashFlowBuilder {
        Self::schedule(kind, name, vec![date], vec![amount])
    }

    /// Arbitrary dated values, e.g. derived from another flow
    pub fn schedule(
        kind: FlowKind,
        name: impl Into<String>,
        dates: Vec<Date>,
        values: Vec<f64>,
    ) -> CashFlowBuilder {
        CashFlowBuilder {
            kind,
            name: name.into(),
            schedule: Schedule::Explicit {
                dates,
                values,
                frequency: None,
            },
            growth: None,
            discount_rate: None,
            local_vol: None,
        }
    }

    /// A flow over `series` that inherits `frequency` from its source
    pub(crate) fn derived(
        kind: FlowKind,
        name: impl Into<String>,
        series: TimeSeries,
        frequency: Option<Frequency>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            frequency,
            effective: series.clone(),
            base: series,
            growth: None,
            discount_rate: None,
            local_vol: None,
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    pub fn is_outflow(&self) -> bool {
        self.kind.is_outflow()
    }

    pub fn dates(&self) -> &[Date] {
        self.base.dates()
    }

    pub fn start(&self) -> Option<Date> {
        self.base.first_date()
    }

    pub fn end(&self) -> Option<Date> {
        self.base.last_date()
    }

    /// Values as constructed, before growth and discounting
    pub fn base(&self) -> &TimeSeries {
        &self.base
    }

    /// Values after growth, noise and discounting (always non-negative
    /// magnitudes for recurring flows built from positive amounts)
    pub fn effective(&self) -> &TimeSeries {
        &self.effective
    }

    /// Effective values with outflows negated
    pub fn signed(&self) -> TimeSeries {
        if self.is_outflow() {
            self.effective.negate()
        } else {
            self.effective.clone()
        }
    }

    pub fn growth(&self) -> Option<&GrowthSpec> {
        self.growth.as_ref()
    }

    pub fn discount_rate(&self) -> Option<f64> {
        self.discount_rate
    }

    pub fn local_vol(&self) -> Option<LocalVol> {
        self.local_vol
    }

    pub fn set_growth(&mut self, growth: Option<GrowthSpec>) -> Result<()> {
        self.growth = growth;
        self.recompute()
    }

    pub fn set_discount_rate(&mut self, rate: Option<f64>) -> Result<()> {
        self.discount_rate = rate;
        self.recompute()
    }

    pub fn set_local_vol(&mut self, local_vol: Option<LocalVol>) -> Result<()> {
        self.local_vol = local_vol;
        self.recompute()
    }

    /// Multiplicative factor per date: growth times noise, divided by the
    /// discount factor
    fn adjustment_factors(&self) -> Result<Vec<f64>> {
        let dates = self.base.dates();
        let mut factors = match &self.growth {
            Some(spec) => spec.factors_on(dates)?,
            None => vec![1.0; dates.len()],
        };

        if let Some(vol) = self.local_vol {
            let normal = rand_distr::Normal::new(1.0, vol.scale).map_err(|_| {
                EngineError::from(ValidationError::InvalidParameter {
                    name: "local volatility",
                    value: vol.scale,
                    reason: "must be finite and non-negative",
                })
            })?;
            let mut rng = StdRng::seed_from_u64(vol.seed);
            for f in factors.iter_mut() {
                *f *= normal.sample(&mut rng).max(0.0);
            }
        }

        if let (Some(rate), Some(first)) = (self.discount_rate, dates.first()) {
            for (f, d) in factors.iter_mut().zip(dates) {
                *f /= (1.0 + rate).powf(years_between(*first, *d));
            }
        }

        Ok(factors)
    }

    /// Rebuild `effective` from `base`
    pub fn recompute(&mut self) -> Result<()> {
        if self.growth.is_none() && self.discount_rate.is_none() && self.local_vol.is_none() {
            self.effective = self.base.clone();
            return Ok(());
        }
        let factors = self.adjustment_factors()?;
        let values = self
            .base
            .values()
            .iter()
            .zip(&factors)
            .map(|(v, f)| v * f)
            .collect();
        self.effective = TimeSeries::from_sorted(self.base.dates().to_vec(), values);
        tracing::debug!(flow = %self.name, points = self.effective.len(), "recomputed flow values");
        Ok(())
    }
}
