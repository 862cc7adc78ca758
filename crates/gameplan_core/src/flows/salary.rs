//! Income streams: gross pay, deductions, taxes and take-home.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::contribution::{self, DeductionAmount, PeriodicCap};
use super::{CashFlow, FlowKind, check_finite};
use crate::collection::{AsCashFlow, FlowCollection, OnConflict};
use crate::date_math::{add_days, add_years};
use crate::error::{Result, ValidationError};
use crate::growth::{GrowthCurve, GrowthSpec, IncomeGrowthModel, IncomeScenario};
use crate::schedule::Frequency;
use crate::series::TimeSeries;

/// Default salary horizon when no last paycheck date is given
pub const DEFAULT_SALARY_YEARS: i32 = 20;

/// Career salary anchors `(days, factor)` used when no income model is supplied
pub const SALARY_GROWTH_POINTS: [(f64, f64); 8] = [
    (0.0, 1.0),
    (285.0, 1.0456339114572402),
    (2111.0, 1.3136836065067592),
    (3937.0, 1.4826908041087061),
    (5763.0, 1.665289827098607),
    (7590.0, 1.7597881182518966),
    (9416.0, 1.6168499978856523),
    (11242.0, 1.4355917987788163),
];

/// An income flow plus the deductions withheld from it
#[derive(Debug, Clone)]
pub struct IncomeStream {
    flow: CashFlow,
    deductions: FlowCollection,
}

/// One row of a pay schedule; deductions and taxes are negative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paycheck {
    pub date: Date,
    pub gross: f64,
    pub deductions: f64,
    pub taxes: f64,
    pub take_home: f64,
}

impl AsCashFlow for IncomeStream {
    fn cash_flow(&self) -> &CashFlow {
        &self.flow
    }
}

impl IncomeStream {
    pub fn new(flow: CashFlow) -> Result<Self> {
        if !matches!(flow.kind(), FlowKind::Income { .. }) {
            return Err(ValidationError::KindMismatch {
                expected: "income",
                found: flow.kind().name(),
            }
            .into());
        }
        Ok(Self {
            flow,
            deductions: FlowCollection::new(),
        })
    }

    pub fn name(&self) -> &str {
        self.flow.name()
    }

    pub fn flow(&self) -> &CashFlow {
        &self.flow
    }

    pub fn tax_rate(&self) -> f64 {
        match self.flow.kind() {
            FlowKind::Income { tax_rate } => tax_rate,
            _ => 0.0,
        }
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.flow.frequency()
    }

    pub fn dates(&self) -> &[Date] {
        self.flow.dates()
    }

    /// Gross pay per pay date, after growth
    pub fn gross(&self) -> &TimeSeries {
        self.flow.effective()
    }

    pub fn deductions(&self) -> &FlowCollection {
        &self.deductions
    }

    /// Register a prebuilt deduction
    pub fn add_deduction(
        &mut self,
        label: impl Into<String>,
        deduction: CashFlow,
        on_conflict: OnConflict,
    ) -> Result<()> {
        if deduction.kind() != FlowKind::Deduction {
            return Err(ValidationError::KindMismatch {
                expected: "deduction",
                found: deduction.kind().name(),
            }
            .into());
        }
        self.deductions.insert(label, deduction, on_conflict)?;
        Ok(())
    }

    /// Build and register a deduction from an amount or a share of gross pay
    pub fn add_deduction_from(
        &mut self,
        label: impl Into<String>,
        amount: DeductionAmount,
        cap: Option<PeriodicCap>,
        on_conflict: OnConflict,
    ) -> Result<()> {
        let label = label.into();
        let deduction = contribution::from_income(
            FlowKind::Deduction,
            &self.flow,
            amount,
            cap,
            Some(label.clone()),
        )?;
        self.add_deduction(label, deduction, on_conflict)
    }

    pub fn remove_deduction(&mut self, label: &str) -> Option<CashFlow> {
        self.deductions.remove(label)
    }

    /// Signed (non-positive) sum of deductions on every pay date
    pub fn total_deductions(&self) -> TimeSeries {
        if self.deductions.is_empty() {
            return self.gross().map(|_| 0.0);
        }
        self.deductions.total().reindex(self.dates(), 0.0)
    }

    /// Gross minus the magnitude of deductions
    pub fn post_deductions(&self) -> TimeSeries {
        self.gross().zip_with(&self.total_deductions(), |g, d| g - d.abs())
    }

    pub fn total_taxes(&self) -> TimeSeries {
        self.post_deductions().scale(self.tax_rate())
    }

    pub fn take_home(&self) -> TimeSeries {
        let rate = self.tax_rate();
        self.post_deductions().map(|v| v - v * rate)
    }

    /// Gross paid in the first 365 days of the stream
    pub fn annualized_gross(&self) -> f64 {
        match self.flow.start() {
            Some(start) => self.gross().sum_between(start, add_days(start, 365)),
            None => 0.0,
        }
    }

    pub fn paychecks(&self) -> Vec<Paycheck> {
        let deductions = self.total_deductions();
        let taxes = self.total_taxes();
        let take_home = self.take_home();
        self.gross()
            .iter()
            .zip(deductions.values())
            .zip(taxes.values())
            .zip(take_home.values())
            .map(|((((date, gross), d), t), th)| Paycheck {
                date,
                gross,
                deductions: *d,
                taxes: -t,
                take_home: *th,
            })
            .collect()
    }
}

/// Builder for a recurring salary
#[derive(Debug, Clone)]
#[must_use]
pub struct Salary {
    name: String,
    paycheck: f64,
    frequency: Frequency,
    first_paycheck: Date,
    last_paycheck: Option<Date>,
    tax_rate: f64,
    growth: Option<GrowthSpec>,
    discount_rate: Option<f64>,
}

impl Salary {
    /// `paycheck` paid every `frequency` starting on `first_paycheck`
    pub fn paycheck(paycheck: f64, frequency: Frequency, first_paycheck: Date) -> Self {
        Self {
            name: "salary".into(),
            paycheck,
            frequency,
            first_paycheck,
            last_paycheck: None,
            tax_rate: 0.0,
            growth: Some(GrowthSpec::new(GrowthCurve::polynomial(
                SALARY_GROWTH_POINTS.to_vec(),
            ))),
            discount_rate: None,
        }
    }

    /// `annual` split into `frequency`'s nominal number of paychecks
    pub fn annual(annual: f64, frequency: Frequency, first_paycheck: Date) -> Self {
        Self::paycheck(annual / frequency.periods_per_year(), frequency, first_paycheck)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn last_paycheck(mut self, date: Date) -> Self {
        self.last_paycheck = Some(date);
        self
    }

    pub fn tax_rate(mut self, rate: f64) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn growth(mut self, spec: GrowthSpec) -> Self {
        self.growth = Some(spec);
        self
    }

    /// Growth anchored on an income model at the first paycheck
    pub fn growth_from_model(mut self, model: &IncomeGrowthModel) -> Result<Self> {
        let curve = model.growth_curve(self.first_paycheck)?;
        self.growth = Some(GrowthSpec::new(curve));
        Ok(self)
    }

    pub fn no_growth(mut self) -> Self {
        self.growth = None;
        self
    }

    pub fn discount(mut self, yearly_rate: f64) -> Self {
        self.discount_rate = Some(yearly_rate);
        self
    }

    pub fn build(self) -> Result<IncomeStream> {
        check_finite("paycheck", self.paycheck)?;
        let end = self
            .last_paycheck
            .unwrap_or_else(|| add_years(self.first_paycheck, DEFAULT_SALARY_YEARS));
        let mut builder = CashFlow::recurring(
            FlowKind::Income {
                tax_rate: self.tax_rate,
            },
            self.name,
            self.first_paycheck,
            end,
            self.frequency,
            self.paycheck,
        );
        if let Some(spec) = self.growth {
            builder = builder.growth(spec);
        }
        if let Some(rate) = self.discount_rate {
            builder = builder.discount(rate);
        }
        IncomeStream::new(builder.build()?)
    }

    /// One salary per available scenario around `bucket`, each grown along
    /// its own percentile column
    pub fn scenarios(
        &self,
        model: &IncomeGrowthModel,
        bucket: u8,
    ) -> Result<Vec<(IncomeScenario, u8, IncomeStream)>> {
        IncomeScenario::around(bucket)
            .into_iter()
            .map(|(scenario, percentile)| -> Result<(IncomeScenario, u8, IncomeStream)> {
                let column = model.with_percentile(percentile)?;
                let stream = self.clone().growth_from_model(&column)?.build()?;
                Ok((scenario, percentile, stream))
            })
            .collect()
    }
}
