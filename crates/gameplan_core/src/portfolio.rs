//! The composition root for one person's plan.
//!
//! A [`Portfolio`] owns income streams, expenses, assets and liabilities, and
//! keeps its `cash_savings` asset in step with them: every mutation rebuilds
//! two derived flows on that asset, take-home pay in and post-tax spending out,
//! under fixed labels so rebuilding is never additive.

use serde::{Deserialize, Serialize};

use crate::asset::{Asset, Assets};
use crate::collection::{AsCashFlow, Expenses, FlowCollection, IncomeStreams, OnConflict};
use crate::error::{LookupError, Result, ValidationError};
use crate::flows::contribution::{contribution_from_income, deduction_from_income};
use crate::flows::{CashFlow, DeductionAmount, FlowKind, IncomeStream, check_unit_interval};
use crate::liability::{Liabilities, Liability};
use crate::schedule::DateRange;
use crate::series::TimeSeries;

pub const CASH_SAVINGS: &str = "cash_savings";
pub const RETIREMENT_401K: &str = "401k";
pub const CASH_INFLOWS: &str = "cash_inflows";
pub const CASH_OUTFLOWS: &str = "cash_outflows";

/// Employer contribution of `pct_match` per dollar of employee contribution,
/// on employee contributions up to `upto` of gross pay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmployerMatch {
    pub upto: f64,
    pub pct_match: f64,
}

impl EmployerMatch {
    /// Share of gross pay the employer contributes for an employee rate of `pct`
    pub fn rate_for(&self, pct: f64) -> f64 {
        pct.min(self.upto) * self.pct_match
    }
}

/// Label of the employee's 401k deposits from `stream_label`
pub fn employee_401k_label(stream_label: &str) -> String {
    format!("401k_employee_contribs:{stream_label}")
}

/// Label of the employer's matching 401k deposits for `stream_label`
pub fn employer_401k_label(stream_label: &str) -> String {
    format!("401k_employer_contribs:{stream_label}")
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    horizon: DateRange,
    assets: Assets,
    income_streams: IncomeStreams,
    expenses: Expenses,
    liabilities: Liabilities,
}

impl Portfolio {
    /// An empty plan holding only cash savings
    pub fn new(initial_cash: f64, annual_interest_rate: f64, horizon: DateRange) -> Result<Self> {
        let mut assets = Assets::new();
        assets.insert(
            CASH_SAVINGS,
            Asset::cash_savings(initial_cash, annual_interest_rate, horizon)?,
            OnConflict::Error,
        )?;
        Ok(Self {
            horizon,
            assets,
            income_streams: IncomeStreams::new(),
            expenses: Expenses::new(),
            liabilities: Liabilities::new(),
        })
    }

    pub fn horizon(&self) -> DateRange {
        self.horizon
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    pub fn income_streams(&self) -> &IncomeStreams {
        &self.income_streams
    }

    pub fn expenses(&self) -> &Expenses {
        &self.expenses
    }

    pub fn liabilities(&self) -> &Liabilities {
        &self.liabilities
    }

    pub fn income_stream(&self, label: &str) -> Result<&IncomeStream> {
        self.income_streams
            .get(label)
            .ok_or_else(|| LookupError::IncomeStreamNotFound(label.to_string()).into())
    }

    pub fn asset(&self, label: &str) -> Result<&Asset> {
        self.assets
            .get(label)
            .ok_or_else(|| LookupError::AssetNotFound(label.to_string()).into())
    }

    pub fn add_income_stream(
        &mut self,
        label: impl Into<String>,
        stream: IncomeStream,
        on_conflict: OnConflict,
    ) -> Result<()> {
        self.income_streams.insert(label, stream, on_conflict)?;
        self.recompute_cash_savings()
    }

    /// Remove a stream together with any 401k deposits funded from it
    pub fn remove_income_stream(&mut self, label: &str) -> Result<IncomeStream> {
        let stream = self
            .income_streams
            .remove(label)
            .ok_or_else(|| LookupError::IncomeStreamNotFound(label.to_string()))?;
        if let Some(account) = self.assets.get_mut(RETIREMENT_401K) {
            account.clear_flow(&employee_401k_label(label));
            account.clear_flow(&employer_401k_label(label));
        }
        self.recompute_cash_savings()?;
        Ok(stream)
    }

    pub fn add_expense(
        &mut self,
        label: impl Into<String>,
        expense: CashFlow,
        on_conflict: OnConflict,
    ) -> Result<()> {
        if !matches!(expense.kind(), FlowKind::Expense { .. }) {
            return Err(ValidationError::KindMismatch {
                expected: "expense",
                found: expense.kind().name(),
            }
            .into());
        }
        self.expenses.insert(label, expense, on_conflict)?;
        self.recompute_cash_savings()
    }

    pub fn remove_expense(&mut self, label: &str) -> Result<CashFlow> {
        let expense = self
            .expenses
            .remove(label)
            .ok_or_else(|| LookupError::ExpenseNotFound(label.to_string()))?;
        self.recompute_cash_savings()?;
        Ok(expense)
    }

    /// A fixed amount paid from gross pay on every paycheck of `stream_label`.
    ///
    /// Registers a deduction on the stream and a matching pretax expense, both
    /// under `label`.
    pub fn add_pretax_expense(
        &mut self,
        stream_label: &str,
        amount: f64,
        label: &str,
        on_conflict: OnConflict,
    ) -> Result<()> {
        if on_conflict == OnConflict::Error && self.expenses.contains(label) {
            return Err(ValidationError::DuplicateLabel(label.to_string()).into());
        }
        let stream = self
            .income_streams
            .get_mut(stream_label)
            .ok_or_else(|| LookupError::IncomeStreamNotFound(stream_label.to_string()))?;
        stream.add_deduction_from(label, DeductionAmount::Fixed(amount), None, on_conflict)?;

        let dates = stream.dates().to_vec();
        let values = vec![amount; dates.len()];
        let kind = FlowKind::Expense { pretax: true };
        let mut builder = CashFlow::schedule(kind, label, dates, values);
        if let Some(frequency) = stream.frequency() {
            builder = builder.frequency(frequency);
        }
        self.expenses.insert(label, builder.build()?, on_conflict)?;
        self.recompute_cash_savings()
    }

    pub fn add_asset(
        &mut self,
        label: impl Into<String>,
        asset: Asset,
        on_conflict: OnConflict,
    ) -> Result<()> {
        self.assets.insert(label, asset, on_conflict)?;
        Ok(())
    }

    pub fn add_liability(
        &mut self,
        label: impl Into<String>,
        liability: Liability,
        on_conflict: OnConflict,
    ) -> Result<()> {
        self.liabilities.insert(label, liability, on_conflict)?;
        self.recompute_cash_savings()
    }

    pub fn remove_liability(&mut self, label: &str) -> Result<Liability> {
        let liability = self
            .liabilities
            .remove(label)
            .ok_or_else(|| LookupError::LiabilityNotFound(label.to_string()))?;
        self.recompute_cash_savings()?;
        Ok(liability)
    }

    /// Withhold `pct` of gross pay from `stream_label` and pay it, plus any
    /// employer match, into the `401k` asset.
    ///
    /// The asset must already exist. Each stream owns one deduction and one
    /// pair of account flows, so `Overwrite` replaces the stream's previous
    /// election and drops an employer flow the new call no longer has. Every
    /// lookup and conflict check runs before anything is mutated.
    pub fn add_401k_contribution(
        &mut self,
        stream_label: &str,
        pct: f64,
        employer_match: Option<EmployerMatch>,
        on_conflict: OnConflict,
    ) -> Result<()> {
        check_unit_interval("401k percentage", pct)?;
        if let Some(m) = employer_match {
            check_unit_interval("employer match cap", m.upto)?;
            if !m.pct_match.is_finite() || m.pct_match < 0.0 {
                return Err(ValidationError::InvalidParameter {
                    name: "employer match",
                    value: m.pct_match,
                    reason: "must be finite and non-negative",
                }
                .into());
            }
        }
        let account = self
            .assets
            .get(RETIREMENT_401K)
            .ok_or_else(|| LookupError::AssetNotFound(RETIREMENT_401K.to_string()))?;
        let stream = self
            .income_streams
            .get(stream_label)
            .ok_or_else(|| LookupError::IncomeStreamNotFound(stream_label.to_string()))?;

        let employee_label = employee_401k_label(stream_label);
        let employer_label = employer_401k_label(stream_label);
        if on_conflict == OnConflict::Error {
            if stream.deductions().contains(RETIREMENT_401K) {
                return Err(ValidationError::DuplicateLabel(RETIREMENT_401K.to_string()).into());
            }
            if let Some(taken) = [&employee_label, &employer_label]
                .into_iter()
                .find(|label| account.contains_flow(label))
            {
                return Err(ValidationError::DuplicateLabel(taken.clone()).into());
            }
        }

        let income = stream.flow();
        let withheld = deduction_from_income(income, pct, None, Some(RETIREMENT_401K.to_string()))?;
        let employee = contribution_from_income(income, pct, None, Some(employee_label.clone()))?;
        let employer = employer_match
            .map(|m| {
                let label = Some(employer_label.clone());
                contribution_from_income(income, m.rate_for(pct), None, label)
            })
            .transpose()?;

        // conflicts were resolved above
        if let Some(stream) = self.income_streams.get_mut(stream_label) {
            stream.add_deduction(RETIREMENT_401K, withheld, OnConflict::Overwrite)?;
        }
        if let Some(account) = self.assets.get_mut(RETIREMENT_401K) {
            account.add_contribution(employee_label, employee, OnConflict::Overwrite)?;
            match employer {
                Some(flow) => {
                    account.add_contribution(employer_label, flow, OnConflict::Overwrite)?
                }
                None => account.clear_flow(&employer_label),
            }
        }
        self.recompute_cash_savings()
    }

    /// Post-tax expenses and loan payments as one signed (non-positive) series
    fn spending(&self) -> TimeSeries {
        let post_tax = self.expenses.post_tax();
        let mut parts = Vec::new();
        if !post_tax.is_empty() {
            parts.push(post_tax.total());
        }
        if !self.liabilities.is_empty() {
            parts.push(self.liabilities.total());
        }
        TimeSeries::sum_aligned(parts.iter())
    }

    /// Rebuild the derived inflow and outflow entries on `cash_savings`.
    ///
    /// Running it twice in a row leaves the balance unchanged.
    pub fn recompute_cash_savings(&mut self) -> Result<()> {
        let inflows = self.income_streams.total_take_home();
        let outflows = self.spending().negate();
        let cash = self
            .assets
            .get_mut(CASH_SAVINGS)
            .ok_or_else(|| LookupError::AssetNotFound(CASH_SAVINGS.to_string()))?;

        if inflows.is_empty() {
            cash.clear_flow(CASH_INFLOWS);
        } else {
            let flow = CashFlow::derived(FlowKind::Contribution, CASH_INFLOWS, inflows, None);
            cash.set_flow(CASH_INFLOWS, flow);
        }
        if outflows.is_empty() {
            cash.clear_flow(CASH_OUTFLOWS);
        } else {
            let kind = FlowKind::Expense { pretax: false };
            let flow = CashFlow::derived(kind, CASH_OUTFLOWS, outflows, None);
            cash.set_flow(CASH_OUTFLOWS, flow);
        }
        tracing::debug!(
            streams = self.income_streams.len(),
            expenses = self.expenses.len(),
            "recomputed cash savings flows"
        );
        Ok(())
    }

    /// Take-home pay plus signed post-tax spending, aligned on the union of dates
    pub fn net_cashflows(&self) -> TimeSeries {
        let take_home = self.income_streams.total_take_home();
        let spending = self.spending();
        TimeSeries::sum_aligned([&take_home, &spending])
    }

    /// Daily balance of the cash savings asset
    pub fn cash_savings(&self) -> Result<TimeSeries> {
        Ok(self.asset(CASH_SAVINGS)?.value_through_time())
    }

    /// Every income stream's gross flow and every expense, keyed by label
    pub fn all_cashflows(&self) -> Result<FlowCollection> {
        let mut all = FlowCollection::new();
        for (label, stream) in self.income_streams.iter() {
            all.insert(label, stream.cash_flow().clone(), OnConflict::Error)?;
        }
        for (label, expense) in self.expenses.iter() {
            all.insert(label, expense.clone(), OnConflict::Error)?;
        }
        Ok(all)
    }

    /// Total asset value minus outstanding loan balances, per day
    pub fn net_worth(&self) -> TimeSeries {
        let assets = self.assets.total_value();
        if self.liabilities.is_empty() {
            return assets;
        }
        let debt = self.liabilities.total_balance();
        let grid = TimeSeries::union_dates([&assets, &debt]);
        let first = assets.values().first().copied().unwrap_or(0.0);
        assets
            .reindex_ffill(&grid, first)
            .zip_with(&debt.reindex(&grid, 0.0), |a, d| a - d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::Salary;
    use crate::flows::expense;
    use crate::schedule::Frequency;
    use jiff::civil::date;

    fn horizon() -> DateRange {
        DateRange::daily_horizon(date(2025, 1, 1), 2).unwrap()
    }

    fn salary() -> IncomeStream {
        Salary::annual(120_000.0, Frequency::Monthly, date(2025, 1, 1))
            .last_paycheck(date(2025, 12, 31))
            .tax_rate(0.25)
            .no_growth()
            .build()
            .unwrap()
    }

    fn groceries() -> CashFlow {
        let (start, end) = (date(2025, 1, 5), date(2025, 12, 5));
        expense::expense("groceries", start, end, Frequency::Monthly, 600.0)
            .no_discount()
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_portfolio_is_flat() {
        let portfolio = Portfolio::new(5_000.0, 0.0, horizon()).unwrap();
        let cash = portfolio.cash_savings().unwrap();
        assert_eq!(cash.first_date(), Some(date(2025, 1, 1)));
        assert!(cash.values().iter().all(|v| *v == 5_000.0));
        assert!(portfolio.net_cashflows().is_empty());
    }

    #[test]
    fn test_cash_savings_tracks_income_and_expenses() {
        let mut portfolio = Portfolio::new(0.0, 0.0, horizon()).unwrap();
        portfolio.add_income_stream("salary", salary(), OnConflict::Error).unwrap();
        portfolio.add_expense("groceries", groceries(), OnConflict::Error).unwrap();
        let end = portfolio.cash_savings().unwrap().last_value().unwrap();
        assert!((end - 12.0 * (7_500.0 - 600.0)).abs() < 1e-6, "ending cash {end}");

        portfolio.remove_expense("groceries").unwrap();
        let end = portfolio.cash_savings().unwrap().last_value().unwrap();
        assert!((end - 12.0 * 7_500.0).abs() < 1e-6);
        assert!(
            !portfolio
                .asset(CASH_SAVINGS)
                .unwrap()
                .contains_flow(CASH_OUTFLOWS)
        );
    }

    #[test]
    fn test_recompute_is_not_additive() {
        let mut portfolio = Portfolio::new(1_000.0, 0.02, horizon()).unwrap();
        portfolio.add_income_stream("salary", salary(), OnConflict::Error).unwrap();
        portfolio.add_expense("groceries", groceries(), OnConflict::Error).unwrap();
        let before = portfolio.cash_savings().unwrap();
        portfolio.recompute_cash_savings().unwrap();
        portfolio.recompute_cash_savings().unwrap();
        assert_eq!(portfolio.cash_savings().unwrap(), before);
    }

    #[test]
    fn test_401k_requires_asset_and_stream() {
        let mut portfolio = Portfolio::new(0.0, 0.0, horizon()).unwrap();
        portfolio.add_income_stream("salary", salary(), OnConflict::Error).unwrap();
        let err = portfolio
            .add_401k_contribution("salary", 0.05, None, OnConflict::Error)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::Lookup(LookupError::AssetNotFound(_))
        ));
        // nothing was withheld
        assert!(portfolio.income_stream("salary").unwrap().deductions().is_empty());

        portfolio
            .add_asset(
                RETIREMENT_401K,
                Asset::interest_bearing(0.0, 0.0, horizon()).unwrap(),
                OnConflict::Error,
            )
            .unwrap();
        assert!(
            portfolio
                .add_401k_contribution("bonus", 0.05, None, OnConflict::Error)
                .is_err()
        );
    }

    #[test]
    fn test_pretax_expense_reduces_take_home() {
        let mut portfolio = Portfolio::new(0.0, 0.0, horizon()).unwrap();
        portfolio.add_income_stream("salary", salary(), OnConflict::Error).unwrap();
        portfolio
            .add_pretax_expense("salary", 200.0, "hsa", OnConflict::Error)
            .unwrap();
        let take_home = portfolio.income_stream("salary").unwrap().take_home();
        assert!(take_home.values().iter().all(|v| (*v - 9_800.0 * 0.75).abs() < 1e-9));
        assert_eq!(portfolio.expenses().pretax().len(), 1);
        // pretax expenses are not debited from cash a second time
        let net = portfolio.net_cashflows();
        assert!((net.sum() - 12.0 * 9_800.0 * 0.75).abs() < 1e-6);
        assert!(
            portfolio
                .add_pretax_expense("salary", 200.0, "hsa", OnConflict::Error)
                .is_err()
        );
    }

    #[test]
    fn test_loan_payments_leave_cash_and_net_worth() {
        let mut portfolio = Portfolio::new(20_000.0, 0.0, horizon()).unwrap();
        let loan = Liability::new(
            "car",
            crate::liability::LoanTerms {
                principal: 6_000.0,
                annual_rate: 0.0,
                payment: 1_000.0,
                frequency: Frequency::Monthly,
                start: date(2025, 1, 1),
            },
        )
        .unwrap();
        portfolio.add_liability("car", loan, OnConflict::Error).unwrap();
        let cash = portfolio.cash_savings().unwrap();
        assert_eq!(cash.last_value(), Some(14_000.0));

        let worth = portfolio.net_worth();
        // cash net of the remaining balance is constant at zero interest
        assert_eq!(worth.get(date(2025, 1, 1)), Some(19_000.0 - 5_000.0));
        assert_eq!(worth.get(date(2025, 3, 15)), Some(17_000.0 - 3_000.0));
        assert_eq!(worth.last_value(), Some(14_000.0));
    }

    #[test]
    fn test_all_cashflows() {
        let mut portfolio = Portfolio::new(0.0, 0.0, horizon()).unwrap();
        portfolio.add_income_stream("salary", salary(), OnConflict::Error).unwrap();
        portfolio.add_expense("groceries", groceries(), OnConflict::Error).unwrap();
        let all = portfolio.all_cashflows().unwrap();
        assert_eq!(all.labels().collect::<Vec<_>>(), vec!["salary", "groceries"]);
    }
}
