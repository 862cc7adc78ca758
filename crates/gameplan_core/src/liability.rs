//! Amortizing loans.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::collection::{AsCashFlow, Collection};
use crate::date_math::{DAYS_PER_YEAR, add_years, daily_dates, days_between};
use crate::error::{Result, ValidationError};
use crate::flows::{CashFlow, FlowKind, check_finite};
use crate::schedule::Frequency;
use crate::series::TimeSeries;

/// Longest amortization schedule generated
pub const MAX_LOAN_YEARS: i32 = 100;

/// Balances below this are treated as paid off
const PAID_OFF: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: f64,
    pub annual_rate: f64,
    /// Scheduled amount per payment date; the final payment may be smaller
    pub payment: f64,
    pub frequency: Frequency,
    /// First payment date; interest accrues from here
    pub start: Date,
}

/// A loan with its payment schedule and outstanding balance after each payment
#[derive(Debug, Clone)]
pub struct Liability {
    terms: LoanTerms,
    payments: CashFlow,
    balance: TimeSeries,
}

impl AsCashFlow for Liability {
    fn cash_flow(&self) -> &CashFlow {
        &self.payments
    }
}

impl Liability {
    pub fn new(name: impl Into<String>, terms: LoanTerms) -> Result<Self> {
        check_finite("principal", terms.principal)?;
        check_finite("loan rate", terms.annual_rate)?;
        check_finite("payment", terms.payment)?;
        if terms.principal < 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "principal",
                value: terms.principal,
                reason: "must be non-negative",
            }
            .into());
        }
        if terms.annual_rate < 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "loan rate",
                value: terms.annual_rate,
                reason: "must be non-negative",
            }
            .into());
        }

        let schedule = terms
            .frequency
            .dates(terms.start, add_years(terms.start, MAX_LOAN_YEARS));
        if let [first, second, ..] = &schedule[..] {
            let interest = terms.principal * (accrual(terms.annual_rate, *first, *second) - 1.0);
            if terms.payment <= interest && terms.principal > PAID_OFF {
                return Err(ValidationError::InvalidParameter {
                    name: "payment",
                    value: terms.payment,
                    reason: "does not cover the interest accrued between payments",
                }
                .into());
            }
        }

        let mut dates = Vec::new();
        let mut paid = Vec::new();
        let mut balances = Vec::new();
        let mut balance = terms.principal;
        let mut previous: Option<Date> = None;
        for d in schedule {
            if balance <= PAID_OFF {
                break;
            }
            if let Some(prev) = previous {
                balance *= accrual(terms.annual_rate, prev, d);
            }
            let payment = terms.payment.min(balance);
            balance = (balance - payment).max(0.0);
            dates.push(d);
            paid.push(payment);
            balances.push(balance);
            previous = Some(d);
        }
        if balance > PAID_OFF {
            tracing::warn!(balance, "loan not repaid within {MAX_LOAN_YEARS} years");
        }

        let name = name.into();
        let kind = FlowKind::Expense { pretax: false };
        let payments = CashFlow::schedule(kind, name, dates.clone(), paid)
            .frequency(terms.frequency)
            .build()?;
        Ok(Self {
            terms,
            payments,
            balance: TimeSeries::new(dates, balances)?,
        })
    }

    pub fn name(&self) -> &str {
        self.payments.name()
    }

    pub fn terms(&self) -> &LoanTerms {
        &self.terms
    }

    /// Payments as an outflow flow, truncated at payoff
    pub fn payments(&self) -> &CashFlow {
        &self.payments
    }

    /// Balance right after each payment
    pub fn balance_after_payments(&self) -> &TimeSeries {
        &self.balance
    }

    pub fn payoff_date(&self) -> Option<Date> {
        self.balance
            .iter()
            .find(|(_, b)| *b <= PAID_OFF)
            .map(|(d, _)| d)
    }

    pub fn total_paid(&self) -> f64 {
        self.payments.effective().sum()
    }

    /// Outstanding balance on every day from the start through the last
    /// payment, with interest accruing continuously between payments
    pub fn daily_balance(&self) -> TimeSeries {
        let Some(last) = self.balance.last_date() else {
            return TimeSeries::empty();
        };
        let grid = daily_dates(self.terms.start, last);
        let mut values = Vec::with_capacity(grid.len());
        let mut anchor = (self.terms.start, self.terms.principal);
        let mut next = self.balance.iter().peekable();
        for d in &grid {
            if let Some(&(pay_date, after)) = next.peek() {
                if pay_date == *d {
                    anchor = (pay_date, after);
                    next.next();
                }
            }
            let grown = anchor.1 * accrual(self.terms.annual_rate, anchor.0, *d);
            values.push(grown.max(0.0));
        }
        TimeSeries::from_sorted(grid, values)
    }

    /// Outstanding balance on `date`: zero before the loan starts and after payoff
    pub fn balance_on(&self, date: Date) -> f64 {
        if date < self.terms.start {
            return 0.0;
        }
        let daily = self.daily_balance();
        daily
            .get(date)
            .or_else(|| daily.last_value())
            .unwrap_or(0.0)
    }
}

fn accrual(annual_rate: f64, from: Date, to: Date) -> f64 {
    (annual_rate * f64::from(days_between(from, to)) / DAYS_PER_YEAR).exp()
}

pub type Liabilities = Collection<Liability>;

impl Liabilities {
    /// Sum of outstanding balances per day over the union of every loan's
    /// daily grid; a loan contributes zero outside its own grid
    pub fn total_balance(&self) -> TimeSeries {
        let daily: Vec<TimeSeries> = self.values().map(Liability::daily_balance).collect();
        TimeSeries::sum_aligned(daily.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::OnConflict;
    use jiff::civil::date;

    fn terms(principal: f64, rate: f64, payment: f64) -> LoanTerms {
        LoanTerms {
            principal,
            annual_rate: rate,
            payment,
            frequency: Frequency::Monthly,
            start: date(2025, 1, 1),
        }
    }

    #[test]
    fn test_zero_rate_amortizes_linearly() {
        let loan = Liability::new("car", terms(12_000.0, 0.0, 1_000.0)).unwrap();
        assert_eq!(loan.payments().dates().len(), 12);
        assert_eq!(loan.payoff_date(), Some(date(2025, 12, 1)));
        assert!((loan.total_paid() - 12_000.0).abs() < 1e-9);
        assert_eq!(loan.balance_after_payments().values()[0], 11_000.0);
        assert!(loan.payments().is_outflow());
    }

    #[test]
    fn test_interest_increases_total_paid() {
        let loan = Liability::new("student", terms(20_000.0, 0.06, 500.0)).unwrap();
        assert!(loan.total_paid() > 20_000.0);
        let last = loan.payments().effective().last_value().unwrap();
        assert!(last <= 500.0 + 1e-9);
        assert!(loan.balance_after_payments().values().iter().all(|b| *b >= 0.0));
    }

    #[test]
    fn test_payment_must_cover_interest() {
        let err = Liability::new("bad", terms(100_000.0, 0.12, 100.0));
        assert!(err.is_err());
    }

    #[test]
    fn test_daily_balance_accrues_between_payments() {
        let loan = Liability::new("loan", terms(10_000.0, 0.05, 1_000.0)).unwrap();
        let daily = loan.daily_balance();
        let after_first = daily.get(date(2025, 1, 1)).unwrap();
        let before_second = daily.get(date(2025, 1, 31)).unwrap();
        assert!((after_first - 9_000.0).abs() < 1e-9);
        let expected = 9_000.0 * (0.05 * 30.0 / DAYS_PER_YEAR).exp();
        assert!((before_second - expected).abs() < 1e-9);
        assert_eq!(loan.balance_on(date(2024, 6, 1)), 0.0);
        assert_eq!(loan.balance_on(date(2040, 1, 1)), 0.0);
    }

    #[test]
    fn test_liabilities_total() {
        let mut loans = Liabilities::new();
        let a = Liability::new("a", terms(1_200.0, 0.0, 100.0)).unwrap();
        loans.insert("a", a, OnConflict::Error).unwrap();
        let b = Liability::new("b", terms(600.0, 0.0, 100.0)).unwrap();
        loans.insert("b", b, OnConflict::Error).unwrap();
        let total = loans.total_balance();
        assert_eq!(total.get(date(2025, 1, 1)), Some(1_100.0 + 500.0));
        assert!((loans.total().values()[0] + 200.0).abs() < 1e-12);
    }
}
