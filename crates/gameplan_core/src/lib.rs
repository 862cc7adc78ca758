//! Personal finance projection library
//!
//! This crate models an individual's cash flows as date-indexed series and
//! projects savings and net worth forward in time. It supports:
//! - Recurring and one-off flows with growth curves, local volatility and discounting
//! - Growth curves fitted to sparse anchor points (polynomial, logistic, linear, exponential)
//! - Salaries with deductions, taxes and take-home pay
//! - Assets compounding daily under fixed interest or simulated equity returns
//! - Amortizing liabilities
//! - Portfolios that keep cash savings consistent with income and spending
//! - Weighted income percentiles and child expenditure projections
//!
//! # Example
//!
//! ```ignore
//! use gameplan_core::{OnConflict, Portfolio, Salary};
//! use gameplan_core::schedule::{DateRange, Frequency};
//!
//! let horizon = DateRange::daily_horizon(jiff::civil::date(2025, 1, 1), 10)?;
//! let mut plan = Portfolio::new(10_000.0, 0.01, horizon)?;
//! let salary = Salary::annual(120_000.0, Frequency::Monthly, horizon.start())
//!     .tax_rate(0.25)
//!     .build()?;
//! plan.add_income_stream("salary", salary, OnConflict::Error)?;
//! let savings = plan.cash_savings()?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Time series primitives
// ============================================================================

pub mod date_math;
pub mod error;
pub mod schedule;
pub mod series;

// ============================================================================
// Flows and growth
// ============================================================================

pub mod collection;
pub mod flows;
pub mod growth;

// ============================================================================
// Balances and composition
// ============================================================================

pub mod asset;
pub mod liability;
pub mod portfolio;
pub mod returns;

// ============================================================================
// Reference-data analyses and batches
// ============================================================================

pub mod household;
pub mod percentile;
pub mod scenarios;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use asset::{Asset, AssetType, Assets};
pub use collection::{AsCashFlow, Collection, OnConflict};
pub use error::{EngineError, Result};
pub use flows::{CashFlow, FlowKind, IncomeStream, Salary};
pub use growth::{GrowthCurve, GrowthSpec};
pub use liability::{Liability, LoanTerms};
pub use portfolio::{EmployerMatch, Portfolio};
pub use returns::{ReturnProfile, ReturnsCache};
pub use series::TimeSeries;
