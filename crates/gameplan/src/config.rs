//! Plan definitions loaded from YAML.
//!
//! A plan file describes the inputs of one projection: the horizon, cash on
//! hand, salaries, expenses, a 401k, market holdings and loans. [`Plan`]
//! resolves referenced data files once and can then build any number of
//! seeded [`Portfolio`]s.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::eyre::{WrapErr, bail};
use gameplan_core::date_math::DAYS_PER_YEAR;
use gameplan_core::error::LookupError;
use gameplan_core::flows::expense;
use gameplan_core::growth::income::{IncomeGrowthModel, IncomeTable};
use gameplan_core::portfolio::RETIREMENT_401K;
use gameplan_core::schedule::{DateRange, Frequency};
use gameplan_core::{
    Asset, EmployerMatch, GrowthSpec, IncomeStream, Liability, LoanTerms, OnConflict, Portfolio,
    ReturnProfile, ReturnsCache, Salary,
};
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

fn default_years() -> i32 {
    30
}

fn monthly() -> Frequency {
    Frequency::Monthly
}

fn month_start() -> Frequency {
    Frequency::MonthStart
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub start: Date,
    #[serde(default = "default_years")]
    pub years: i32,
    #[serde(default)]
    pub seed: u64,
    pub cash: CashConfig,
    /// Income reference table, relative to the plan file
    #[serde(default)]
    pub income_table: Option<PathBuf>,
    #[serde(default)]
    pub salaries: Vec<SalaryConfig>,
    #[serde(default)]
    pub expenses: Vec<ExpenseConfig>,
    #[serde(default)]
    pub retirement: Option<RetirementConfig>,
    #[serde(default)]
    pub holdings: Vec<HoldingConfig>,
    #[serde(default)]
    pub liabilities: Vec<LiabilityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashConfig {
    pub balance: f64,
    #[serde(default)]
    pub interest_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryConfig {
    pub label: String,
    pub annual: f64,
    #[serde(default = "monthly")]
    pub frequency: Frequency,
    #[serde(default)]
    pub tax_rate: f64,
    /// First paycheck; defaults to the plan start
    #[serde(default)]
    pub start: Option<Date>,
    #[serde(default)]
    pub end: Option<Date>,
    #[serde(default)]
    pub growth: SalaryGrowth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SalaryGrowth {
    /// The built-in career curve
    #[default]
    Default,
    None,
    Curve { spec: GrowthSpec },
    /// Follow a percentile column of the income reference table
    IncomeModel { birth_date: Date, percentile: u8 },
}

/// Expenses run from the plan start to the end of the horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpenseConfig {
    Rent {
        amount: f64,
    },
    Utilities {
        amount: f64,
    },
    Misc {
        amount: f64,
    },
    Custom {
        label: String,
        amount: f64,
        #[serde(default = "month_start")]
        frequency: Frequency,
        #[serde(default)]
        growth: Option<GrowthSpec>,
        #[serde(default)]
        discount_rate: Option<f64>,
    },
    /// Fixed amount withheld from every paycheck of `salary`
    Pretax {
        label: String,
        salary: String,
        amount: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementConfig {
    /// Salary the contributions are withheld from
    pub salary: String,
    pub percentage: f64,
    #[serde(default)]
    pub employer_match: Option<EmployerMatch>,
    #[serde(default)]
    pub initial_balance: f64,
    /// Invest in this ticker; otherwise the account earns `interest_rate`
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub interest_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingConfig {
    pub ticker: String,
    pub value: f64,
    #[serde(default)]
    pub profile: Option<ReturnProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiabilityConfig {
    pub label: String,
    pub principal: f64,
    pub annual_rate: f64,
    pub payment: f64,
    #[serde(default = "monthly")]
    pub frequency: Frequency,
    #[serde(default)]
    pub start: Option<Date>,
}

/// Income reference data as stored on disk, with ages in years
#[derive(Debug, Clone, Deserialize)]
struct IncomeTableFile {
    ages: Vec<f64>,
    columns: BTreeMap<u8, Vec<f64>>,
}

fn load_income_table(path: &Path) -> color_eyre::Result<IncomeTable> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read income table {}", path.display()))?;
    let file: IncomeTableFile = serde_saphyr::from_str(&text)
        .wrap_err_with(|| format!("Failed to parse income table {}", path.display()))?;
    let ages = file.ages.iter().map(|y| y * DAYS_PER_YEAR).collect();
    IncomeTable::new(ages, file.columns).wrap_err("Invalid income table")
}

/// A parsed plan with its reference data resolved
#[derive(Debug, Clone)]
pub struct Plan {
    config: PlanConfig,
    income_table: Option<Arc<IncomeTable>>,
}

impl Plan {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read plan {}", path.display()))?;
        let config: PlanConfig = serde_saphyr::from_str(&text)
            .wrap_err_with(|| format!("Failed to parse plan {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_config(config, base_dir)
    }

    /// Resolve `config`'s data files against `base_dir`
    pub fn from_config(config: PlanConfig, base_dir: &Path) -> color_eyre::Result<Self> {
        let income_table = match &config.income_table {
            Some(rel) => Some(Arc::new(load_income_table(&base_dir.join(rel))?)),
            None => None,
        };
        if income_table.is_none()
            && let Some(salary) = config
                .salaries
                .iter()
                .find(|s| matches!(s.growth, SalaryGrowth::IncomeModel { .. }))
        {
            bail!(
                "salary '{}' follows the income model but the plan has no income_table",
                salary.label
            );
        }
        tracing::debug!(
            salaries = config.salaries.len(),
            expenses = config.expenses.len(),
            holdings = config.holdings.len(),
            "plan loaded"
        );
        Ok(Self { config, income_table })
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn horizon(&self) -> gameplan_core::Result<DateRange> {
        Ok(DateRange::daily_horizon(self.config.start, self.config.years)?)
    }

    /// Build the portfolio. `seed` drives market returns and expense noise.
    pub fn build(&self, seed: u64) -> gameplan_core::Result<Portfolio> {
        let cfg = &self.config;
        let horizon = self.horizon()?;
        let mut portfolio = Portfolio::new(cfg.cash.balance, cfg.cash.interest_rate, horizon)?;

        let cache = ReturnsCache::new(seed, horizon.start(), horizon.end());
        for holding in &cfg.holdings {
            if let Some(profile) = holding.profile {
                cache.set_profile(holding.ticker.as_str(), profile);
            }
            let asset = Asset::equity(&holding.ticker, holding.value, horizon, &cache)?;
            portfolio.add_asset(holding.ticker.as_str(), asset, OnConflict::Error)?;
        }

        for salary in &cfg.salaries {
            let stream = self.salary(salary, horizon)?;
            portfolio.add_income_stream(salary.label.as_str(), stream, OnConflict::Error)?;
        }

        if let Some(retirement) = &cfg.retirement {
            let account = match &retirement.ticker {
                Some(ticker) => Asset::equity(ticker, retirement.initial_balance, horizon, &cache)?,
                None => Asset::interest_bearing(
                    retirement.initial_balance,
                    retirement.interest_rate,
                    horizon,
                )?,
            };
            portfolio.add_asset(RETIREMENT_401K, account, OnConflict::Error)?;
            portfolio.add_401k_contribution(
                &retirement.salary,
                retirement.percentage,
                retirement.employer_match,
                OnConflict::Error,
            )?;
        }

        for (i, item) in cfg.expenses.iter().enumerate() {
            let noise_seed = seed.wrapping_add(i as u64);
            let (start, end) = (horizon.start(), horizon.end());
            let (label, flow) = match item {
                ExpenseConfig::Rent { amount } => {
                    ("rent".to_string(), expense::rent(*amount, start, end).build()?)
                }
                ExpenseConfig::Utilities { amount } => (
                    "utilities".to_string(),
                    expense::utilities(*amount, start, end, noise_seed).build()?,
                ),
                ExpenseConfig::Misc { amount } => (
                    "misc_spending".to_string(),
                    expense::misc_spending(*amount, start, end, noise_seed).build()?,
                ),
                ExpenseConfig::Custom {
                    label,
                    amount,
                    frequency,
                    growth,
                    discount_rate,
                } => {
                    let mut builder =
                        expense::expense(label.as_str(), start, end, *frequency, *amount);
                    if let Some(spec) = growth {
                        builder = builder.growth(spec.clone());
                    }
                    if let Some(rate) = discount_rate {
                        builder = builder.discount(*rate);
                    }
                    (label.clone(), builder.build()?)
                }
                ExpenseConfig::Pretax { label, salary, amount } => {
                    portfolio.add_pretax_expense(salary, *amount, label, OnConflict::Error)?;
                    continue;
                }
            };
            portfolio.add_expense(label, flow, OnConflict::Error)?;
        }

        for loan in &cfg.liabilities {
            let terms = LoanTerms {
                principal: loan.principal,
                annual_rate: loan.annual_rate,
                payment: loan.payment,
                frequency: loan.frequency,
                start: loan.start.unwrap_or(horizon.start()),
            };
            let liability = Liability::new(loan.label.as_str(), terms)?;
            portfolio.add_liability(loan.label.as_str(), liability, OnConflict::Error)?;
        }

        tracing::debug!(seed, "portfolio built");
        Ok(portfolio)
    }

    fn salary(
        &self,
        cfg: &SalaryConfig,
        horizon: DateRange,
    ) -> gameplan_core::Result<IncomeStream> {
        let first = cfg.start.unwrap_or(horizon.start());
        let mut salary = Salary::annual(cfg.annual, cfg.frequency, first)
            .name(cfg.label.as_str())
            .tax_rate(cfg.tax_rate)
            .last_paycheck(cfg.end.unwrap_or(horizon.end()));
        salary = match &cfg.growth {
            SalaryGrowth::Default => salary,
            SalaryGrowth::None => salary.no_growth(),
            SalaryGrowth::Curve { spec } => salary.growth(spec.clone()),
            SalaryGrowth::IncomeModel { birth_date, percentile } => {
                let table = self
                    .income_table
                    .as_ref()
                    .ok_or(LookupError::IncomeTableNotFound)?;
                let model = IncomeGrowthModel::new(*birth_date, Arc::clone(table), *percentile)?;
                salary.growth_from_model(&model)?
            }
        };
        salary.build()
    }
}
