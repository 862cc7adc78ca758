//! Children in the household and what they cost.

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::date_math::{add_days, add_years, daily_dates};
use crate::error::{LookupError, Result, ValidationError};
use crate::flows::{CashFlow, FlowKind};
use crate::schedule::Frequency;
use crate::series::TimeSeries;

/// Years a child is counted as living at home, from birth
pub const YEARS_IN_HOUSEHOLD: i32 = 18;

/// Reference tables quote yearly amounts; series are kept per day
const DAYS_PER_TABLE_YEAR: f64 = 365.0;

/// Number of children at home on each day.
///
/// The series runs from the day before the first birth to the day after the
/// last child leaves, so it starts and ends at zero. No birth dates gives an
/// empty series.
pub fn children_in_household(birth_dates: &[Date]) -> TimeSeries {
    let (Some(first), Some(last_birth)) = (birth_dates.iter().min(), birth_dates.iter().max())
    else {
        return TimeSeries::empty();
    };
    let grid = daily_dates(
        add_days(*first, -1),
        add_days(add_years(*last_birth, YEARS_IN_HOUSEHOLD), 1),
    );
    let windows: Vec<(Date, Date)> = birth_dates
        .iter()
        .map(|b| (*b, add_years(*b, YEARS_IN_HOUSEHOLD)))
        .collect();
    let values = grid
        .iter()
        .map(|d| windows.iter().filter(|(from, to)| from <= d && d <= to).count() as f64)
        .collect();
    TimeSeries::from_sorted(grid, values)
}

/// Per-child cost multiplier by number of children at home.
///
/// A count uses the entry with the largest key not above it; zero children
/// always costs nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomiesOfScale {
    pub multipliers: BTreeMap<u32, f64>,
}

impl Default for EconomiesOfScale {
    fn default() -> Self {
        Self {
            multipliers: BTreeMap::from([(1, 1.27), (2, 1.0), (3, 0.76)]),
        }
    }
}

impl EconomiesOfScale {
    pub fn multiplier(&self, children: u32) -> f64 {
        if children == 0 {
            return 0.0;
        }
        self.multipliers
            .range(..=children)
            .next_back()
            .map_or(1.0, |(_, m)| *m)
    }
}

/// Yearly spending per category for one child, by age
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenditureSchedule {
    /// Age in days at which each row takes effect, strictly increasing
    pub age_days: Vec<u32>,
    /// Category name to yearly amounts, one per row
    pub categories: BTreeMap<String, Vec<f64>>,
}

impl ExpenditureSchedule {
    pub fn new(age_days: Vec<u32>, categories: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        if age_days.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::UnorderedDates.into());
        }
        for values in categories.values() {
            if values.len() != age_days.len() {
                return Err(ValidationError::LengthMismatch {
                    dates: age_days.len(),
                    values: values.len(),
                }
                .into());
            }
        }
        Ok(Self { age_days, categories })
    }

    /// Daily cost per category for a child born on `birth`, over their years
    /// at home. Ages before the first row cost nothing.
    pub fn daily_costs(&self, birth: Date) -> BTreeMap<String, TimeSeries> {
        let grid = daily_dates(birth, add_years(birth, YEARS_IN_HOUSEHOLD));
        let rows: Vec<Option<usize>> = (0..grid.len())
            .map(|age| {
                let idx = self.age_days.partition_point(|a| (*a as usize) <= age);
                idx.checked_sub(1)
            })
            .collect();
        self.categories
            .iter()
            .map(|(name, yearly)| {
                let values = rows
                    .iter()
                    .map(|row| row.map_or(0.0, |r| yearly[r] / DAYS_PER_TABLE_YEAR))
                    .collect();
                (name.clone(), TimeSeries::from_sorted(grid.clone(), values))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenditureBracket {
    pub region: String,
    pub income_group: String,
    pub schedule: ExpenditureSchedule,
}

/// Child-rearing costs by region and household income group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildExpenditureTable {
    brackets: Vec<ExpenditureBracket>,
}

impl ChildExpenditureTable {
    pub fn new(brackets: Vec<ExpenditureBracket>) -> Self {
        Self { brackets }
    }

    pub fn schedule(&self, region: &str, income_group: &str) -> Result<&ExpenditureSchedule> {
        self.brackets
            .iter()
            .find(|b| b.region == region && b.income_group == income_group)
            .map(|b| &b.schedule)
            .ok_or_else(|| {
                LookupError::ExpenditureBracketNotFound {
                    region: region.to_string(),
                    income_group: income_group.to_string(),
                }
                .into()
            })
    }
}

/// Household spending on children, per category per day
#[derive(Debug, Clone, PartialEq)]
pub struct ChildExpenditures {
    categories: BTreeMap<String, TimeSeries>,
}

impl ChildExpenditures {
    /// Sum every child's costs and scale each day by the multiplier for the
    /// number of children at home that day
    pub fn project(
        birth_dates: &[Date],
        schedule: &ExpenditureSchedule,
        scale: &EconomiesOfScale,
    ) -> Self {
        let counts = children_in_household(birth_dates);
        let per_child: Vec<BTreeMap<String, TimeSeries>> =
            birth_dates.iter().map(|b| schedule.daily_costs(*b)).collect();

        let categories = schedule
            .categories
            .keys()
            .map(|name| {
                let summed = TimeSeries::sum_aligned(per_child.iter().filter_map(|c| c.get(name)));
                let multipliers = counts.reindex(summed.dates(), 0.0);
                let scaled =
                    summed.zip_with(&multipliers, |cost, n| cost * scale.multiplier(n as u32));
                (name.clone(), scaled)
            })
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &BTreeMap<String, TimeSeries> {
        &self.categories
    }

    /// All categories summed per day
    pub fn total(&self) -> TimeSeries {
        TimeSeries::sum_aligned(self.categories.values())
    }

    /// Each category summed per calendar month
    pub fn monthly(&self) -> BTreeMap<String, TimeSeries> {
        self.categories
            .iter()
            .map(|(name, s)| (name.clone(), s.resample_sum(Frequency::Monthly)))
            .collect()
    }

    /// Monthly totals as a post-tax expense dated on the first of each month
    pub fn to_expense(&self, name: impl Into<String>) -> Result<CashFlow> {
        let monthly = self.total().resample_sum(Frequency::Monthly);
        CashFlow::schedule(
            FlowKind::Expense { pretax: false },
            name,
            monthly.dates().to_vec(),
            monthly.values().to_vec(),
        )
        .frequency(Frequency::MonthStart)
        .build()
    }
}
