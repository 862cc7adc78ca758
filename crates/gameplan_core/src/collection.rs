//! Labeled, insertion-ordered containers and their date-aligned totals.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::flows::{CashFlow, FlowKind, IncomeStream};
use crate::series::TimeSeries;

/// What to do when a label is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnConflict {
    #[default]
    Error,
    Overwrite,
}

/// Anything that contributes a single signed flow to a total
pub trait AsCashFlow {
    fn cash_flow(&self) -> &CashFlow;
}

impl AsCashFlow for CashFlow {
    fn cash_flow(&self) -> &CashFlow {
        self
    }
}

/// Ordered map from unique label to item
#[derive(Debug, Clone)]
pub struct Collection<T> {
    entries: Vec<(String, T)>,
    index: FxHashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Register `item` under `label`.
    ///
    /// An overwrite keeps the label's original position.
    pub fn insert(
        &mut self,
        label: impl Into<String>,
        item: T,
        on_conflict: OnConflict,
    ) -> Result<(), ValidationError> {
        let label = label.into();
        match self.index.get(&label) {
            Some(&idx) => match on_conflict {
                OnConflict::Error => Err(ValidationError::DuplicateLabel(label)),
                OnConflict::Overwrite => {
                    tracing::warn!(label = %label, "label already exists, overwriting");
                    self.entries[idx].1 = item;
                    Ok(())
                }
            },
            None => {
                self.index.insert(label.clone(), self.entries.len());
                self.entries.push((label, item));
                Ok(())
            }
        }
    }

    /// Insert or silently replace, returning the previous item. Meant for
    /// derived entries that are rebuilt under a fixed label.
    pub fn upsert(&mut self, label: impl Into<String>, item: T) -> Option<T> {
        let label = label.into();
        match self.index.get(&label) {
            Some(&idx) => Some(std::mem::replace(&mut self.entries[idx].1, item)),
            None => {
                self.index.insert(label.clone(), self.entries.len());
                self.entries.push((label, item));
                None
            }
        }
    }

    /// Remove and return the item under `label`; a missing label only warns.
    pub fn remove(&mut self, label: &str) -> Option<T> {
        let Some(idx) = self.index.remove(label) else {
            tracing::warn!(label, "no item with this label to remove");
            return None;
        };
        let (_, item) = self.entries.remove(idx);
        for (_, pos) in self.index.iter_mut() {
            if *pos > idx {
                *pos -= 1;
            }
        }
        Some(item)
    }

    pub fn get(&self, label: &str) -> Option<&T> {
        self.index.get(label).map(|&idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut T> {
        self.index.get(label).map(|&idx| &mut self.entries[idx].1)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(label, item)| (label.as_str(), item))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, item)| item)
    }
}

impl<T: Clone> Collection<T> {
    /// A new collection holding the members that satisfy `keep`, in order
    pub fn filtered(&self, keep: impl Fn(&T) -> bool) -> Self {
        let mut out = Self::new();
        for (label, item) in &self.entries {
            if keep(item) {
                out.index.insert(label.clone(), out.entries.len());
                out.entries.push((label.clone(), item.clone()));
            }
        }
        out
    }
}

impl<T: AsCashFlow> Collection<T> {
    fn aligned_sum(&self, include: impl Fn(&CashFlow) -> bool) -> TimeSeries {
        let signed: Vec<TimeSeries> = self
            .values()
            .map(AsCashFlow::cash_flow)
            .filter(|flow| include(*flow))
            .map(CashFlow::signed)
            .collect();
        TimeSeries::sum_aligned(signed.iter())
    }

    /// Signed sum of every member over the union of their dates.
    ///
    /// Outflows count negatively; a member without an observation on a date
    /// contributes zero there.
    pub fn total(&self) -> TimeSeries {
        if self.is_empty() {
            tracing::warn!("total requested for an empty collection");
        }
        self.aligned_sum(|_| true)
    }

    /// [`Self::total`] zero-filled onto `dates`
    pub fn total_on(&self, dates: &[jiff::civil::Date]) -> TimeSeries {
        self.total().reindex(dates, 0.0)
    }

    /// Sum of the members that add to their owner's balance
    pub fn inflows(&self) -> TimeSeries {
        self.aligned_sum(|flow| !flow.is_outflow())
    }

    /// Sum of the members that reduce their owner's balance (negative values)
    pub fn outflows(&self) -> TimeSeries {
        self.aligned_sum(CashFlow::is_outflow)
    }
}

/// Contributions and debits against an asset, or deductions from a paycheck
pub type FlowCollection = Collection<CashFlow>;

pub type IncomeStreams = Collection<IncomeStream>;

pub type Expenses = Collection<CashFlow>;

impl Collection<CashFlow> {
    /// Expenses paid out of gross income
    pub fn pretax(&self) -> Self {
        self.filtered(|flow| matches!(flow.kind(), FlowKind::Expense { pretax: true }))
    }

    /// Expenses paid out of take-home income
    pub fn post_tax(&self) -> Self {
        self.filtered(|flow| matches!(flow.kind(), FlowKind::Expense { pretax: false }))
    }
}

impl IncomeStreams {
    /// Sum of take-home pay across streams, aligned over all pay dates
    pub fn total_take_home(&self) -> TimeSeries {
        let take_home: Vec<TimeSeries> = self.values().map(IncomeStream::take_home).collect();
        TimeSeries::sum_aligned(take_home.iter())
    }
}
