//! The derivation pipeline: filter, sort and aggregate an expense collection into the views that
//! the table, the charts and the summary display.
//!
//! Everything here is pure. The input collection is never mutated and the same inputs always
//! produce the same, order-stable output.

use crate::model::{Amount, Expense};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chart colors, assigned to categories by position.
pub const PALETTE: [&str; 5] = ["#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#B19CD9"];

/// How the filtered list should be ordered.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Keep the order of the collection.
    #[default]
    None,
    /// Oldest first.
    DateAsc,
    /// Newest first.
    DateDesc,
    /// Smallest amount first.
    AmountAsc,
    /// Largest amount first.
    AmountDesc,
}

serde_plain::derive_display_from_serialize!(SortKey);
serde_plain::derive_fromstr_from_deserialize!(SortKey);

/// The time zone that places an expense's instant on a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayZone {
    /// One offset for every instant.
    Fixed(FixedOffset),
    /// The system's local zone, with the offset in effect at each instant.
    Local,
}

impl Default for DayZone {
    fn default() -> Self {
        DayZone::Fixed(Utc.fix())
    }
}

impl DayZone {
    /// The calendar day `instant` falls on in this zone.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            DayZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
            DayZone::Local => instant.with_timezone(&Local).date_naive(),
        }
    }
}

/// The filter and sort settings of the expense table. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    category: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    sort: SortKey,
    /// Places each expense's instant onto a calendar day for the date bounds.
    zone: DayZone,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            category: None,
            start: None,
            end: None,
            sort: SortKey::None,
            zone: DayZone::default(),
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the list to one category. An empty string means no restriction.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Includes only expenses dated on or after `start`.
    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    /// Includes only expenses dated on or before `end`, the whole day included.
    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.zone = DayZone::Fixed(offset);
        self
    }

    pub fn with_zone(mut self, zone: DayZone) -> Self {
        self.zone = zone;
        self
    }

    /// The active category filter, `None` when absent or empty.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn zone(&self) -> DayZone {
        self.zone
    }

    /// True when no filter and no sort is set, i.e. `apply_filters` is the identity.
    pub fn is_empty(&self) -> bool {
        self.category().is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.sort == SortKey::None
    }

    fn matches(&self, expense: &Expense) -> bool {
        if let Some(category) = self.category() {
            if expense.category() != category {
                return false;
            }
        }
        let day = self.zone.day_of(expense.date());
        if self.start.is_some_and(|start| day < start) {
            return false;
        }
        if self.end.is_some_and(|end| day > end) {
            return false;
        }
        true
    }
}

/// Returns the expenses of `collection` that pass every filter of `config`, ordered by its sort
/// key. Equal sort keys keep their relative input order.
pub fn apply_filters(collection: &[Expense], config: &FilterConfig) -> Vec<Expense> {
    let mut list: Vec<Expense> = collection
        .iter()
        .filter(|e| config.matches(e))
        .cloned()
        .collect();

    // `sort_by` is stable
    match config.sort() {
        SortKey::None => {}
        SortKey::DateAsc => list.sort_by(|a, b| a.date().cmp(&b.date())),
        SortKey::DateDesc => list.sort_by(|a, b| b.date().cmp(&a.date())),
        SortKey::AmountAsc => list.sort_by(|a, b| a.amount().cmp(&b.amount())),
        SortKey::AmountDesc => list.sort_by(|a, b| b.amount().cmp(&a.amount())),
    }
    list
}

/// The total of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Amount,
}

/// Totals per category, in the order each category was first seen.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTotals(Vec<CategoryTotal>);

impl CategoryTotals {
    pub fn get(&self, category: &str) -> Option<Amount> {
        self.0
            .iter()
            .find(|t| t.category == category)
            .map(|t| t.total)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryTotal> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The sum over all categories.
    pub fn grand_total(&self) -> Amount {
        self.0.iter().map(|t| t.total).sum()
    }

    /// Pie and bar chart data: one slice per category with its share of the grand total and a
    /// palette color.
    pub fn chart(&self) -> Vec<ChartSlice> {
        let grand_total = self.grand_total().to_f64();
        self.0
            .iter()
            .enumerate()
            .map(|(ix, t)| ChartSlice {
                name: t.category.clone(),
                value: t.total,
                share: if grand_total == 0.0 {
                    0.0
                } else {
                    t.total.to_f64() / grand_total
                },
                color: PALETTE[ix % PALETTE.len()],
            })
            .collect()
    }
}

/// One category's slice of the spending charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSlice {
    pub name: String,
    pub value: Amount,
    /// Fraction of the grand total, between 0 and 1 for non-negative amounts.
    pub share: f64,
    pub color: &'static str,
}

/// Sums the amounts of `collection` per category.
pub fn aggregate_by_category(collection: &[Expense]) -> CategoryTotals {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for expense in collection {
        match index.get(expense.category()) {
            Some(&ix) => totals[ix].total = totals[ix].total + expense.amount(),
            None => {
                index.insert(expense.category(), totals.len());
                totals.push(CategoryTotal {
                    category: expense.category().to_string(),
                    total: expense.amount(),
                });
            }
        }
    }
    CategoryTotals(totals)
}

/// Scalar metrics over the whole collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: Amount,
    pub count: usize,
    /// Zero when there are no expenses.
    pub average: Amount,
}

pub fn summarize(collection: &[Expense]) -> Summary {
    let total: Amount = collection.iter().map(Expense::amount).sum();
    let count = collection.len();
    Summary {
        total,
        count,
        average: total.divide(count),
    }
}

/// Everything derived from the collection and the filter configuration. Recomputed after every
/// change to either; never cached.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Views {
    /// The filtered and sorted table rows.
    pub list: Vec<Expense>,
    /// Per-category totals of the unfiltered collection.
    pub totals: CategoryTotals,
    /// Metrics of the unfiltered collection.
    pub summary: Summary,
}

impl Views {
    pub fn compute(collection: &[Expense], config: &FilterConfig) -> Self {
        Self {
            list: apply_filters(collection, config),
            totals: aggregate_by_category(collection),
            summary: summarize(collection),
        }
    }
}
