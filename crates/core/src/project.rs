//! Filtered, display-ready views over an [`AggregateSnapshot`].
//!
//! Everything here is pure: projections are recomputed from the latest
//! snapshot on every filter change, never fetched.

use crate::aggregate::AggregateSnapshot;
use crate::day::DayKey;
use crate::directory::OwnerDirectory;
use crate::record::OwnerId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Which days a projection covers.
///
/// A `Single` without a day or a `Range` missing an endpoint is an
/// incomplete selection and falls back to all-time totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DateSelection {
    #[default]
    #[serde(rename = "none")]
    AllTime,
    Single {
        #[serde(default)]
        day: Option<DayKey>,
    },
    Range {
        #[serde(default)]
        start: Option<DayKey>,
        #[serde(default)]
        end: Option<DayKey>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub date: DateSelection,
    /// Empty means every owner.
    #[serde(default)]
    pub selected_owners: BTreeSet<OwnerId>,
}

impl Filter {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn single_day(day: DayKey) -> Self {
        Self {
            date: DateSelection::Single { day: Some(day) },
            ..Self::default()
        }
    }

    pub fn range(start: DayKey, end: DayKey) -> Self {
        Self {
            date: DateSelection::Range {
                start: Some(start),
                end: Some(end),
            },
            ..Self::default()
        }
    }

    pub fn with_owners<I, O>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OwnerId>,
    {
        self.selected_owners = owners.into_iter().map(Into::into).collect();
        self
    }

    fn admits(&self, owner: &OwnerId) -> bool {
        self.selected_owners.is_empty() || self.selected_owners.contains(owner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredRow {
    pub owner_id: OwnerId,
    pub display_name: String,
    pub count: u64,
}

/// Entry for an owner picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerOption {
    pub owner_id: OwnerId,
    pub display_name: String,
    pub total: u64,
}

/// Project a snapshot through a filter.
///
/// Rows are sorted by count descending, ties by owner id ascending.
pub fn project(
    snapshot: &AggregateSnapshot,
    filter: &Filter,
    directory: &OwnerDirectory,
) -> Vec<FilteredRow> {
    let source = source_counts(snapshot, &filter.date);
    let mut rows: Vec<FilteredRow> = source
        .iter()
        .filter(|(owner, _)| filter.admits(owner))
        .map(|(owner, count)| FilteredRow {
            owner_id: owner.clone(),
            display_name: directory.display_name(owner),
            count: *count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.owner_id.cmp(&b.owner_id))
    });
    rows
}

fn source_counts<'a>(
    snapshot: &'a AggregateSnapshot,
    date: &DateSelection,
) -> Cow<'a, BTreeMap<OwnerId, u64>> {
    match date {
        DateSelection::Single { day: Some(day) } => snapshot
            .day_counts(*day)
            .map(Cow::Borrowed)
            .unwrap_or_default(),
        DateSelection::Range {
            start: Some(start),
            end: Some(end),
        } => Cow::Owned(sum_range(snapshot, *start, *end)),
        _ => Cow::Borrowed(&snapshot.owner_totals),
    }
}

/// Element-wise sum over every day in the inclusive span. Reversed
/// endpoints are swapped.
fn sum_range(snapshot: &AggregateSnapshot, a: DayKey, b: DayKey) -> BTreeMap<OwnerId, u64> {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let mut sums = BTreeMap::new();
    for owners in snapshot.owner_daily_counts.range(start..=end).map(|(_, o)| o) {
        for (owner, count) in owners {
            *sums.entry(owner.clone()).or_default() += count;
        }
    }
    sums
}

/// Per-day totals for the selected owners, zero-filled across the span.
pub fn daily_series(
    snapshot: &AggregateSnapshot,
    start: DayKey,
    end: DayKey,
    selected_owners: &BTreeSet<OwnerId>,
) -> Vec<(DayKey, u64)> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    start
        .through(end)
        .map(|day| {
            let count = snapshot
                .day_counts(day)
                .map(|owners| {
                    owners
                        .iter()
                        .filter(|(owner, _)| {
                            selected_owners.is_empty() || selected_owners.contains(*owner)
                        })
                        .map(|(_, count)| count)
                        .sum::<u64>()
                })
                .unwrap_or(0);
            (day, count)
        })
        .collect()
}

/// Every owner seen in the snapshot or known to the directory, sorted by
/// display name.
pub fn owner_options(
    snapshot: &AggregateSnapshot,
    directory: &OwnerDirectory,
) -> Vec<OwnerOption> {
    let ids: BTreeSet<&OwnerId> = snapshot
        .owner_totals
        .keys()
        .chain(directory.ids())
        .collect();
    let mut options: Vec<OwnerOption> = ids
        .into_iter()
        .map(|id| OwnerOption {
            owner_id: id.clone(),
            display_name: directory.display_name(id),
            total: snapshot.owner_totals.get(id).copied().unwrap_or(0),
        })
        .collect();
    options.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.owner_id.cmp(&b.owner_id))
    });
    options
}
