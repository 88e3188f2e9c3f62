use crate::day::{DayKey, DayZone};
use crate::record::{OwnerId, Record};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 7;

/// How records are bucketed while folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldPolicy {
    pub zone: DayZone,
    /// Records created at most this long before `now` count as recent.
    pub recent_window: Duration,
}

impl Default for FoldPolicy {
    fn default() -> Self {
        Self {
            zone: DayZone::Local,
            recent_window: Duration::days(DEFAULT_RECENT_WINDOW_DAYS),
        }
    }
}

impl FoldPolicy {
    pub fn new(zone: DayZone, recent_window_days: u32) -> Self {
        Self {
            zone,
            recent_window: Duration::days(i64::from(recent_window_days)),
        }
    }
}

/// Running per-owner statistics for one scan.
///
/// `sum(owner_totals) == total` holds after every fold; the per-day map only
/// sees records whose `createdAt` parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSnapshot {
    pub owner_totals: BTreeMap<OwnerId, u64>,
    pub owner_daily_counts: BTreeMap<DayKey, BTreeMap<OwnerId, u64>>,
    pub total: u64,
    pub recent_count: u64,
}

impl AggregateSnapshot {
    /// Fold a batch into a new snapshot, leaving `self` untouched.
    pub fn fold(&self, records: &[Record], now: DateTime<Utc>, policy: &FoldPolicy) -> Self {
        let mut next = self.clone();
        next.fold_in_place(records, now, policy);
        next
    }

    /// Fold a batch into this snapshot. Only for the sole owner of the value.
    pub fn fold_in_place(&mut self, records: &[Record], now: DateTime<Utc>, policy: &FoldPolicy) {
        for record in records {
            self.add(record, now, policy);
        }
    }

    fn add(&mut self, record: &Record, now: DateTime<Utc>, policy: &FoldPolicy) {
        *self
            .owner_totals
            .entry(record.owner_id.clone())
            .or_default() += 1;
        self.total += 1;

        let Some(created) = record
            .created_at
            .as_deref()
            .and_then(|raw| policy.zone.parse_timestamp(raw))
        else {
            return;
        };

        *self
            .owner_daily_counts
            .entry(policy.zone.day_key(created))
            .or_default()
            .entry(record.owner_id.clone())
            .or_default() += 1;

        if now - created <= policy.recent_window {
            self.recent_count += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn day_counts(&self, day: DayKey) -> Option<&BTreeMap<OwnerId, u64>> {
        self.owner_daily_counts.get(&day)
    }

    /// Records that landed in a day bucket.
    pub fn dated_total(&self) -> u64 {
        self.owner_daily_counts
            .values()
            .flat_map(|owners| owners.values())
            .sum()
    }

    /// Earliest and latest day with activity.
    pub fn day_span(&self) -> Option<(DayKey, DayKey)> {
        let first = self.owner_daily_counts.keys().next()?;
        let last = self.owner_daily_counts.keys().next_back()?;
        Some((*first, *last))
    }
}
