use std::sync::Arc;

use chrono::{DateTime, Utc};
use ownerpulse_api_client::{FetchCapability, PageReader};
use ownerpulse_core::{AggregateSnapshot, Cursor, DayZone, FoldPolicy, NextCursor};
use ownerpulse_runtime_config::{MAX_PAGE_SIZE, PulseConfig};
use tracing::{debug, info, warn};

use crate::store::{Generation, ScanPhase, ScanStore};

pub const DEFAULT_MAX_PAGES: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub take: u32,
    pub max_pages: u32,
    pub policy: FoldPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            take: MAX_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            policy: FoldPolicy::default(),
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &PulseConfig) -> anyhow::Result<Self> {
        let zone: DayZone = config.calendar.zone.parse()?;
        Ok(Self {
            take: config.scan.take,
            max_pages: config.scan.max_pages,
            policy: FoldPolicy::new(zone, config.scan.recent_window_days),
        })
    }
}

/// How a single run ended, as seen by the run itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub generation: Generation,
    pub phase: ScanPhase,
    pub pages_fetched: u32,
    pub records_seen: u64,
    pub truncated: bool,
}

/// Drives one page walk per generation and publishes into a [`ScanStore`].
pub struct ScanController<F> {
    store: ScanStore,
    reader: PageReader<F>,
    options: ScanOptions,
    clock: fn() -> DateTime<Utc>,
}

impl<F: FetchCapability> ScanController<F> {
    pub fn new(store: ScanStore, reader: PageReader<F>, options: ScanOptions) -> Self {
        Self {
            store,
            reader,
            options,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for the recent-window check.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Open a new generation, making any in-flight run stale.
    pub fn start(&self) -> Generation {
        let generation = self.store.begin();
        info!(
            generation = %generation,
            collection = self.reader.collection(),
            "Scan started"
        );
        generation
    }

    /// Start a generation and walk it to the end.
    pub async fn scan(&self) -> ScanOutcome {
        let generation = self.start();
        self.run(generation).await
    }

    /// Walk the collection for `generation`.
    ///
    /// Never fails: a fetch error ends the walk as `PartiallyFailed` with
    /// everything folded so far still published. Once `generation` is stale
    /// nothing more is published and the run reports `Aborted`.
    pub async fn run(&self, generation: Generation) -> ScanOutcome {
        let mut outcome = ScanOutcome {
            generation,
            phase: ScanPhase::Running,
            pages_fetched: 0,
            records_seen: 0,
            truncated: false,
        };
        let mut snapshot = Arc::new(AggregateSnapshot::default());
        let mut cursor: Option<Cursor> = None;

        loop {
            if !self.store.is_current(generation) {
                return aborted(outcome);
            }

            let page = match self.reader.fetch_page(cursor.as_ref(), self.options.take).await {
                Ok(page) => page,
                Err(err) => {
                    let published = self.store.publish(generation, |state| {
                        state.phase = ScanPhase::PartiallyFailed;
                        state.partial = true;
                        state.error = Some(err.to_string());
                    });
                    if !published {
                        return aborted(outcome);
                    }
                    warn!(
                        generation = %generation,
                        pages = outcome.pages_fetched,
                        "Page fetch failed, keeping partial results: {err}"
                    );
                    outcome.phase = ScanPhase::PartiallyFailed;
                    return outcome;
                }
            };

            outcome.pages_fetched += 1;
            outcome.records_seen += page.records.len() as u64;
            Arc::make_mut(&mut snapshot).fold_in_place(
                &page.records,
                (self.clock)(),
                &self.options.policy,
            );

            if let NextCursor::Unreadable(raw) = &page.next {
                let published = self.store.publish(generation, |state| {
                    state.snapshot = Arc::clone(&snapshot);
                    state.pages_fetched = outcome.pages_fetched;
                    state.phase = ScanPhase::PartiallyFailed;
                    state.partial = true;
                    state.error = Some(format!("unreadable nextCursor {raw}"));
                });
                if !published {
                    return aborted(outcome);
                }
                warn!(
                    generation = %generation,
                    pages = outcome.pages_fetched,
                    next_cursor = %raw,
                    "Cannot follow nextCursor, keeping partial results"
                );
                outcome.phase = ScanPhase::PartiallyFailed;
                return outcome;
            }

            cursor = page.next_cursor().cloned();
            let truncated = cursor.is_some() && outcome.pages_fetched >= self.options.max_pages;
            let finished = cursor.is_none() || truncated;
            let published = self.store.publish(generation, |state| {
                state.snapshot = Arc::clone(&snapshot);
                state.pages_fetched = outcome.pages_fetched;
                state.truncated = truncated;
                if finished {
                    state.phase = ScanPhase::Completed;
                }
            });
            if !published {
                return aborted(outcome);
            }
            debug!(
                generation = %generation,
                page = outcome.pages_fetched,
                records = page.records.len(),
                total = snapshot.total,
                "Folded page"
            );

            if finished {
                if truncated {
                    warn!(
                        generation = %generation,
                        max_pages = self.options.max_pages,
                        "Page cap reached before the last page, results may be truncated"
                    );
                }
                info!(
                    generation = %generation,
                    pages = outcome.pages_fetched,
                    total = snapshot.total,
                    "Scan completed"
                );
                outcome.phase = ScanPhase::Completed;
                outcome.truncated = truncated;
                return outcome;
            }
        }
    }
}

fn aborted(mut outcome: ScanOutcome) -> ScanOutcome {
    debug!(
        generation = %outcome.generation,
        pages = outcome.pages_fetched,
        "Generation superseded, dropping scan"
    );
    outcome.phase = ScanPhase::Aborted;
    outcome
}
