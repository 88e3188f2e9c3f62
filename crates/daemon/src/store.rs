//! Shared scan state: the generation counter plus the latest published view.
//!
//! A [`ScanStore`] is an explicit handle. Clones share the same state, so a
//! dashboard, its scan tasks and any readers can all hold one; tests simply
//! create a fresh store.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use ownerpulse_core::AggregateSnapshot;
use serde::Serialize;
use tokio::sync::watch;

/// Identifies one logical scan attempt. Strictly increasing per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Running,
    Completed,
    /// Superseded by a newer generation. Only ever reported to the run
    /// itself; the store belongs to the newer generation by then.
    Aborted,
    /// A page fetch failed; everything folded before it is kept.
    PartiallyFailed,
}

/// What readers see: the latest snapshot of the current generation.
#[derive(Debug, Clone, Serialize)]
pub struct ScanState {
    pub generation: Generation,
    pub phase: ScanPhase,
    pub snapshot: Arc<AggregateSnapshot>,
    pub pages_fetched: u32,
    /// Some data may be missing because a page fetch failed.
    pub partial: bool,
    /// The page cap stopped the walk while the upstream still had a cursor.
    pub truncated: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScanState {
    fn idle() -> Self {
        Self {
            generation: Generation::default(),
            phase: ScanPhase::Idle,
            snapshot: Arc::new(AggregateSnapshot::default()),
            pages_fetched: 0,
            partial: false,
            truncated: false,
            error: None,
            updated_at: None,
        }
    }

    fn running(generation: Generation) -> Self {
        Self {
            generation,
            phase: ScanPhase::Running,
            updated_at: Some(Utc::now()),
            ..Self::idle()
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == ScanPhase::Running
    }
}

struct StoreInner {
    generation: AtomicU64,
    state: watch::Sender<ScanState>,
}

#[derive(Clone)]
pub struct ScanStore {
    inner: Arc<StoreInner>,
}

impl Default for ScanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ScanState::idle());
        Self {
            inner: Arc::new(StoreInner {
                generation: AtomicU64::new(0),
                state,
            }),
        }
    }

    /// Open a new generation and reset the published state to an empty,
    /// running scan. Every older generation is stale from here on.
    pub fn begin(&self) -> Generation {
        let mut started = Generation::default();
        // The bump happens under the channel's write lock, so a concurrent
        // publish either lands before it or sees the new generation.
        self.inner.state.send_modify(|state| {
            started = Generation(self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *state = ScanState::running(started);
        });
        started
    }

    pub fn current(&self) -> Generation {
        Generation(self.inner.generation.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }

    /// Apply `update` to the published state if `generation` is still
    /// current. Returns false (and changes nothing) for stale generations.
    pub fn publish<U>(&self, generation: Generation, update: U) -> bool
    where
        U: FnOnce(&mut ScanState),
    {
        self.inner.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            update(state);
            state.updated_at = Some(Utc::now());
            true
        })
    }

    pub fn latest(&self) -> ScanState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.inner.state.subscribe()
    }
}
