use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use ownerpulse_api_client::{FetchCapability, PageReader, fetch_assignable_users};
use ownerpulse_core::{
    CurrentUser, Filter, FilteredRow, OwnerDirectory, OwnerOption, owner_options, project,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::{ScanController, ScanOptions, ScanOutcome};
use crate::store::{Generation, ScanState, ScanStore};

struct ScanContext<F> {
    fetch: Arc<F>,
    user: CurrentUser,
}

/// Caller-facing surface: scans, filters and display rows.
///
/// A new fetch capability or user restarts the scan; filters only re-project
/// the latest published snapshot.
pub struct Dashboard<F> {
    store: ScanStore,
    options: ScanOptions,
    collection: String,
    context: Option<ScanContext<F>>,
    filter: Filter,
    directory: Arc<RwLock<OwnerDirectory>>,
    directory_epoch: Arc<AtomicU64>,
    scan_task: Option<JoinHandle<ScanOutcome>>,
    lookup_task: Option<JoinHandle<()>>,
}

impl<F: FetchCapability + 'static> Dashboard<F> {
    pub fn new(store: ScanStore, options: ScanOptions, collection: &str) -> Self {
        Self {
            store,
            options,
            collection: collection.to_string(),
            context: None,
            filter: Filter::default(),
            directory: Arc::new(RwLock::new(OwnerDirectory::new())),
            directory_epoch: Arc::new(AtomicU64::new(0)),
            scan_task: None,
            lookup_task: None,
        }
    }

    /// Install the session's fetch capability and user.
    ///
    /// Restarts the scan and reloads owner names when either differs from the
    /// current context; returns the new generation in that case.
    pub fn set_context(&mut self, fetch: Arc<F>, user: CurrentUser) -> Option<Generation> {
        if let Some(current) = &self.context {
            if Arc::ptr_eq(&current.fetch, &fetch) && current.user == user {
                debug!("Context unchanged, keeping current scan");
                return None;
            }
        }

        let epoch = {
            let mut directory = self.directory.write().unwrap_or_else(PoisonError::into_inner);
            *directory = OwnerDirectory::seeded(&user);
            self.directory_epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.spawn_directory_lookup(Arc::clone(&fetch), epoch);
        self.context = Some(ScanContext { fetch, user });
        self.start_scan()
    }

    /// Start a fresh scan with the current context. `None` without a context.
    pub fn start_scan(&mut self) -> Option<Generation> {
        let context = self.context.as_ref()?;
        let reader = PageReader::new(Arc::clone(&context.fetch), &self.collection);
        let controller = ScanController::new(self.store.clone(), reader, self.options);
        let generation = controller.start();
        // The previous task is left to notice it is stale on its own.
        self.scan_task = Some(tokio::spawn(async move { controller.run(generation).await }));
        Some(generation)
    }

    fn spawn_directory_lookup(&mut self, fetch: Arc<F>, epoch: u64) {
        let directory = Arc::clone(&self.directory);
        let current_epoch = Arc::clone(&self.directory_epoch);
        self.lookup_task = Some(tokio::spawn(async move {
            let users = match fetch_assignable_users(fetch.as_ref()).await {
                Ok(users) => users,
                Err(err) => {
                    warn!("Owner name lookup failed, falling back to id labels: {err}");
                    return;
                }
            };
            let mut directory = directory.write().unwrap_or_else(PoisonError::into_inner);
            if current_epoch.load(Ordering::SeqCst) != epoch {
                debug!("Context changed during owner lookup, discarding names");
                return;
            }
            let count = users.len();
            directory.extend(users.into_iter().map(|u| (u.id, u.name)));
            info!("Loaded {count} owner names");
        }));
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.context.as_ref().map(|c| &c.user)
    }

    /// Rows for the current filter over the latest published snapshot.
    pub fn latest_rows(&self) -> Vec<FilteredRow> {
        let state = self.store.latest();
        let directory = self.directory.read().unwrap_or_else(PoisonError::into_inner);
        project(&state.snapshot, &self.filter, &directory)
    }

    pub fn owner_options(&self) -> Vec<OwnerOption> {
        let state = self.store.latest();
        let directory = self.directory.read().unwrap_or_else(PoisonError::into_inner);
        owner_options(&state.snapshot, &directory)
    }

    pub fn status(&self) -> ScanState {
        self.store.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.store.subscribe()
    }

    /// Wait for the most recently started scan task.
    pub async fn wait_for_scan(&mut self) -> Option<ScanOutcome> {
        let task = self.scan_task.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!("Scan task ended abnormally: {err}");
                None
            }
        }
    }

    /// Wait for the pending owner-name lookup, if any.
    pub async fn wait_for_directory(&mut self) {
        if let Some(task) = self.lookup_task.take() {
            if let Err(err) = task.await {
                warn!("Owner lookup task ended abnormally: {err}");
            }
        }
    }
}
