//! The tabular data engine facade
//!
//! Composes profiling, statistics, sorting, search, paging and the version
//! history behind one handle for the upload/filter/history UI. Local
//! navigation (undo/redo, sort, search) never touches the server, while
//! commits and deletes are only applied once the server has confirmed them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dm_core::events::events::{
    DatasetActivated, HistoryReconciled, OperationFailed, PageLoaded, VersionCommitted,
    VersionDeleted,
};
use dm_core::{Dataset, EventBus, FileId, Row, SharedDataset, StorageClient, VersionHistory};
use dm_data::pagination::slice_page;
use dm_data::{
    ColumnProfiler, ColumnStatistics, DataError, DatasetSummary, EngineConfig, PageFetch,
    PageOrigin, PageState, Paginator, ProfileSet, SearchFilter, SortEngine, SortState,
    StatisticsEngine, StatsScope,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::state::{EngineSnapshot, EngineState};

/// Releases the commit gate however the commit ends
struct CommitGuard<'a> {
    gate: &'a AtomicBool,
}

impl<'a> CommitGuard<'a> {
    fn acquire(gate: &'a AtomicBool) -> Option<Self> {
        gate.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { gate })
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.gate.store(false, Ordering::Release);
    }
}

/// Client-side engine over one dataset and its version history
pub struct TabularDataEngine {
    client: Arc<dyn StorageClient>,
    config: EngineConfig,
    profiler: ColumnProfiler,
    statistics: StatisticsEngine,
    sorter: SortEngine,
    search: SearchFilter,
    paginator: Paginator,
    state: Arc<RwLock<EngineState>>,
    commit_gate: AtomicBool,
    events: Arc<EventBus>,
}

impl TabularDataEngine {
    /// Create an engine talking to `client`
    pub fn new(client: Arc<dyn StorageClient>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            paginator: Paginator::with_client(Arc::clone(&client), config.default_page_size),
            profiler: ColumnProfiler::from_config(&config),
            statistics: StatisticsEngine::from_config(&config),
            sorter: SortEngine::new(),
            search: SearchFilter::new(),
            client,
            config,
            state: Arc::new(RwLock::new(EngineState::default())),
            commit_gate: AtomicBool::new(false),
            events: Arc::new(EventBus::new()),
        })
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a dataset that is not persisted anywhere (client mode)
    pub fn upload(&self, dataset: Dataset) {
        info!("Uploading {} rows", dataset.len());
        let activated = {
            let mut state = self.state.write();
            *state = EngineState::default();
            state.history.initialize(Arc::new(dataset));
            self.activate(&mut state)
        };
        self.publish_activated(activated);
    }

    /// Select a file stored on the server and rebuild all state from it
    pub async fn open_file(&self, file_id: FileId) -> Result<(), EngineError> {
        info!("Opening file {}", file_id);
        let entries = self
            .client
            .history(file_id)
            .await
            .map_err(|err| self.report("open_file", err))?;

        let starts_at_original = entries.first().map(|e| e.version == 1).unwrap_or(false);
        let original = if starts_at_original {
            None
        } else {
            Some(self.original_snapshot(file_id).await?)
        };

        let mut history = VersionHistory::new();
        history
            .reconcile(entries, original)
            .map_err(|err| self.report("open_file", err))?;

        let (reconciled, activated) = {
            let mut state = self.state.write();
            *state = EngineState::default();
            state.file_id = Some(file_id);
            state.history = history;
            (reconciled_event(&state.history), self.activate(&mut state))
        };

        self.events.publish(reconciled);
        self.publish_activated(activated);
        Ok(())
    }

    /// Run a server-side filter and record its result as a new version.
    ///
    /// Only one filter may be outstanding; a second call while one is in
    /// flight is rejected rather than queued.
    pub async fn apply_filter(&self, query: &str) -> Result<u32, EngineError> {
        let file_id = self.state.read().file_id.ok_or(EngineError::NoRemoteFile)?;
        let _guard = CommitGuard::acquire(&self.commit_gate).ok_or(EngineError::CommitInFlight)?;

        info!("Applying filter '{}' to file {}", query, file_id);
        let response = self
            .client
            .apply_filter(file_id, query)
            .await
            .map_err(|err| self.report("apply_filter", err))?;
        let assigned = self.assigned_version(file_id).await;

        let description = response.description;
        let (committed, activated) = {
            let mut state = self.state.write();

            // An empty result still keeps the column headers
            let dataset = if response.data.is_empty() {
                let columns = state
                    .history
                    .viewed()
                    .map(|v| v.dataset.columns().to_vec())
                    .unwrap_or_default();
                Dataset::with_columns(columns, Vec::new())
            } else {
                Dataset::from_rows(response.data)
            };
            let row_count = dataset.len();

            let dataset = Arc::new(dataset);
            let numbered = match assigned {
                Some(number) => state
                    .history
                    .commit_as(number, Arc::clone(&dataset), description.clone())
                    .or_else(|err| {
                        warn!("Numbering locally instead: {}", err);
                        state.history.commit(Arc::clone(&dataset), description.clone())
                    }),
                None => state.history.commit(dataset, description.clone()),
            };
            let version_number = match numbered {
                Ok(version_number) => version_number,
                Err(err) => {
                    drop(state);
                    return Err(self.report("apply_filter", err));
                }
            };

            let committed = VersionCommitted {
                version_number,
                description,
                row_count,
            };
            (committed, self.activate(&mut state))
        };

        let version_number = committed.version_number;
        self.events.publish(committed);
        self.publish_activated(activated);
        Ok(version_number)
    }

    /// Number the storage service gave its newly committed version.
    /// `None` when the history cannot be fetched.
    async fn assigned_version(&self, file_id: FileId) -> Option<u32> {
        match self.client.history(file_id).await {
            Ok(entries) => entries
                .iter()
                .rev()
                .find(|entry| entry.is_current)
                .or_else(|| entries.last())
                .map(|entry| entry.version),
            Err(err) => {
                warn!("Could not read the assigned version number: {}", err);
                None
            }
        }
    }

    /// Whether a filter is currently outstanding
    pub fn is_committing(&self) -> bool {
        self.commit_gate.load(Ordering::Acquire)
    }

    /// View the previous version. Local only.
    pub fn undo(&self) -> bool {
        self.navigate(VersionHistory::undo)
    }

    /// View the next version. Local only.
    pub fn redo(&self) -> bool {
        self.navigate(VersionHistory::redo)
    }

    fn navigate(&self, step: impl FnOnce(&mut VersionHistory) -> bool) -> bool {
        let activated = {
            let mut state = self.state.write();
            if !step(&mut state.history) {
                return false;
            }
            self.activate(&mut state)
        };
        self.publish_activated(activated);
        true
    }

    /// Delete a stored version.
    ///
    /// Validation happens before any request. Once the server confirms, the
    /// authoritative history is fetched again instead of renumbering locally.
    pub async fn delete_version(&self, version_number: u32) -> Result<(), EngineError> {
        let (pending, file_id, original) = {
            let state = self.state.read();
            let pending = state.history.prepare_delete(version_number)?;
            let original = state.history.original().map(|v| Arc::clone(&v.dataset));
            (pending, state.file_id, original)
        };

        let Some(file_id) = file_id else {
            // Nothing on a server to keep in sync with
            let activated = {
                let mut state = self.state.write();
                state.history.remove_local(&pending)?;
                self.activate(&mut state)
            };
            self.events.publish(VersionDeleted { version_number });
            self.publish_activated(activated);
            return Ok(());
        };

        self.client
            .delete_version(file_id, version_number)
            .await
            .map_err(|err| self.report("delete_version", err))?;
        info!(
            "Deleted version {} of file {} (committed: {})",
            version_number, file_id, pending.was_current
        );

        let refreshed = match self.client.history(file_id).await {
            Ok(entries) => Some(entries),
            Err(err) => {
                warn!("Could not refresh history after delete: {}", err);
                None
            }
        };

        let (reconciled, activated) = {
            let mut state = self.state.write();
            let outcome = refreshed.map(|entries| state.history.reconcile(entries, original));
            let reconciled = match outcome {
                Some(Ok(())) => Some(reconciled_event(&state.history)),
                Some(Err(err)) => {
                    warn!("Server history unusable after delete: {}", err);
                    None
                }
                None => None,
            };
            if reconciled.is_none() {
                if let Err(err) = state.history.remove_local(&pending) {
                    debug!("Version already gone locally: {}", err);
                }
            }
            (reconciled, self.activate(&mut state))
        };

        self.events.publish(VersionDeleted { version_number });
        if let Some(reconciled) = reconciled {
            self.events.publish(reconciled);
        }
        self.publish_activated(activated);
        Ok(())
    }

    /// One header click on `column`
    pub fn sort_by(&self, column: &str) -> Result<SortState, EngineError> {
        let mut state = self.state.write();
        let original = state.history.viewed_dataset().ok_or(EngineError::NoDataset)?;
        let (sorted, next) = self
            .sorter
            .toggle(&original, column, &state.sort, &state.profiles)?;

        state.sort = next.clone();
        state.sorted = sorted;
        state.view = self.search.filter(&state.sorted, &state.search_query);
        self.paginator.set_source(state.page_source());
        Ok(next)
    }

    /// Narrow the view to rows containing `query`; returns the match count.
    /// This is a view filter and is never recorded in the history.
    pub fn search(&self, query: &str) -> Result<usize, EngineError> {
        let mut state = self.state.write();
        if state.history.is_empty() {
            return Err(EngineError::NoDataset);
        }

        state.search_query = query.to_string();
        state.view = self.search.filter(&state.sorted, query);
        self.paginator.set_source(state.page_source());
        debug!("Search '{}' matched {} rows", query, state.view.len());
        Ok(state.view.len())
    }

    pub fn clear_search(&self) -> Result<usize, EngineError> {
        self.search("")
    }

    /// Load one page of the view
    pub async fn page(&self, page_index: usize) -> Result<PageFetch, EngineError> {
        let fetch = self
            .paginator
            .get_page(page_index)
            .await
            .map_err(|err| self.report("page", err))?;

        if let Some(page) = fetch.page() {
            self.events.publish(PageLoaded {
                page_index: page.state.page_index,
                total_pages: page.state.total_pages,
                row_count: page.rows.len(),
                fallback: page.origin == PageOrigin::Fallback,
            });
        }
        Ok(fetch)
    }

    pub fn set_page_size(&self, page_size: usize) -> Result<PageState, EngineError> {
        Ok(self.paginator.set_page_size(page_size)?)
    }

    pub fn page_state(&self) -> PageState {
        self.paginator.state()
    }

    /// Rows of the page on display; page 1 of the view until one is loaded
    pub fn visible_rows(&self) -> Vec<Row> {
        self.visible_scope().0
    }

    fn visible_scope(&self) -> (Vec<Row>, StatsScope) {
        if let Some(page) = self.paginator.current_page() {
            let scope = match page.origin {
                PageOrigin::Remote => StatsScope::server_page(page.state.total_rows),
                _ => StatsScope::complete(),
            };
            return (page.rows, scope);
        }

        let view = Arc::clone(&self.state.read().view);
        let rows = slice_page(&view, 1, self.paginator.state().page_size)
            .map(|page| page.rows)
            .unwrap_or_default();
        (rows, StatsScope::complete())
    }

    /// Statistics of one column over the visible rows
    pub fn statistics(&self, column: &str) -> Result<ColumnStatistics, EngineError> {
        let kind = self
            .state
            .read()
            .profiles
            .kind_of(column)
            .ok_or_else(|| DataError::UnknownColumn(column.to_string()))?;

        let (rows, scope) = self.visible_scope();
        Ok(self.statistics.compute(&rows, column, kind, scope))
    }

    /// Statistics of every column over the visible rows
    pub fn statistics_all(&self) -> Vec<ColumnStatistics> {
        let profiles = self.profiles();
        let (rows, scope) = self.visible_scope();
        self.statistics.compute_all(&rows, &profiles, scope)
    }

    /// Summary of every row in the current view, not just the visible page
    pub fn summary(&self) -> DatasetSummary {
        let (view, profiles) = {
            let state = self.state.read();
            (Arc::clone(&state.view), state.profiles.clone())
        };
        self.statistics.summarize(view.rows(), &profiles)
    }

    pub fn profiles(&self) -> ProfileSet {
        self.state.read().profiles.clone()
    }

    pub fn history(&self) -> VersionHistory {
        self.state.read().history.clone()
    }

    /// Unsorted dataset of the version on display
    pub fn viewed_dataset(&self) -> Option<SharedDataset> {
        self.state.read().history.viewed_dataset()
    }

    /// Sorted and searched rows that are being paged
    pub fn view(&self) -> SharedDataset {
        Arc::clone(&self.state.read().view)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let page = self.paginator.state();
        self.state.read().snapshot(page, self.is_committing())
    }

    /// Make the viewed version the displayed dataset: re-profile, reset the
    /// sort, re-apply the search and send the paginator back to page 1
    fn activate(&self, state: &mut EngineState) -> Option<DatasetActivated> {
        let viewed = state
            .history
            .viewed()
            .map(|v| (Arc::clone(&v.dataset), v.version_number));

        let Some((dataset, version_number)) = viewed else {
            state.profiles = ProfileSet::default();
            state.sort = SortState::default();
            state.sorted = Arc::default();
            state.view = Arc::default();
            self.paginator.set_source(state.page_source());
            return None;
        };

        state.profiles = self.profiler.profile(&dataset);
        state.sort = SortState::default();
        state.sorted = Arc::clone(&dataset);
        state.view = self.search.filter(&state.sorted, &state.search_query);
        self.paginator.set_source(state.page_source());

        Some(DatasetActivated {
            version_number,
            row_count: dataset.len(),
            column_count: dataset.columns().len(),
        })
    }

    fn publish_activated(&self, activated: Option<DatasetActivated>) {
        if let Some(event) = activated {
            debug!("Displaying version {} ({} rows)", event.version_number, event.row_count);
            self.events.publish(event);
        }
    }

    /// Snapshot used to rebuild version 1 when the server history lacks it
    async fn original_snapshot(&self, file_id: FileId) -> Result<SharedDataset, EngineError> {
        let local = {
            let state = self.state.read();
            match state.file_id {
                Some(id) if id == file_id => {
                    state.history.original().map(|v| Arc::clone(&v.dataset))
                }
                _ => None,
            }
        };
        if let Some(dataset) = local {
            return Ok(dataset);
        }

        let response = self
            .client
            .original(file_id)
            .await
            .map_err(|err| self.report("open_file", err))?;
        Ok(Arc::new(response.into_dataset()))
    }

    fn report(&self, operation: &'static str, error: impl Into<EngineError>) -> EngineError {
        let error = error.into();
        warn!("{} failed: {}", operation, error);
        self.events.publish(OperationFailed {
            operation,
            error: error.to_string(),
        });
        error
    }
}

fn reconciled_event(history: &VersionHistory) -> HistoryReconciled {
    HistoryReconciled {
        version_count: history.len(),
        viewed_version: history.viewed().map(|v| v.version_number).unwrap_or(1),
    }
}
