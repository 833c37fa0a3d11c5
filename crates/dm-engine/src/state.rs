//! Explicit engine state
//!
//! Everything the table view depends on lives in one struct so every
//! transition is a single replacement under one lock.

use std::sync::Arc;

use dm_core::{FileId, SharedDataset, VersionHistory};
use dm_data::{PageSource, PageState, ProfileSet, SortState};
use serde::Serialize;

/// Mutable state behind the facade
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// Set once the dataset is persisted on the server (remote mode)
    pub file_id: Option<FileId>,
    pub history: VersionHistory,
    /// Profiles of the viewed version
    pub profiles: ProfileSet,
    pub sort: SortState,
    /// Viewed version after sorting
    pub sorted: SharedDataset,
    /// Sorted rows narrowed by the search query; this is what gets paged
    pub view: SharedDataset,
    pub search_query: String,
}

impl EngineState {
    /// Where the paginator should take rows from.
    ///
    /// The server only pages its committed version in stored order, so any
    /// local reordering, search or browsing of an older version pages the
    /// in-memory view instead.
    pub fn page_source(&self) -> PageSource {
        let viewing_committed = self
            .history
            .viewed()
            .map(|v| v.is_current)
            .unwrap_or(false);

        match self.file_id {
            Some(file_id)
                if viewing_committed && !self.sort.is_sorted() && self.search_query.is_empty() =>
            {
                PageSource::Remote {
                    file_id,
                    last_known: Arc::clone(&self.view),
                }
            }
            _ => PageSource::Client(Arc::clone(&self.view)),
        }
    }

    pub fn snapshot(&self, page: PageState, commit_in_flight: bool) -> EngineSnapshot {
        EngineSnapshot {
            file_id: self.file_id,
            version_count: self.history.len(),
            current_index: self.history.current_index(),
            viewed_version: self.history.viewed().map(|v| v.version_number),
            committed_version: self.history.committed().map(|v| v.version_number),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            sort: self.sort.clone(),
            search_query: self.search_query.clone(),
            visible_rows: self.view.len(),
            page,
            commit_in_flight,
        }
    }
}

/// Read-only summary for the view layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub file_id: Option<FileId>,
    pub version_count: usize,
    pub current_index: usize,
    pub viewed_version: Option<u32>,
    pub committed_version: Option<u32>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub sort: SortState,
    pub search_query: String,
    pub visible_rows: usize,
    pub page: PageState,
    pub commit_in_flight: bool,
}
