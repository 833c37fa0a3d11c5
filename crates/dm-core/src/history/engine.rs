//! Version history state machine

use std::sync::Arc;

use tracing::{debug, info};

use super::{HistoryError, HistoryState, PendingDelete, Version, INITIAL_DESCRIPTION};
use crate::dataset::{Dataset, SharedDataset};
use crate::storage::HistoryEntry;

/// Ordered dataset versions plus the local viewing pointer
#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    versions: Vec<Version>,
    current_index: usize,
    /// Highest version number ever handed out, truncated ones included
    highest_assigned: u32,
}

impl VersionHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HistoryState {
        if self.versions.is_empty() {
            HistoryState::Empty
        } else {
            HistoryState::Active
        }
    }

    /// Start a history from a fresh upload, discarding anything held before
    pub fn initialize(&mut self, dataset: SharedDataset) {
        let mut initial = Version::new(1, dataset, INITIAL_DESCRIPTION);
        initial.is_current = true;

        self.versions = vec![initial];
        self.current_index = 0;
        self.highest_assigned = 1;
        debug!("History initialized with {} rows", self.versions[0].row_count());
    }

    /// Record a new version after a transformation succeeded, numbered
    /// one past the highest number handed out so far.
    ///
    /// Versions after the viewing pointer are discarded first; history stays
    /// linear. Returns the new version number.
    pub fn commit(
        &mut self,
        dataset: SharedDataset,
        description: impl Into<String>,
    ) -> Result<u32, HistoryError> {
        self.commit_as(self.highest_assigned + 1, dataset, description)
    }

    /// Like [`commit`](Self::commit), but with the number the storage
    /// service assigned. It must be above every version kept after the
    /// truncation.
    pub fn commit_as(
        &mut self,
        version_number: u32,
        dataset: SharedDataset,
        description: impl Into<String>,
    ) -> Result<u32, HistoryError> {
        if self.versions.is_empty() {
            return Err(HistoryError::Empty);
        }
        let newest_kept = self.versions[self.current_index].version_number;
        if version_number <= newest_kept {
            return Err(HistoryError::OutOfOrderVersion {
                version: version_number,
                newest: newest_kept,
            });
        }

        let discarded = self.versions.len() - self.current_index - 1;
        if discarded > 0 {
            debug!("Commit discards {} newer version(s)", discarded);
        }
        self.versions.truncate(self.current_index + 1);

        for version in &mut self.versions {
            version.is_current = false;
        }
        let mut version = Version::new(version_number, dataset, description);
        version.is_current = true;
        self.versions.push(version);

        self.current_index = self.versions.len() - 1;
        self.highest_assigned = self.highest_assigned.max(version_number);
        info!("Committed version {}", version_number);
        Ok(version_number)
    }

    /// Step the viewing pointer back. Returns `false` at the oldest version.
    pub fn undo(&mut self) -> bool {
        if self.can_undo() {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    /// Step the viewing pointer forward. Returns `false` at the newest version.
    pub fn redo(&mut self) -> bool {
        if self.can_redo() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.versions.is_empty() && self.current_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_index + 1 < self.versions.len()
    }

    /// Validate a delete before anything is sent to the server
    pub fn prepare_delete(&self, version_number: u32) -> Result<PendingDelete, HistoryError> {
        if self.versions.is_empty() {
            return Err(HistoryError::Empty);
        }
        if version_number == 1 {
            return Err(HistoryError::ProtectedVersion(version_number));
        }

        let version = self
            .version(version_number)
            .ok_or(HistoryError::UnknownVersion(version_number))?;

        Ok(PendingDelete {
            version_number,
            was_current: version.is_current,
        })
    }

    /// Drop a deleted version without consulting the server.
    ///
    /// Version numbers are left untouched. The viewing pointer keeps showing
    /// the same version when possible, or falls back to its predecessor.
    pub fn remove_local(&mut self, pending: &PendingDelete) -> Result<(), HistoryError> {
        let index = self
            .index_of(pending.version_number)
            .ok_or(HistoryError::UnknownVersion(pending.version_number))?;
        if index == 0 {
            return Err(HistoryError::ProtectedVersion(pending.version_number));
        }

        let removed = self.versions.remove(index);
        if self.current_index >= index {
            self.current_index -= 1;
        }
        if removed.is_current {
            // The server committed state moved to whatever preceded it
            self.versions[index - 1].is_current = true;
        }
        debug!("Removed version {} locally", removed.version_number);
        Ok(())
    }

    /// Replace the whole history with the server's view of it.
    ///
    /// When the server list does not begin with version 1, `original` is used
    /// to synthesize it so the original upload is always present.
    pub fn reconcile(
        &mut self,
        entries: Vec<HistoryEntry>,
        original: Option<SharedDataset>,
    ) -> Result<(), HistoryError> {
        let mut versions: Vec<Version> = entries
            .into_iter()
            .map(|entry| Version {
                version_number: entry.version,
                dataset: Arc::new(Dataset::from_rows(entry.data)),
                description: entry.description,
                is_current: entry.is_current,
            })
            .collect();
        versions.sort_by_key(|v| v.version_number);

        if let Some(pair) = versions
            .windows(2)
            .find(|pair| pair[0].version_number == pair[1].version_number)
        {
            return Err(HistoryError::DuplicateVersion(pair[0].version_number));
        }

        let starts_at_original = versions.first().map(Version::is_original).unwrap_or(false);
        if !starts_at_original {
            let original = original.ok_or(HistoryError::MissingOriginal)?;
            versions.insert(0, Version::new(1, original, INITIAL_DESCRIPTION));
        }

        let current_index = versions
            .iter()
            .rposition(|v| v.is_current)
            .unwrap_or(versions.len() - 1);
        for (idx, version) in versions.iter_mut().enumerate() {
            version.is_current = idx == current_index;
        }

        let newest = versions.last().map(|v| v.version_number).unwrap_or(1);
        self.highest_assigned = self.highest_assigned.max(newest);
        self.versions = versions;
        self.current_index = current_index;

        info!(
            "Reconciled history: {} version(s), viewing version {}",
            self.versions.len(),
            self.versions[current_index].version_number
        );
        Ok(())
    }

    /// Forget everything, returning to the empty state
    pub fn clear(&mut self) {
        self.versions.clear();
        self.current_index = 0;
        self.highest_assigned = 0;
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The version currently being viewed
    pub fn viewed(&self) -> Option<&Version> {
        self.versions.get(self.current_index)
    }

    /// Dataset of the version currently being viewed
    pub fn viewed_dataset(&self) -> Option<SharedDataset> {
        self.viewed().map(|v| Arc::clone(&v.dataset))
    }

    /// The version the server considers committed
    pub fn committed(&self) -> Option<&Version> {
        self.versions.iter().find(|v| v.is_current)
    }

    /// The original upload
    pub fn original(&self) -> Option<&Version> {
        self.versions.first()
    }

    pub fn version(&self, version_number: u32) -> Option<&Version> {
        self.versions.iter().find(|v| v.version_number == version_number)
    }

    fn index_of(&self, version_number: u32) -> Option<usize> {
        self.versions
            .iter()
            .position(|v| v.version_number == version_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{row, Value};

    fn dataset(n: usize) -> SharedDataset {
        let rows = (0..n)
            .map(|i| row([("id", Value::from(i as i64))]))
            .collect();
        Arc::new(Dataset::from_rows(rows))
    }

    fn entry(version: u32, rows: usize, is_current: bool) -> HistoryEntry {
        HistoryEntry {
            data: dataset(rows).rows().to_vec(),
            description: format!("version {}", version),
            is_current,
            version,
        }
    }

    fn numbers(history: &VersionHistory) -> Vec<u32> {
        history.versions().iter().map(|v| v.version_number).collect()
    }

    #[test]
    fn test_initialize() {
        let mut history = VersionHistory::new();
        assert_eq!(history.state(), HistoryState::Empty);

        history.initialize(dataset(10));
        assert_eq!(history.state(), HistoryState::Active);
        assert_eq!(history.len(), 1);
        assert_eq!(history.current_index(), 0);
        let original = history.original().unwrap();
        assert_eq!(original.version_number, 1);
        assert_eq!(original.description, INITIAL_DESCRIPTION);
        assert!(original.is_current);
    }

    #[test]
    fn test_commit_requires_upload() {
        let mut history = VersionHistory::new();
        assert_eq!(history.commit(dataset(1), "x"), Err(HistoryError::Empty));
        assert!(history.is_empty());
    }

    #[test]
    fn test_undo_redo_scenario() {
        let mut history = VersionHistory::new();
        let original = dataset(10);
        history.initialize(Arc::clone(&original));

        let filtered = dataset(4);
        let number = history.commit(Arc::clone(&filtered), "age > 30").unwrap();
        assert_eq!(number, 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.current_index(), 1);

        assert!(history.undo());
        assert_eq!(history.current_index(), 0);
        assert!(Arc::ptr_eq(&history.viewed_dataset().unwrap(), &original));
        // Undo never touches the committed flag
        assert_eq!(history.committed().unwrap().version_number, 2);

        assert!(history.redo());
        assert!(Arc::ptr_eq(&history.viewed_dataset().unwrap(), &filtered));
    }

    #[test]
    fn test_boundary_moves_are_noops() {
        let mut history = VersionHistory::new();
        assert!(!history.undo());
        assert!(!history.redo());

        history.initialize(dataset(2));
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(history.current_index(), 0);
    }

    #[test]
    fn test_undo_redo_pair_keeps_dataset_reference() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();
        history.commit(dataset(3), "b").unwrap();
        history.undo();

        let before = history.viewed_dataset().unwrap();
        assert!(history.undo());
        assert!(history.redo());
        assert!(Arc::ptr_eq(&before, &history.viewed_dataset().unwrap()));
    }

    #[test]
    fn test_commit_truncates_future_and_never_reuses_numbers() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();
        history.commit(dataset(3), "b").unwrap();

        history.undo();
        history.undo();
        let number = history.commit(dataset(2), "c").unwrap();

        assert_eq!(number, 4);
        assert_eq!(numbers(&history), vec![1, 4]);
        assert_eq!(history.current_index(), 1);
        assert_eq!(history.versions().iter().filter(|v| v.is_current).count(), 1);
    }

    #[test]
    fn test_delete_original_is_rejected() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();

        assert_eq!(history.prepare_delete(1), Err(HistoryError::ProtectedVersion(1)));
        assert_eq!(history.prepare_delete(9), Err(HistoryError::UnknownVersion(9)));
        assert_eq!(numbers(&history), vec![1, 2]);
    }

    #[test]
    fn test_remove_local_keeps_numbers() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();
        history.commit(dataset(3), "b").unwrap();

        let pending = history.prepare_delete(2).unwrap();
        assert!(!pending.was_current);
        history.remove_local(&pending).unwrap();

        assert_eq!(numbers(&history), vec![1, 3]);
        assert_eq!(history.current_index(), 1);
        assert_eq!(history.viewed().unwrap().version_number, 3);
    }

    #[test]
    fn test_remove_local_current_moves_flag_back() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();

        let pending = history.prepare_delete(2).unwrap();
        assert!(pending.was_current);
        history.remove_local(&pending).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history.current_index(), 0);
        assert!(history.original().unwrap().is_current);
    }

    #[test]
    fn test_reconcile_maps_current_flag() {
        let mut history = VersionHistory::new();
        history
            .reconcile(vec![entry(1, 5, false), entry(3, 2, true), entry(4, 1, false)], None)
            .unwrap();

        assert_eq!(numbers(&history), vec![1, 3, 4]);
        assert_eq!(history.current_index(), 1);
        assert_eq!(history.committed().unwrap().version_number, 3);
    }

    #[test]
    fn test_reconcile_synthesizes_original() {
        let mut history = VersionHistory::new();
        let original = dataset(7);
        history
            .reconcile(vec![entry(2, 3, true)], Some(Arc::clone(&original)))
            .unwrap();

        assert_eq!(numbers(&history), vec![1, 2]);
        let first = history.original().unwrap();
        assert_eq!(first.description, INITIAL_DESCRIPTION);
        assert!(Arc::ptr_eq(&first.dataset, &original));
        assert!(!first.is_current);
        assert_eq!(history.current_index(), 1);
    }

    #[test]
    fn test_reconcile_without_original_leaves_history_alone() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));

        let result = history.reconcile(vec![entry(2, 3, true)], None);
        assert_eq!(result, Err(HistoryError::MissingOriginal));
        assert_eq!(numbers(&history), vec![1]);
    }

    #[test]
    fn test_reconcile_defaults_to_newest_when_nothing_current() {
        let mut history = VersionHistory::new();
        history
            .reconcile(vec![entry(1, 5, false), entry(2, 4, false)], None)
            .unwrap();
        assert_eq!(history.current_index(), 1);
        assert!(history.versions()[1].is_current);
    }

    #[test]
    fn test_commit_after_reconcile_continues_numbering() {
        let mut history = VersionHistory::new();
        history
            .reconcile(vec![entry(1, 5, false), entry(6, 4, true)], None)
            .unwrap();
        assert_eq!(history.commit(dataset(1), "next").unwrap(), 7);
    }

    #[test]
    fn test_commit_as_adopts_server_number() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();

        assert_eq!(history.commit_as(9, dataset(3), "b").unwrap(), 9);
        assert_eq!(numbers(&history), vec![1, 2, 9]);
        assert_eq!(history.commit(dataset(2), "c").unwrap(), 10);
    }

    #[test]
    fn test_commit_as_rejects_number_not_above_kept() {
        let mut history = VersionHistory::new();
        history.initialize(dataset(5));
        history.commit(dataset(4), "a").unwrap();
        history.commit(dataset(3), "b").unwrap();
        history.undo();

        // Version 3 is about to be discarded, so 3 is acceptable; 2 is not
        assert_eq!(
            history.commit_as(2, dataset(1), "c"),
            Err(HistoryError::OutOfOrderVersion {
                version: 2,
                newest: 2
            })
        );
        assert_eq!(numbers(&history), vec![1, 2, 3]);
        assert_eq!(history.commit_as(3, dataset(1), "c").unwrap(), 3);
        assert_eq!(numbers(&history), vec![1, 2, 3]);
    }
}
