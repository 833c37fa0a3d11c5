//! In-process implementation of the storage service
//!
//! Keeps every version of every uploaded file in memory, the way the storage
//! service keeps one table per edit. Filters are run by a pluggable
//! interpreter closure standing in for the natural-language service.
//! Failures can be injected per operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use dm_core::{
    Dataset, DatasetResponse, FileId, FilterResponse, HistoryEntry, PagedResponse, Pagination,
    RemoteError, RemoteResult, SharedDataset, StorageClient, Value,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::pagination::slice_page;
use crate::sort::compare_values;

/// Turns a query into a filtered dataset plus a description of what it did
pub type FilterInterpreter =
    Arc<dyn Fn(&Dataset, &str) -> Result<(Dataset, String), String> + Send + Sync>;

/// Operations of the storage contract, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Dataset,
    Original,
    History,
    DeleteVersion,
    ApplyFilter,
    PagedData,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    version: u32,
    dataset: SharedDataset,
    description: String,
}

#[derive(Debug, Clone)]
struct StoredFile {
    versions: Vec<StoredVersion>,
    current_version: u32,
    next_version: u32,
}

impl StoredFile {
    fn current(&self) -> &StoredVersion {
        self.versions
            .iter()
            .find(|v| v.version == self.current_version)
            .unwrap_or(&self.versions[0])
    }
}

/// Storage service kept entirely in memory
pub struct InMemoryStore {
    files: RwLock<AHashMap<FileId, StoredFile>>,
    next_file: AtomicU64,
    interpreter: FilterInterpreter,
    failures: Mutex<AHashMap<StoreOperation, RemoteError>>,
    calls: Mutex<AHashMap<StoreOperation, usize>>,
    hide_original: RwLock<bool>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// A store using [`simple_interpreter`] for filters
    pub fn new() -> Self {
        Self::with_interpreter(Arc::new(simple_interpreter))
    }

    pub fn with_interpreter(interpreter: FilterInterpreter) -> Self {
        Self {
            files: RwLock::new(AHashMap::new()),
            next_file: AtomicU64::new(1),
            interpreter,
            failures: Mutex::new(AHashMap::new()),
            calls: Mutex::new(AHashMap::new()),
            hide_original: RwLock::new(false),
        }
    }

    /// Persist an upload as version 1 of a new file
    pub fn upload(&self, dataset: Dataset) -> FileId {
        let file_id = FileId(self.next_file.fetch_add(1, Ordering::SeqCst));
        let file = StoredFile {
            versions: vec![StoredVersion {
                version: 1,
                dataset: Arc::new(dataset),
                description: dm_core::history::INITIAL_DESCRIPTION.to_string(),
            }],
            current_version: 1,
            next_version: 2,
        };
        self.files.write().insert(file_id, file);
        info!("Stored file {}", file_id);
        file_id
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: StoreOperation, error: RemoteError) {
        self.failures.lock().insert(operation, error);
    }

    /// Leave version 1 out of history listings
    pub fn set_hide_original(&self, hide: bool) {
        *self.hide_original.write() = hide;
    }

    /// How many times `operation` has been called
    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Version numbers currently stored for a file
    pub fn stored_versions(&self, file_id: FileId) -> Vec<u32> {
        self.files
            .read()
            .get(&file_id)
            .map(|file| file.versions.iter().map(|v| v.version).collect())
            .unwrap_or_default()
    }

    fn enter(&self, operation: StoreOperation) -> RemoteResult<()> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        match self.failures.lock().remove(&operation) {
            Some(error) => {
                debug!("Injected failure for {:?}: {}", operation, error);
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn with_file<T>(&self, file_id: FileId, f: impl FnOnce(&StoredFile) -> T) -> RemoteResult<T> {
        self.files
            .read()
            .get(&file_id)
            .map(f)
            .ok_or_else(|| RemoteError::rejected("File not found"))
    }
}

#[async_trait]
impl StorageClient for InMemoryStore {
    async fn dataset(&self, file_id: FileId) -> RemoteResult<DatasetResponse> {
        self.enter(StoreOperation::Dataset)?;
        self.with_file(file_id, |file| DatasetResponse {
            data: file.current().dataset.rows().to_vec(),
        })
    }

    async fn original(&self, file_id: FileId) -> RemoteResult<DatasetResponse> {
        self.enter(StoreOperation::Original)?;
        self.with_file(file_id, |file| DatasetResponse {
            data: file.versions[0].dataset.rows().to_vec(),
        })
    }

    async fn history(&self, file_id: FileId) -> RemoteResult<Vec<HistoryEntry>> {
        self.enter(StoreOperation::History)?;
        let hide_original = *self.hide_original.read();
        self.with_file(file_id, |file| {
            file.versions
                .iter()
                .filter(|v| !(hide_original && v.version == 1))
                .map(|v| HistoryEntry {
                    data: v.dataset.rows().to_vec(),
                    description: v.description.clone(),
                    is_current: v.version == file.current_version,
                    version: v.version,
                })
                .collect()
        })
    }

    async fn delete_version(&self, file_id: FileId, version: u32) -> RemoteResult<()> {
        self.enter(StoreOperation::DeleteVersion)?;
        let mut files = self.files.write();
        let file = files
            .get_mut(&file_id)
            .ok_or_else(|| RemoteError::rejected("File not found"))?;

        if version == 1 {
            return Err(RemoteError::rejected("Cannot delete the original version"));
        }
        let index = file
            .versions
            .iter()
            .position(|v| v.version == version)
            .ok_or_else(|| RemoteError::rejected(format!("Version {} not found", version)))?;

        file.versions.remove(index);
        if file.current_version == version {
            file.current_version = file.versions[index - 1].version;
        }
        info!("Deleted version {} of file {}", version, file_id);
        Ok(())
    }

    async fn apply_filter(&self, file_id: FileId, query: &str) -> RemoteResult<FilterResponse> {
        self.enter(StoreOperation::ApplyFilter)?;
        let source = self.with_file(file_id, |file| Arc::clone(&file.current().dataset))?;

        let (filtered, description) =
            (self.interpreter)(&source, query).map_err(RemoteError::rejected)?;
        let data = filtered.rows().to_vec();

        let mut files = self.files.write();
        let file = files
            .get_mut(&file_id)
            .ok_or_else(|| RemoteError::rejected("File not found"))?;
        let version = file.next_version;
        file.next_version += 1;
        file.versions.push(StoredVersion {
            version,
            dataset: Arc::new(filtered),
            description: description.clone(),
        });
        file.current_version = version;
        info!("File {} now at version {} ({})", file_id, version, description);

        Ok(FilterResponse { data, description })
    }

    async fn paged_data(
        &self,
        file_id: FileId,
        page: usize,
        page_size: usize,
    ) -> RemoteResult<PagedResponse> {
        self.enter(StoreOperation::PagedData)?;
        let dataset = self.with_file(file_id, |file| Arc::clone(&file.current().dataset))?;
        let page = slice_page(&dataset, page, page_size)
            .map_err(|err| RemoteError::rejected(err.to_string()))?;

        Ok(PagedResponse {
            data: page.rows,
            pagination: Pagination {
                total_records: page.state.total_rows,
                total_pages: page.state.total_pages,
            },
        })
    }
}

const OPERATORS: &[&str] = &[">=", "<=", "!=", "=", ">", "<", " contains "];

/// Understands `<column> <op> <value>` with `op` one of
/// `> < >= <= = != contains`, comparing cells the way sorting does
pub fn simple_interpreter(dataset: &Dataset, query: &str) -> Result<(Dataset, String), String> {
    let (column, operator, operand) = OPERATORS
        .iter()
        .find_map(|op| {
            query
                .find(op)
                .map(|at| (query[..at].trim(), op.trim(), query[at + op.len()..].trim()))
        })
        .ok_or_else(|| format!("Could not understand the query '{}'", query))?;

    if !dataset.has_column(column) {
        return Err(format!(
            "Column not found in table. Available columns: {:?}",
            dataset.columns()
        ));
    }

    let operand = Value::from(operand.trim_matches(|c| c == '"' || c == '\''));
    let rows = dataset
        .rows()
        .iter()
        .filter(|row| {
            let cell = row.get(column).unwrap_or(&Value::Null);
            let ordering = compare_values(cell, &operand);
            match operator {
                ">=" => ordering.is_ge(),
                "<=" => ordering.is_le(),
                "!=" => ordering.is_ne(),
                "=" => ordering.is_eq(),
                ">" => ordering.is_gt(),
                "<" => ordering.is_lt(),
                _ => cell
                    .display_string()
                    .to_lowercase()
                    .contains(&operand.display_string().to_lowercase()),
            }
        })
        .cloned()
        .collect();

    let description = format!("Filter rows where {} {} {}", column, operator, operand);
    Ok((dataset.derive(rows), description))
}
