//! Contract for the remote storage/transformation service
//!
//! The engine does not own a wire format. Each call below is an opaque
//! request/response pair keyed by file identifier; the DTOs only fix the
//! field names the service answers with.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{Dataset, Row};

/// Identifier of a persisted file on the storage service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failures reported by the storage collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The request never produced a usable answer
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a structured error
    #[error("{detail}")]
    Rejected { detail: String },
}

impl RemoteError {
    pub fn rejected(detail: impl Into<String>) -> Self {
        RemoteError::Rejected {
            detail: detail.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// `GET dataset(fileId)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetResponse {
    pub data: Vec<Row>,
}

/// One element of `GET history(fileId)`, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub data: Vec<Row>,
    pub description: String,
    pub is_current: bool,
    pub version: u32,
}

/// `POST filterApply(fileId, query)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResponse {
    pub data: Vec<Row>,
    pub description: String,
}

/// Server-side paging counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_records: usize,
    pub total_pages: usize,
}

/// `GET pagedData(fileId, page, pageSize)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResponse {
    pub data: Vec<Row>,
    pub pagination: Pagination,
}

impl DatasetResponse {
    pub fn into_dataset(self) -> Dataset {
        Dataset::from_rows(self.data)
    }
}

/// Trait for the storage service the engine synchronizes with
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Current contents of a file
    async fn dataset(&self, file_id: FileId) -> RemoteResult<DatasetResponse>;

    /// Contents of the original upload (version 1), even when history
    /// listings leave it out
    async fn original(&self, file_id: FileId) -> RemoteResult<DatasetResponse>;

    /// Every stored version of a file, oldest to newest
    async fn history(&self, file_id: FileId) -> RemoteResult<Vec<HistoryEntry>>;

    /// Remove one stored version
    async fn delete_version(&self, file_id: FileId, version: u32) -> RemoteResult<()>;

    /// Run a natural-language filter and persist its result as a new version
    async fn apply_filter(&self, file_id: FileId, query: &str) -> RemoteResult<FilterResponse>;

    /// One page of the current version
    async fn paged_data(
        &self,
        file_id: FileId,
        page: usize,
        page_size: usize,
    ) -> RemoteResult<PagedResponse>;
}
