//! Core abstractions for the tabular data engine
//!
//! This crate provides the row/dataset model, the contract of the remote
//! storage service, the version history state machine and the event bus.

pub mod dataset;
pub mod events;
pub mod history;
pub mod storage;

// Re-export commonly used types
pub use dataset::{row, Dataset, Row, SharedDataset, Value};
pub use events::EventBus;
pub use history::{HistoryError, HistoryState, PendingDelete, Version, VersionHistory};
pub use storage::{
    DatasetResponse, FileId, FilterResponse, HistoryEntry, PagedResponse, Pagination,
    RemoteError, RemoteResult, StorageClient,
};
