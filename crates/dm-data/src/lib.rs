//! Profiling, statistics, ordering, search and paging for the tabular engine

pub mod config;
pub mod pagination;
pub mod schema;
pub mod search;
pub mod sort;
pub mod sources;
pub mod stats;

use dm_core::RemoteError;
use thiserror::Error;

// Re-exports
pub use config::{EngineConfig, NullConfig};
pub use pagination::{Page, PageFetch, PageOrigin, PageSource, PageState, Paginator};
pub use schema::{ColumnKind, ColumnProfile, ColumnProfiler, ProfileSet};
pub use search::SearchFilter;
pub use sort::{SortDirection, SortEngine, SortState};
pub use sources::{load_csv, InMemoryStore};
pub use stats::{ColumnStatistics, DatasetSummary, SampleNote, StatisticsEngine, StatsScope};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column '{0}' is not uniformly numeric or temporal and cannot be sorted")]
    UnsortableColumn(String),

    #[error("Page {page} is out of range (1..={total_pages})")]
    PageOutOfRange { page: usize, total_pages: usize },

    #[error("Page size must be at least 1")]
    InvalidPageSize,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl DataError {
    /// Rejected locally, before any remote round-trip
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DataError::UnknownColumn(_)
                | DataError::UnsortableColumn(_)
                | DataError::PageOutOfRange { .. }
                | DataError::InvalidPageSize
                | DataError::Config(_)
        )
    }
}
