//! Version history of a file's datasets
//!
//! Versions form a linear, truncating sequence. The viewing pointer
//! (`current_index`) moves locally on undo/redo, while the `is_current`
//! flag mirrors what the storage service has committed.

use serde::Serialize;
use thiserror::Error;

mod engine;
mod version;

pub use engine::VersionHistory;
pub use version::{PendingDelete, Version, INITIAL_DESCRIPTION};

/// Lifecycle of a history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HistoryState {
    /// Nothing uploaded yet
    Empty,
    /// At least the initial upload is present
    Active,
}

/// Errors raised by history transitions.
///
/// A transition that returns one of these has not modified the history.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("no dataset has been uploaded yet")]
    Empty,

    #[error("version {0} is the original upload and cannot be deleted")]
    ProtectedVersion(u32),

    #[error("version {0} does not exist")]
    UnknownVersion(u32),

    #[error(
        "server history does not start at the original upload and no original snapshot is available"
    )]
    MissingOriginal,

    #[error("server history lists version {0} more than once")]
    DuplicateVersion(u32),

    #[error("version {version} is not newer than version {newest}")]
    OutOfOrderVersion { version: u32, newest: u32 },
}
