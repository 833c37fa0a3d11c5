use dm_core::{HistoryError, RemoteError};
use dm_data::DataError;
use thiserror::Error;

/// Errors surfaced by the engine facade.
///
/// Whatever the variant, engine state is left as it was before the call.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("a filter is already being applied")]
    CommitInFlight,

    #[error("no dataset has been loaded")]
    NoDataset,

    #[error("the dataset is not stored on the server")]
    NoRemoteFile,

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Coarse classification used by the surrounding UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request failed in transit
    Transport,
    /// Rejected locally without a round-trip
    Validation,
    /// The service answered with a structured error
    RemoteRejection,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Remote(remote) | EngineError::Data(DataError::Remote(remote)) => {
                remote_kind(remote)
            }
            EngineError::Data(DataError::Io(_)) => ErrorKind::Transport,
            _ => ErrorKind::Validation,
        }
    }
}

fn remote_kind(error: &RemoteError) -> ErrorKind {
    match error {
        RemoteError::Transport(_) => ErrorKind::Transport,
        RemoteError::Rejected { .. } => ErrorKind::RemoteRejection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(EngineError::CommitInFlight.kind(), ErrorKind::Validation);
        assert_eq!(
            EngineError::from(HistoryError::ProtectedVersion(1)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::from(RemoteError::Transport("down".into())).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            EngineError::from(DataError::Remote(RemoteError::rejected("nope"))).kind(),
            ErrorKind::RemoteRejection
        );
    }

    #[test]
    fn test_rejection_detail_is_verbatim() {
        let error = EngineError::from(RemoteError::rejected("Column not found in table"));
        assert_eq!(error.to_string(), "Column not found in table");
    }
}
