use serde::Serialize;

use crate::dataset::SharedDataset;

/// Description given to version 1
pub const INITIAL_DESCRIPTION: &str = "Initial data upload";

/// One committed dataset snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Version {
    pub version_number: u32,
    #[serde(skip)]
    pub dataset: SharedDataset,
    pub description: String,
    /// Whether the storage service considers this the committed version
    pub is_current: bool,
}

impl Version {
    pub fn new(
        version_number: u32,
        dataset: SharedDataset,
        description: impl Into<String>,
    ) -> Self {
        Self {
            version_number,
            dataset,
            description: description.into(),
            is_current: false,
        }
    }

    pub fn is_original(&self) -> bool {
        self.version_number == 1
    }

    pub fn row_count(&self) -> usize {
        self.dataset.len()
    }
}

/// A validated delete request, produced before any remote call is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDelete {
    pub version_number: u32,
    /// The deleted version was the server-committed one
    pub was_current: bool,
}
