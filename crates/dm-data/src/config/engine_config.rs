//! Tunables for profiling, statistics and paging

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::null_handling::NullConfig;
use crate::schema::ColumnKind;
use crate::DataError;

/// Default rows per page shown in the table
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Rows visited per statistics batch
pub const DEFAULT_STATS_BATCH_SIZE: usize = 1000;

/// Largest value count for which the median is computed exactly
pub const DEFAULT_MEDIAN_EXACT_THRESHOLD: usize = 10_000;

/// Engine configuration, usually loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_page_size: usize,
    pub stats_batch_size: usize,
    pub median_exact_threshold: usize,
    pub null_config: NullConfig,
    /// Column kind overrides; these win over inference
    pub column_kinds: HashMap<String, ColumnKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            stats_batch_size: DEFAULT_STATS_BATCH_SIZE,
            median_exact_threshold: DEFAULT_MEDIAN_EXACT_THRESHOLD,
            null_config: NullConfig::default(),
            column_kinds: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject settings that would make paging or batching meaningless
    pub fn validate(&self) -> Result<(), DataError> {
        if self.default_page_size == 0 {
            return Err(DataError::Config("default_page_size must be at least 1".into()));
        }
        if self.stats_batch_size == 0 {
            return Err(DataError::Config("stats_batch_size must be at least 1".into()));
        }
        if self.median_exact_threshold == 0 {
            return Err(DataError::Config("median_exact_threshold must be at least 1".into()));
        }
        Ok(())
    }

    /// Override the inferred kind of one column
    pub fn with_column_kind(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
        self.column_kinds.insert(column.into(), kind);
        self
    }
}
