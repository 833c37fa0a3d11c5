//! Column type inference

use std::collections::HashMap;

use dm_core::Dataset;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EngineConfig, NullConfig};

pub mod temporal;

pub use temporal::{parse_date, value_as_date};

/// Semantic type of a column, decided once per dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Every non-empty value is a finite number
    Numeric,
    /// Every non-empty value is a date
    Temporal,
    /// Anything else, including columns with a single stray cell
    Categorical,
}

impl ColumnKind {
    /// Only uniformly typed columns can be sorted
    pub fn is_sortable(self) -> bool {
        matches!(self, ColumnKind::Numeric | ColumnKind::Temporal)
    }
}

/// Inferred type of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
}

/// Profiles of every column of a dataset, in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileSet {
    profiles: Vec<ColumnProfile>,
}

impl ProfileSet {
    pub fn get(&self, column: &str) -> Option<&ColumnProfile> {
        self.profiles.iter().find(|p| p.name == column)
    }

    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.get(column).map(|p| p.kind)
    }

    pub fn is_sortable(&self, column: &str) -> bool {
        self.kind_of(column).map(ColumnKind::is_sortable).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.profiles.iter()
    }

    pub fn as_slice(&self) -> &[ColumnProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Classifies each column as numeric, temporal or categorical
#[derive(Debug, Clone, Default)]
pub struct ColumnProfiler {
    null_config: NullConfig,
    overrides: HashMap<String, ColumnKind>,
}

impl ColumnProfiler {
    /// Create a profiler with the default null handling
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a profiler from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            null_config: config.null_config.clone(),
            overrides: config.column_kinds.clone(),
        }
    }

    /// Set which values count as empty
    pub fn with_null_config(mut self, null_config: NullConfig) -> Self {
        self.null_config = null_config;
        self
    }

    /// Force the kind of a column regardless of its contents
    pub fn with_override(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
        self.overrides.insert(column.into(), kind);
        self
    }

    pub fn null_config(&self) -> &NullConfig {
        &self.null_config
    }

    /// Profile every column of a dataset
    pub fn profile(&self, dataset: &Dataset) -> ProfileSet {
        let profiles = dataset
            .columns()
            .iter()
            .map(|name| ColumnProfile {
                name: name.clone(),
                kind: self
                    .overrides
                    .get(name)
                    .copied()
                    .unwrap_or_else(|| self.infer_kind(dataset, name)),
            })
            .collect::<Vec<_>>();

        debug!(
            "Profiled {} columns over {} rows",
            profiles.len(),
            dataset.len()
        );
        ProfileSet { profiles }
    }

    /// Infer the kind of a single column
    pub fn infer_kind(&self, dataset: &Dataset, column: &str) -> ColumnKind {
        let mut non_empty = 0usize;
        let mut is_numeric = true;
        let mut is_temporal = true;

        for value in dataset.column_values(column) {
            if self.null_config.is_empty(value) {
                continue;
            }
            non_empty += 1;

            if is_numeric && value.as_number().is_none() {
                is_numeric = false;
            }
            if is_temporal && value_as_date(value).is_none() {
                is_temporal = false;
            }
            if !is_numeric && !is_temporal {
                break;
            }
        }

        if non_empty == 0 {
            ColumnKind::Categorical
        } else if is_numeric {
            ColumnKind::Numeric
        } else if is_temporal {
            ColumnKind::Temporal
        } else {
            ColumnKind::Categorical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_core::{row, Value};

    fn dataset(cells: &[(&str, Value)]) -> Dataset {
        let mut columns: Vec<String> = Vec::new();
        for (name, _) in cells {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
        let rows = cells
            .iter()
            .map(|(name, value)| row([(*name, value.clone())]))
            .collect();
        Dataset::with_columns(columns, rows)
    }

    #[test]
    fn test_numeric_with_blanks() {
        let data = dataset(&[
            ("age", Value::Number(31.0)),
            ("age", Value::from("42")),
            ("age", Value::from("")),
            ("age", Value::Null),
        ]);
        assert_eq!(ColumnProfiler::new().infer_kind(&data, "age"), ColumnKind::Numeric);
    }

    #[test]
    fn test_temporal() {
        let data = dataset(&[
            ("joined", Value::from("2024-01-01")),
            ("joined", Value::from("01/02/2024")),
            ("joined", Value::from("N/A")),
        ]);
        assert_eq!(ColumnProfiler::new().infer_kind(&data, "joined"), ColumnKind::Temporal);
    }

    #[test]
    fn test_number_then_date_is_categorical() {
        let data = dataset(&[("when", Value::from("5")), ("when", Value::from("2024-02-01"))]);
        assert_eq!(ColumnProfiler::new().infer_kind(&data, "when"), ColumnKind::Categorical);
    }

    #[test]
    fn test_single_bad_cell_makes_categorical() {
        let data = dataset(&[
            ("age", Value::Number(1.0)),
            ("age", Value::Number(2.0)),
            ("age", Value::from("two")),
        ]);
        let profiles = ColumnProfiler::new().profile(&data);
        assert_eq!(profiles.kind_of("age"), Some(ColumnKind::Categorical));
        assert!(!profiles.is_sortable("age"));
    }

    #[test]
    fn test_all_empty_is_categorical() {
        let data = dataset(&[("x", Value::Null), ("x", Value::from(" "))]);
        assert_eq!(ColumnProfiler::new().infer_kind(&data, "x"), ColumnKind::Categorical);
    }

    #[test]
    fn test_override_wins() {
        let data = dataset(&[("zip", Value::from("02139"))]);
        let profiles = ColumnProfiler::new()
            .with_override("zip", ColumnKind::Categorical)
            .profile(&data);
        assert_eq!(profiles.kind_of("zip"), Some(ColumnKind::Categorical));
    }

    #[test]
    fn test_strict_null_config_counts_placeholders() {
        let data = dataset(&[("n", Value::from("1")), ("n", Value::from("N/A"))]);
        let lenient = ColumnProfiler::new();
        let strict = ColumnProfiler::new().with_null_config(NullConfig::strict());
        assert_eq!(lenient.infer_kind(&data, "n"), ColumnKind::Numeric);
        assert_eq!(strict.infer_kind(&data, "n"), ColumnKind::Categorical);
    }
}
