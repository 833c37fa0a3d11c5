//! Descriptive statistics over the visible row window
//!
//! Rows are visited in fixed-size batches so memory stays bounded however
//! large the scope is. Two passes are made over numeric columns: the first
//! accumulates sum, count, extrema and value frequencies, the second
//! computes the standard deviation around the now-known mean and collects
//! the values the median is taken from. Above the exact threshold only an
//! evenly strided sample of values is kept for the median.

use std::fmt;

use dm_core::{Row, Value};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::{
    EngineConfig, NullConfig, DEFAULT_MEDIAN_EXACT_THRESHOLD, DEFAULT_STATS_BATCH_SIZE,
};
use crate::schema::{ColumnKind, ProfileSet};

/// Which rows the statistics were computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsScope {
    /// Size of the dataset the scope was cut from, when that is a
    /// server-paged view bigger than the scope itself
    pub total_rows: Option<usize>,
}

impl StatsScope {
    /// The rows handed in are the whole dataset
    pub fn complete() -> Self {
        Self { total_rows: None }
    }

    /// The rows handed in are one server page out of `total_rows`
    pub fn server_page(total_rows: usize) -> Self {
        Self {
            total_rows: Some(total_rows),
        }
    }
}

/// Explains why statistics may not describe the full dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleNote {
    /// `(sample size, population)` when the median came from a strided sample
    pub median_sample: Option<(usize, usize)>,
    /// `(scope rows, total rows)` when only one server page was inspected
    pub page_scope: Option<(usize, usize)>,
}

impl fmt::Display for SampleNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some((sample, population)) = self.median_sample {
            parts.push(format!(
                "median estimated from {} of {} values",
                sample, population
            ));
        }
        if let Some((scope, total)) = self.page_scope {
            parts.push(format!("computed over {} of {} rows", scope, total));
        }
        f.write_str(&parts.join("; "))
    }
}

/// Statistics of one column; `None` means "not applicable"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub column: String,
    pub kind: ColumnKind,
    /// Non-empty values in scope
    pub count: usize,
    pub null_count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub range: Option<f64>,
    pub mode: Option<String>,
    pub unique_count: Option<usize>,
    pub sample_note: Option<SampleNote>,
}

impl ColumnStatistics {
    fn not_applicable(column: &str, kind: ColumnKind, null_count: usize) -> Self {
        Self {
            column: column.to_string(),
            kind,
            count: 0,
            null_count,
            min: None,
            max: None,
            mean: None,
            median: None,
            std_dev: None,
            range: None,
            mode: None,
            unique_count: None,
            sample_note: None,
        }
    }

    /// The median came from a subsample rather than every value
    pub fn is_median_approximate(&self) -> bool {
        self.sample_note
            .as_ref()
            .map(|note| note.median_sample.is_some())
            .unwrap_or(false)
    }
}

/// Overview of a whole dataset: record count, columns per kind and
/// per-column statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub numeric_columns: usize,
    pub temporal_columns: usize,
    pub categorical_columns: usize,
    /// Distinct non-empty values per column, in column order
    pub unique_values: IndexMap<String, usize>,
    pub columns: Vec<ColumnStatistics>,
}

impl DatasetSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.iter().find(|stats| stats.column == name)
    }
}

/// First-pass accumulator
struct Accumulator {
    non_empty: usize,
    null_count: usize,
    numeric_count: usize,
    sum: f64,
    min: f64,
    max: f64,
    /// Display form -> occurrences, in first-seen order
    frequencies: IndexMap<String, usize>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            non_empty: 0,
            null_count: 0,
            numeric_count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            frequencies: IndexMap::new(),
        }
    }

    fn add_number(&mut self, n: f64) {
        self.numeric_count += 1;
        self.sum += n;
        self.min = self.min.min(n);
        self.max = self.max.max(n);
    }

    fn add_occurrence(&mut self, value: &Value) {
        let key = value.display_string().trim().to_string();
        *self.frequencies.entry(key).or_insert(0) += 1;
    }

    /// Highest count wins; on ties the first value seen wins
    fn mode(&self) -> Option<String> {
        let mut best: Option<(&String, usize)> = None;
        for (value, &count) in &self.frequencies {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((value, count)),
            }
        }
        best.map(|(value, _)| value.clone())
    }
}

/// Computes per-column statistics in bounded memory
#[derive(Debug, Clone)]
pub struct StatisticsEngine {
    batch_size: usize,
    median_exact_threshold: usize,
    null_config: NullConfig,
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_STATS_BATCH_SIZE,
            median_exact_threshold: DEFAULT_MEDIAN_EXACT_THRESHOLD,
            null_config: NullConfig::default(),
        }
    }
}

impl StatisticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.stats_batch_size.max(1),
            median_exact_threshold: config.median_exact_threshold.max(1),
            null_config: config.null_config.clone(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_median_threshold(mut self, threshold: usize) -> Self {
        self.median_exact_threshold = threshold.max(1);
        self
    }

    /// Statistics for every profiled column of a scope
    pub fn compute_all(
        &self,
        rows: &[Row],
        profiles: &ProfileSet,
        scope: StatsScope,
    ) -> Vec<ColumnStatistics> {
        profiles
            .iter()
            .map(|profile| self.compute(rows, &profile.name, profile.kind, scope))
            .collect()
    }

    /// Dataset-level summary built on top of [`Self::compute_all`]
    pub fn summarize(&self, rows: &[Row], profiles: &ProfileSet) -> DatasetSummary {
        let columns = self.compute_all(rows, profiles, StatsScope::complete());
        let count_kind = |kind: ColumnKind| columns.iter().filter(|c| c.kind == kind).count();

        DatasetSummary {
            total_records: rows.len(),
            numeric_columns: count_kind(ColumnKind::Numeric),
            temporal_columns: count_kind(ColumnKind::Temporal),
            categorical_columns: count_kind(ColumnKind::Categorical),
            unique_values: columns
                .iter()
                .map(|c| (c.column.clone(), c.unique_count.unwrap_or(0)))
                .collect(),
            columns,
        }
    }

    /// Statistics for one column of a scope
    pub fn compute(
        &self,
        rows: &[Row],
        column: &str,
        kind: ColumnKind,
        scope: StatsScope,
    ) -> ColumnStatistics {
        let numeric = kind == ColumnKind::Numeric;
        let acc = self.first_pass(rows, column, numeric);

        if acc.non_empty == 0 {
            return ColumnStatistics::not_applicable(column, kind, acc.null_count);
        }

        let mut stats = ColumnStatistics::not_applicable(column, kind, acc.null_count);
        stats.count = acc.non_empty;
        stats.unique_count = Some(acc.frequencies.len());
        stats.mode = acc.mode();

        let mut note = SampleNote {
            median_sample: None,
            page_scope: scope
                .total_rows
                .filter(|&total| total > rows.len())
                .map(|total| (rows.len(), total)),
        };

        if numeric && acc.numeric_count > 0 {
            let mean = acc.sum / acc.numeric_count as f64;
            let stride = self.median_stride(acc.numeric_count);
            let (variance_sum, mut sample) = self.second_pass(rows, column, mean, stride);

            stats.min = Some(acc.min);
            stats.max = Some(acc.max);
            stats.range = Some(acc.max - acc.min);
            stats.mean = Some(mean);
            stats.std_dev = Some((variance_sum / acc.numeric_count as f64).sqrt());
            stats.median = median(&mut sample);

            if acc.numeric_count > self.median_exact_threshold {
                note.median_sample = Some((sample.len(), acc.numeric_count));
            }
        }

        if note.median_sample.is_some() || note.page_scope.is_some() {
            stats.sample_note = Some(note);
        }
        stats
    }

    fn first_pass(&self, rows: &[Row], column: &str, numeric: bool) -> Accumulator {
        let mut acc = Accumulator::new();
        let mut batches = 0usize;

        for batch in rows.chunks(self.batch_size) {
            batches += 1;
            for row in batch {
                let value = row.get(column).unwrap_or(&Value::Null);
                if self.null_config.is_empty(value) {
                    acc.null_count += 1;
                    continue;
                }

                acc.non_empty += 1;
                acc.add_occurrence(value);
                if numeric {
                    if let Some(n) = value.as_number() {
                        acc.add_number(n);
                    }
                }
            }
        }

        debug!(
            "Statistics pass over '{}': {} rows in {} batch(es)",
            column,
            rows.len(),
            batches
        );
        acc
    }

    /// Sum of squared deviations plus every `stride`-th numeric value
    fn second_pass(&self, rows: &[Row], column: &str, mean: f64, stride: usize) -> (f64, Vec<f64>) {
        let mut variance_sum = 0.0;
        let mut sample = Vec::new();
        let mut seen = 0usize;

        for batch in rows.chunks(self.batch_size) {
            for row in batch {
                let value = row.get(column).unwrap_or(&Value::Null);
                if self.null_config.is_empty(value) {
                    continue;
                }
                if let Some(n) = value.as_number() {
                    variance_sum += (n - mean).powi(2);
                    if seen % stride == 0 {
                        sample.push(n);
                    }
                    seen += 1;
                }
            }
        }
        (variance_sum, sample)
    }

    fn median_stride(&self, count: usize) -> usize {
        if count <= self.median_exact_threshold {
            1
        } else {
            (count / self.median_exact_threshold).max(1)
        }
    }
}

/// Textbook median: middle value, or mean of the two middle values
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[middle - 1] + values[middle]) / 2.0)
    } else {
        Some(values[middle])
    }
}
