//! View-level text search over rows

use std::sync::Arc;

use dm_core::{Dataset, Row, SharedDataset};

/// Case-insensitive substring search across every column
#[derive(Debug, Clone, Default)]
pub struct SearchFilter;

impl SearchFilter {
    pub fn new() -> Self {
        Self
    }

    /// Rows where any cell contains `query`. An empty query keeps everything
    /// and returns the same shared dataset.
    pub fn filter(&self, dataset: &SharedDataset, query: &str) -> SharedDataset {
        if query.is_empty() {
            return Arc::clone(dataset);
        }

        let needle = query.to_lowercase();
        let rows = dataset
            .rows()
            .iter()
            .filter(|row| row_contains(row, &needle))
            .cloned()
            .collect();
        Arc::new(dataset.derive(rows))
    }

    /// Whether a single row matches
    pub fn matches(&self, row: &Row, query: &str) -> bool {
        query.is_empty() || row_contains(row, &query.to_lowercase())
    }

    /// Filter a borrowed dataset into an owned one
    pub fn filter_rows(&self, dataset: &Dataset, query: &str) -> Dataset {
        let needle = query.to_lowercase();
        dataset.derive(
            dataset
                .rows()
                .iter()
                .filter(|row| query.is_empty() || row_contains(row, &needle))
                .cloned()
                .collect(),
        )
    }
}

fn row_contains(row: &Row, needle: &str) -> bool {
    row.values()
        .any(|value| value.display_string().to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_core::{row, Value};

    fn cities() -> SharedDataset {
        Arc::new(Dataset::from_rows(vec![
            row([("city", Value::from("Oslo")), ("pop", Value::from(709_000i64))]),
            row([("city", Value::from("Lisbon")), ("pop", Value::from(545_000i64))]),
            row([("city", Value::from("Los Angeles")), ("pop", Value::from(3_899_000i64))]),
        ]))
    }

    #[test]
    fn test_empty_query_is_identity() {
        let data = cities();
        assert!(Arc::ptr_eq(&SearchFilter::new().filter(&data, ""), &data));
    }

    #[test]
    fn test_case_insensitive_match() {
        let data = cities();
        let result = SearchFilter::new().filter(&data, "LOS");
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0]["city"], Value::from("Los Angeles"));
    }

    #[test]
    fn test_numbers_match_display_form() {
        let data = cities();
        let result = SearchFilter::new().filter(&data, "545");
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_idempotent_and_shrinking() {
        let data = cities();
        let search = SearchFilter::new();
        for query in ["o", "s", "xyz", "00"] {
            let once = search.filter(&data, query);
            let twice = search.filter(&once, query);
            assert!(once.len() <= data.len());
            assert_eq!(*once, *twice);
        }
    }

    #[test]
    fn test_matches_single_row() {
        let data = cities();
        let search = SearchFilter::new();
        assert!(search.matches(&data.rows()[0], "slo"));
        assert!(!search.matches(&data.rows()[0], "lisbon"));
        assert!(search.matches(&data.rows()[0], ""));
        assert_eq!(search.filter_rows(&data, "l").len(), 3);
    }
}
