//! Tri-state column sorting
//!
//! Clicking a column header cycles descending → ascending → unsorted.
//! Sorting always starts from the version's original row order, so the
//! third click simply hands that dataset back.

use std::cmp::Ordering;
use std::sync::Arc;

use dm_core::{Dataset, SharedDataset, Value};
use serde::Serialize;
use tracing::debug;

use crate::schema::{value_as_date, ProfileSet};
use crate::DataError;

/// Direction of the active sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SortDirection {
    Descending,
    Ascending,
    #[default]
    None,
}

/// Which column is sorted and how many times its header was clicked
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
    pub click_count: u8,
}

impl SortState {
    /// The state after one more click on `column`
    pub fn next(&self, column: &str) -> SortState {
        let clicks = if self.column.as_deref() == Some(column) {
            self.click_count % 3 + 1
        } else {
            1
        };

        let direction = match clicks {
            1 => SortDirection::Descending,
            2 => SortDirection::Ascending,
            _ => SortDirection::None,
        };

        SortState {
            column: if direction == SortDirection::None {
                None
            } else {
                Some(column.to_string())
            },
            direction,
            click_count: if direction == SortDirection::None { 0 } else { clicks },
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.direction != SortDirection::None
    }
}

/// Reorders rows by one column
#[derive(Debug, Clone, Default)]
pub struct SortEngine;

impl SortEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply one header click.
    ///
    /// `original` must be the version's unsorted dataset. Columns that are
    /// not uniformly numeric or temporal are rejected and the state is left
    /// as it was.
    pub fn toggle(
        &self,
        original: &SharedDataset,
        column: &str,
        state: &SortState,
        profiles: &ProfileSet,
    ) -> Result<(SharedDataset, SortState), DataError> {
        if !original.has_column(column) {
            return Err(DataError::UnknownColumn(column.to_string()));
        }
        if !profiles.is_sortable(column) {
            return Err(DataError::UnsortableColumn(column.to_string()));
        }

        let next = state.next(column);
        debug!("Sorting '{}' {:?}", column, next.direction);

        let sorted = match next.direction {
            SortDirection::None => Arc::clone(original),
            direction => Arc::new(self.sorted(original, column, direction)),
        };
        Ok((sorted, next))
    }

    /// A stably sorted copy of `dataset`
    pub fn sorted(&self, dataset: &Dataset, column: &str, direction: SortDirection) -> Dataset {
        let mut rows = dataset.rows().to_vec();
        if direction == SortDirection::None {
            return dataset.derive(rows);
        }

        rows.sort_by(|a, b| {
            let left = a.get(column).unwrap_or(&Value::Null);
            let right = b.get(column).unwrap_or(&Value::Null);
            // Blank cells trail in both directions
            match (is_blank(left), is_blank(right)) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ if direction == SortDirection::Descending => compare_values(right, left),
                _ => compare_values(left, right),
            }
        });
        dataset.derive(rows)
    }
}

/// Rank of the comparison a cell takes part in; lower ranks sort first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CellRank {
    Number,
    Date,
    Text,
    Blank,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn rank(value: &Value) -> CellRank {
    if value.as_number().is_some() {
        CellRank::Number
    } else if value_as_date(value).is_some() {
        CellRank::Date
    } else if is_blank(value) {
        CellRank::Blank
    } else {
        CellRank::Text
    }
}

/// Compare two cells, choosing the comparison per pair.
///
/// Numbers compare numerically, dates chronologically and anything else as
/// case-insensitive text. Cells of different ranks order by rank (numbers,
/// dates, text, blanks), which keeps the order total when a stray cell sits
/// in an otherwise numeric or temporal column.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (left, right) = (rank(a), rank(b));
    if left != right {
        return left.cmp(&right);
    }

    match left {
        CellRank::Number => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        CellRank::Date => value_as_date(a).cmp(&value_as_date(b)),
        CellRank::Text => a
            .display_string()
            .to_lowercase()
            .cmp(&b.display_string().to_lowercase()),
        CellRank::Blank => Ordering::Equal,
    }
}
