//! Row and dataset model shared by every engine component

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single cell value as delivered by the storage service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Interpret the value as a finite number.
    ///
    /// Text cells are trimmed and parsed, so `" 42 "` is numeric while
    /// `"NaN"` and `"inf"` are not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Display form used for searching, grouping and string comparison
    pub fn display_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// One record, keyed by column name in column order
pub type Row = IndexMap<String, Value>;

/// Datasets are shared between versions, views and pages without copying
pub type SharedDataset = Arc<Dataset>;

/// An ordered, rectangular sequence of rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset; the column list is taken from the first row
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    /// Build a dataset with an explicit column list (useful for empty results)
    pub fn with_columns(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Value of `column` in every row, `Null` where the row lacks the key
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        static NULL: Value = Value::Null;
        self.rows.iter().map(move |row| row.get(column).unwrap_or(&NULL))
    }

    /// Same columns, a different row selection
    pub fn derive(&self, rows: Vec<Row>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn into_shared(self) -> SharedDataset {
        Arc::new(self)
    }
}

impl From<Vec<Row>> for Dataset {
    fn from(rows: Vec<Row>) -> Self {
        Dataset::from_rows(rows)
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<K, V, I>(cells: I) -> Row
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display_drops_integer_fraction() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_text_numbers_parse() {
        assert_eq!(Value::from(" 3.5 ").as_number(), Some(3.5));
        assert_eq!(Value::from("NaN").as_number(), None);
        assert_eq!(Value::from("inf").as_number(), None);
        assert_eq!(Value::from("abc").as_number(), None);
    }

    #[test]
    fn test_columns_follow_first_row() {
        let dataset = Dataset::from_rows(vec![
            row([("name", Value::from("a")), ("age", Value::from(3i64))]),
            row([("name", Value::from("b")), ("age", Value::from(4i64))]),
        ]);
        assert_eq!(dataset.columns(), &["name".to_string(), "age".to_string()]);
        assert_eq!(dataset.column_values("age").count(), 2);
    }

    #[test]
    fn test_rows_deserialize_from_json() {
        let rows: Vec<Row> =
            serde_json::from_str(r#"[{"name": "x", "age": 31, "joined": null}]"#).unwrap();
        assert_eq!(rows[0]["name"], Value::Text("x".into()));
        assert_eq!(rows[0]["age"], Value::Number(31.0));
        assert!(rows[0]["joined"].is_null());
    }
}
