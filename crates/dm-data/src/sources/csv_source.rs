//! Reading uploads from CSV files

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use dm_core::{Dataset, Row, Value};
use tracing::info;

use crate::DataError;

/// Load a CSV file with a header row into a dataset
pub async fn load_csv(path: impl Into<PathBuf>) -> Result<Dataset, DataError> {
    let path = path.into();
    tokio::task::spawn_blocking(move || read_csv_file(&path))
        .await
        .map_err(|e| DataError::Io(std::io::Error::other(e.to_string())))?
}

pub fn read_csv_file(path: &Path) -> Result<Dataset, DataError> {
    let file = File::open(path)?;
    let dataset = read_csv(BufReader::new(file))?;
    info!(
        "Loaded {} rows x {} columns from {}",
        dataset.len(),
        dataset.columns().len(),
        path.display()
    );
    Ok(dataset)
}

/// Parse CSV text; every record becomes one row keyed by the header names
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset, DataError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), parse_cell(record.get(idx).unwrap_or(""))))
            .collect();
        rows.push(row);
    }

    Ok(Dataset::with_columns(headers, rows))
}

/// Numbers and booleans become typed cells, blanks become null
fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match trimmed {
        "true" | "TRUE" | "True" => return Value::Bool(true),
        "false" | "FALSE" | "False" => return Value::Bool(false),
        _ => {}
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::Text(raw.to_string()),
    }
}
