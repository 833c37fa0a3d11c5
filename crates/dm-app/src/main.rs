//! Command-line walk-through of the tabular data engine
//!
//! Loads a CSV file (or a generated sample), stores it in an in-process
//! storage service and drives the engine through filters, history
//! navigation, sorting, search, paging and statistics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dm_core::events::events::{
    DatasetActivated, HistoryReconciled, OperationFailed, PageLoaded, VersionCommitted,
    VersionDeleted,
};
use dm_core::{row, Dataset, Value};
use dm_data::{load_csv, EngineConfig, InMemoryStore};
use dm_engine::TabularDataEngine;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SAMPLE_ROWS: usize = 1237;
const SAMPLE_CITIES: [&str; 4] = ["Oslo", "Lima", "Pune", "Accra"];

#[derive(Debug, Default)]
struct Args {
    csv: Option<PathBuf>,
    config: Option<PathBuf>,
    filters: Vec<String>,
    search: Option<String>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    args.config = Some(iter.next().context("--config needs a path")?.into())
                }
                "--filter" => args.filters.push(iter.next().context("--filter needs a query")?),
                "--search" => args.search = Some(iter.next().context("--search needs a term")?),
                flag if flag.starts_with("--") => bail!("Unknown option {}", flag),
                _ if args.csv.is_none() => args.csv = Some(arg.into()),
                _ => bail!("Unexpected argument {}", arg),
            }
        }
        Ok(args)
    }
}

fn sample_dataset() -> Dataset {
    Dataset::from_rows(
        (0..SAMPLE_ROWS)
            .map(|i| {
                row([
                    ("id", Value::from(i as i64)),
                    ("age", Value::from(18 + (i as i64 * 37) % 60)),
                    ("city", Value::from(SAMPLE_CITIES[i % SAMPLE_CITIES.len()])),
                    (
                        "joined",
                        Value::from(format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1)),
                    ),
                ])
            })
            .collect(),
    )
}

fn log_events(engine: &TabularDataEngine) {
    let events = engine.events();
    events.subscribe_fn::<DatasetActivated, _>(|e| {
        info!(
            "Viewing version {}: {} rows, {} columns",
            e.version_number, e.row_count, e.column_count
        )
    });
    events.subscribe_fn::<VersionCommitted, _>(|e| {
        info!("Version {} committed: {} ({} rows)", e.version_number, e.description, e.row_count)
    });
    events.subscribe_fn::<VersionDeleted, _>(|e| info!("Version {} deleted", e.version_number));
    events.subscribe_fn::<HistoryReconciled, _>(|e| {
        info!(
            "History holds {} versions, viewing {}",
            e.version_count, e.viewed_version
        )
    });
    events.subscribe_fn::<PageLoaded, _>(|e| {
        info!(
            "Page {}/{} loaded with {} rows{}",
            e.page_index,
            e.total_pages,
            e.row_count,
            if e.fallback { " (local fallback)" } else { "" }
        )
    });
    events.subscribe_fn::<OperationFailed, _>(|e| warn!("{} failed: {}", e.operation, e.error));
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse()?;
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let dataset = match &args.csv {
        Some(path) => load_csv(path.clone())
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            info!("No CSV given, generating {} sample rows", SAMPLE_ROWS);
            sample_dataset()
        }
    };

    let store = Arc::new(InMemoryStore::new());
    let file = store.upload(dataset);
    let engine = TabularDataEngine::new(store, config)?;
    log_events(&engine);

    engine.open_file(file).await?;
    for profile in engine.profiles().iter() {
        info!("Column '{}' is {:?}", profile.name, profile.kind);
    }

    let filters = if args.filters.is_empty() && args.csv.is_none() {
        vec!["age > 30".to_string(), "city = Oslo".to_string()]
    } else {
        args.filters.clone()
    };
    for query in &filters {
        if let Err(err) = engine.apply_filter(query).await {
            warn!("Filter '{}' was not applied ({:?}): {}", query, err.kind(), err);
        }
    }

    let summary = engine.summary();
    info!(
        "{} records: {} numeric, {} temporal, {} categorical columns",
        summary.total_records,
        summary.numeric_columns,
        summary.temporal_columns,
        summary.categorical_columns
    );

    engine.page(1).await?;
    println!("{}", serde_json::to_string_pretty(&engine.statistics_all())?);

    if engine.undo() {
        info!("Stepped back; redo available: {}", engine.snapshot().can_redo);
        engine.redo();
    }

    let sortable = engine
        .profiles()
        .iter()
        .find(|p| p.kind.is_sortable())
        .map(|p| p.name.clone());
    if let Some(column) = sortable {
        let state = engine.sort_by(&column)?;
        info!("Sorted '{}' {:?}", column, state.direction);
        engine.page(1).await?;
    }

    if let Some(term) = &args.search {
        let matches = engine.search(term)?;
        info!("Search '{}' matched {} rows", term, matches);
    }

    let history = engine.history();
    if let Some(latest) = history.versions().last().filter(|v| !v.is_original()) {
        engine.delete_version(latest.version_number).await?;
    }

    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    Ok(())
}
