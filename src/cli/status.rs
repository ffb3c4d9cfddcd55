//! CLI command reporting stored state per dataset

use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use super::{Cli, CliError, OutputFormat};
use crate::registry::DatasetRegistry;
use crate::resume::WatermarkResolver;
use crate::sources::RefreshMode;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Status subcommand
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Datasets to inspect; `*` wildcards allowed (default: all)
    datasets: Vec<String>,
}

/// Stored state of one dataset
#[derive(Debug, Serialize)]
pub struct DatasetStatus {
    /// Dataset name
    pub dataset: String,
    /// Table name
    pub table: String,
    /// Whether the table exists
    pub table_exists: bool,
    /// Stored rows
    pub row_count: u64,
    /// Largest stored date
    pub latest_date: Option<String>,
    /// Start date of the next incremental fetch, absent for full refreshes
    pub next_start: Option<String>,
}

impl StatusCommand {
    /// Print stored state for the selected datasets
    ///
    /// # Errors
    /// Fails like `ingest` would when a stored watermark is not a date.
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let sources = DatasetRegistry::builtin().resolve(self.datasets.as_slice())?;
        let store = Arc::new(SqliteStore::open(&cli.db)?);
        let resolver = WatermarkResolver::new(store.clone());

        let mut statuses = Vec::with_capacity(sources.len());
        for source in &sources {
            let descriptor = source.descriptor();
            let latest = resolver.latest(descriptor.table(), descriptor.date_column())?;
            let next_start = match descriptor.refresh() {
                RefreshMode::Incremental => Some(resolver.resolve(
                    descriptor.table(),
                    descriptor.date_column(),
                    descriptor.fallback_or(&cli.earliest_date),
                )?),
                RefreshMode::FullRefresh => None,
            };

            statuses.push(DatasetStatus {
                dataset: descriptor.name().to_string(),
                table: descriptor.table().to_string(),
                table_exists: store.table_exists(descriptor.table())?,
                row_count: store.row_count(descriptor.table())?,
                latest_date: latest,
                next_start,
            });
        }

        match cli.output_format {
            OutputFormat::Json => match serde_json::to_string_pretty(&statuses) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Failed to serialize status: {}", e),
            },
            OutputFormat::Human => {
                println!(
                    "{:<14} {:>10} {:<10} {:<10}",
                    "DATASET", "ROWS", "LATEST", "NEXT"
                );
                for status in &statuses {
                    println!(
                        "{:<14} {:>10} {:<10} {:<10}",
                        status.dataset,
                        if status.table_exists {
                            status.row_count.to_string()
                        } else {
                            "-".to_string()
                        },
                        status.latest_date.as_deref().unwrap_or("-"),
                        status.next_start.as_deref().unwrap_or("full")
                    );
                }
            }
        }

        Ok(())
    }
}
