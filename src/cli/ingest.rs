//! Ingest command implementation

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::CliError;
use crate::ingest::config::{
    validate_date, DEFAULT_DB_PATH, DEFAULT_SNAPSHOT_DIR, EARLIEST_DATE,
};
use crate::ingest::{CycleReport, CycleStatus, IngestConfig, IngestExecutor, RetryPolicy};
use crate::provider::tushare::TushareClient;
use crate::registry::DatasetRegistry;
use crate::shutdown::SharedShutdown;
use crate::store::sqlite::SqliteStore;

/// Maximum allowed concurrency; every cycle shares one provider quota anyway
const MAX_CONCURRENCY: usize = 16;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

fn parse_date(s: &str) -> Result<String, String> {
    validate_date(s).map(|_| s.to_string())
}

/// Reference data ingestion CLI
#[derive(Parser, Debug)]
#[command(name = "refdata-ingest")]
#[command(about = "Incrementally ingest financial reference data into SQLite", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite database file
    #[arg(long, global = true, env = "REFDATA_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Tushare Pro API token
    #[arg(long, global = true, env = "TUSHARE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Provider quota in calls per minute (default: 200)
    #[arg(long, global = true, default_value = "200", value_parser = clap::value_parser!(u32).range(1..))]
    pub calls_per_minute: u32,

    /// Maximum attempts per provider call (default: 5, range: 1-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Base backoff in seconds; attempt i waits 2^i times this
    #[arg(long, global = true, default_value = "30")]
    pub base_backoff_secs: u64,

    /// Start date (YYYYMMDD) for incremental datasets with no stored rows
    #[arg(long, global = true, default_value = EARLIEST_DATE, value_parser = parse_date)]
    pub earliest_date: String,

    /// Write a CSV snapshot of every fetched row set
    #[arg(long, global = true, default_value_t = false)]
    pub snapshot: bool,

    /// Snapshot directory
    #[arg(long, global = true, default_value = DEFAULT_SNAPSHOT_DIR)]
    pub snapshot_dir: PathBuf,

    /// Number of datasets ingested concurrently (default: 4, max: 16)
    ///
    /// All concurrent cycles share one throttle, so higher values only help
    /// when cycles spend time outside provider calls.
    #[arg(long, global = true, default_value = "4", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Runtime configuration collected from the flags
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            calls_per_minute: self.calls_per_minute,
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                base_backoff: Duration::from_secs(self.base_backoff_secs),
            },
            earliest_date: self.earliest_date.clone(),
            snapshot_dir: self.snapshot.then(|| self.snapshot_dir.clone()),
        }
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run ingestion cycles
    Ingest(IngestArgs),

    /// List built-in datasets
    Sources(super::SourcesCommand),

    /// Show stored state per dataset
    Status(super::StatusCommand),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Ingest command arguments
#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Datasets to ingest; `*` wildcards allowed (default: all)
    pub datasets: Vec<String>,
}

impl IngestArgs {
    /// Run cycles for the selected datasets
    ///
    /// Every selected dataset is attempted and reported before a failure is
    /// returned.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let sources = DatasetRegistry::builtin().resolve(self.datasets.as_slice())?;

        let token = cli.token.as_deref().filter(|t| !t.is_empty()).ok_or_else(|| {
            CliError::ConfigurationError(
                "a provider token is required (--token or TUSHARE_TOKEN)".to_string(),
            )
        })?;

        let store = Arc::new(SqliteStore::open(&cli.db)?);
        let provider = Arc::new(TushareClient::new(token));
        info!(
            db = %cli.db.display(),
            provider = ?provider,
            datasets = sources.len(),
            "Starting ingestion"
        );

        let mut executor =
            IngestExecutor::new(store, provider, cli.ingest_config())?.with_shutdown(shutdown);

        let progress = (cli.output_format == OutputFormat::Human)
            .then(|| create_progress_bar(sources.len() as u64));
        if let Some(bar) = &progress {
            executor = executor.with_progress(bar.clone());
        }

        let reports = executor.run_batch(&sources, cli.concurrency).await;

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        match cli.output_format {
            OutputFormat::Json => output_json(&reports),
            OutputFormat::Human => output_human(&reports),
        }

        let failed = reports.iter().filter(|r| r.is_failed()).count();
        if failed > 0 {
            return Err(CliError::CyclesFailed {
                failed,
                total: reports.len(),
            });
        }
        Ok(())
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} datasets {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn output_json(reports: &[CycleReport]) {
    let output = serde_json::json!({
        "success": reports.iter().all(|r| !r.is_failed()),
        "datasets": reports,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize report: {}", e),
    }
}

fn output_human(reports: &[CycleReport]) {
    println!(
        "\n{:<14} {:<10} {:<10} {:>10} {:>10}",
        "DATASET", "STATUS", "START", "FETCHED", "WRITTEN"
    );
    for report in reports {
        let status = match report.status {
            CycleStatus::Completed => "ok",
            CycleStatus::Failed => "FAILED",
            CycleStatus::Skipped => "skipped",
        };
        println!(
            "{:<14} {:<10} {:<10} {:>10} {:>10}",
            report.dataset,
            status,
            report.start_date.as_deref().unwrap_or("full"),
            report.rows_fetched,
            report.rows_written
        );
        if let Some(path) = &report.snapshot_path {
            println!("  snapshot: {}", path.display());
        }
        if let Some(err) = &report.error {
            eprintln!("  error: {err}");
        }
    }
}
