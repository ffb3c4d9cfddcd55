//! Main entry point for the refdata-ingest CLI

use anyhow::Context;
use clap::Parser;
use refdata_ingest::cli::{Cli, Commands};
use refdata_ingest::metrics;
use refdata_ingest::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("refdata_ingest=info"));

    // Logs go to stderr so JSON reports on stdout stay machine-readable.
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr)
            .await
            .context("metrics exporter")?;
    }

    // Ctrl+C stops scheduling datasets and interrupts backoff sleeps
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing running datasets, skipping the rest");
                shutdown.request_shutdown();
            }
        }
    });

    match &cli.command {
        Commands::Ingest(args) => args.execute(&cli, shutdown).await?,
        Commands::Sources(cmd) => cmd.execute(cli.output_format)?,
        Commands::Status(cmd) => cmd.execute(&cli)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
