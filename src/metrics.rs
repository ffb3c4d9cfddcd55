//! Operational metrics for the ingestion pipeline
//!
//! Counters and histograms for provider calls, retries, throttle waits and
//! persisted rows. Recording is always safe: until [`init_metrics`] installs
//! the Prometheus exporter, the `metrics` macros write to a no-op recorder.
//!
//! ## Architecture
//!
//! - `metrics` crate facade for recording
//! - Prometheus exporter serving a scrape endpoint when `--metrics-addr` is set

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Metrics initialization errors
#[derive(Debug, thiserror::Error)]
#[error("failed to install Prometheus exporter on {addr}: {reason}")]
pub struct MetricsError {
    addr: SocketAddr,
    reason: String,
}

/// Initialize the Prometheus exporter
///
/// Idempotent: later calls are no-ops.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "127.0.0.1:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError {
            addr,
            reason: e.to_string(),
        })?;

    describe_counter!(
        "provider_calls_total",
        Unit::Count,
        "Provider call attempts by call name and outcome"
    );
    describe_histogram!(
        "provider_call_duration_seconds",
        Unit::Seconds,
        "Provider call duration in seconds"
    );
    describe_counter!(
        "provider_retries_total",
        Unit::Count,
        "Failed provider attempts followed by a backoff"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_histogram!(
        "provider_throttle_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a throttle slot"
    );
    describe_counter!(
        "rows_persisted_total",
        Unit::Count,
        "Rows committed to the store"
    );
    describe_counter!(
        "ingest_cycles_completed_total",
        Unit::Count,
        "Ingestion cycles that completed"
    );
    describe_counter!(
        "ingest_cycles_failed_total",
        Unit::Count,
        "Ingestion cycles that failed"
    );

    *initialized = true;
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Check if the exporter has been installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record one provider call attempt
pub fn record_provider_call(call: &str, ok: bool, duration: Duration) {
    let outcome = if ok { "success" } else { "failure" };
    counter!(
        "provider_calls_total",
        "call" => call.to_string(),
        "outcome" => outcome,
    )
    .increment(1);

    histogram!(
        "provider_call_duration_seconds",
        "call" => call.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a retry backoff before attempt `attempt + 1`
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "provider_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!(
        "retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());

    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record time spent waiting for a throttle slot
pub fn record_throttle_wait(waited: Duration) {
    histogram!("provider_throttle_wait_seconds").record(waited.as_secs_f64());

    if waited > Duration::from_millis(100) {
        debug!(wait_ms = waited.as_millis() as u64, "Throttle slot granted after wait");
    }
}

/// Record rows committed to `table`
pub fn record_rows_persisted(table: &str, rows: usize) {
    counter!(
        "rows_persisted_total",
        "table" => table.to_string(),
    )
    .increment(rows as u64);
}

/// Per-cycle metrics
pub struct CycleMetrics {
    dataset: String,
    table: String,
    start_time: Instant,
}

impl CycleMetrics {
    /// Start tracking an ingestion cycle
    pub fn start(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a completed cycle
    pub fn record_success(&self, rows_written: usize) {
        counter!(
            "ingest_cycles_completed_total",
            "dataset" => self.dataset.clone(),
        )
        .increment(1);

        info!(
            dataset = %self.dataset,
            table = %self.table,
            rows_written = rows_written,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Ingestion cycle completed"
        );
    }

    /// Record a failed cycle
    pub fn record_failure(&self, error: &str) {
        counter!(
            "ingest_cycles_failed_total",
            "dataset" => self.dataset.clone(),
        )
        .increment(1);

        error!(
            dataset = %self.dataset,
            table = %self.table,
            error = %error,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Ingestion cycle failed"
        );
    }
}
