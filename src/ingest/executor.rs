//! Ingestion cycle executor

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use super::config::{validate_date, IngestConfig};
use super::job::{CycleReport, CycleStatus};
use super::rate_limit::CallThrottler;
use super::retry::RetryingInvoker;
use super::IngestError;
use crate::metrics::CycleMetrics;
use crate::output::{OutputResult, PersistSummary, Persister, SnapshotWriter};
use crate::provider::Provider;
use crate::resume::WatermarkResolver;
use crate::shutdown::SharedShutdown;
use crate::sources::{DatasetDescriptor, DatasetSource, RefreshMode};
use crate::store::Store;
use crate::{CallParams, RowSet};

/// Upper bound on pages followed in one fetch
const MAX_PAGES: usize = 10_000;

/// Runs ingestion cycles for dataset sources
///
/// One executor owns one [`CallThrottler`]; every cycle it runs, sequential
/// or concurrent, draws provider slots from it.
pub struct IngestExecutor {
    provider: Arc<dyn Provider>,
    config: IngestConfig,
    invoker: RetryingInvoker,
    watermarks: WatermarkResolver,
    persister: Persister,
    snapshots: Option<SnapshotWriter>,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl IngestExecutor {
    /// Create an executor over `store` and `provider`
    ///
    /// # Errors
    /// [`IngestError::Config`] for a zero call quota or an invalid earliest date.
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn Provider>,
        config: IngestConfig,
    ) -> Result<Self, IngestError> {
        validate_date(&config.earliest_date).map_err(IngestError::Config)?;

        let throttler = Arc::new(CallThrottler::from_calls_per_minute(
            config.calls_per_minute,
        )?);
        let invoker = RetryingInvoker::new(throttler, config.retry);
        let snapshots = config.snapshot_dir.clone().map(SnapshotWriter::new);

        Ok(Self {
            provider,
            invoker,
            watermarks: WatermarkResolver::new(store.clone()),
            persister: Persister::new(store),
            snapshots,
            config,
            shutdown: None,
            progress: None,
        })
    }

    /// Set shutdown coordinator for graceful shutdown
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.invoker = self.invoker.with_shutdown(shutdown.clone());
        self.shutdown = Some(shutdown);
        self
    }

    /// Draw provider slots from an existing throttler
    pub fn with_throttler(mut self, throttler: Arc<CallThrottler>) -> Self {
        let mut invoker = RetryingInvoker::new(throttler, self.config.retry);
        if let Some(shutdown) = &self.shutdown {
            invoker = invoker.with_shutdown(shutdown.clone());
        }
        self.invoker = invoker;
        self
    }

    /// Advance `bar` once per finished cycle in [`IngestExecutor::run_batch`]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Throttler shared by all cycles
    pub fn throttler(&self) -> &Arc<CallThrottler> {
        self.invoker.throttler()
    }

    /// Configuration in use
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Run one cycle: watermark, throttled and retried fetch, persist
    ///
    /// A snapshot, when configured, is written after the rows are committed;
    /// its failure is logged and does not fail the cycle.
    ///
    /// # Errors
    /// Watermark and persistence failures, [`IngestError::ProviderExhausted`]
    /// once retries are spent, or [`IngestError::Cancelled`] on shutdown.
    pub async fn run_cycle(&self, source: &dyn DatasetSource) -> Result<CycleReport, IngestError> {
        let descriptor = source.descriptor();
        let span = info_span!(
            "ingest_cycle",
            dataset = %descriptor.name(),
            table = %descriptor.table(),
        );

        async {
            let metrics = CycleMetrics::start(descriptor.name(), descriptor.table().as_str());
            let result = self.execute_cycle(source).await;
            match &result {
                Ok(report) => metrics.record_success(report.rows_written),
                Err(err) => metrics.record_failure(&err.to_string()),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_cycle(&self, source: &dyn DatasetSource) -> Result<CycleReport, IngestError> {
        if self.shutdown_requested() {
            return Err(IngestError::Cancelled);
        }

        let descriptor = source.descriptor();
        let mut report = CycleReport::pending(source);

        let start = match descriptor.refresh() {
            RefreshMode::Incremental => Some(self.watermarks.resolve(
                descriptor.table(),
                descriptor.date_column(),
                descriptor.fallback_or(&self.config.earliest_date),
            )?),
            RefreshMode::FullRefresh => None,
        };

        let params = source.build_params(start.as_deref());
        info!(start_date = ?start, params = %params, "Starting ingestion cycle");

        let rows = self.fetch_pages(source, params).await?;
        report.rows_fetched = rows.len();

        let snapshot_name = self.snapshots.as_ref().map(|_| match &start {
            Some(start) => format!("{}_{}", descriptor.table(), start),
            None => format!("{}_full", descriptor.table()),
        });
        let (summary, snapshot_path) = self.write_outputs(descriptor, rows, snapshot_name).await?;
        report.rows_written = summary.rows_written;
        report.indexes_created = summary.indexes_created;
        report.snapshot_path = snapshot_path;

        report.start_date = start;
        report.status = CycleStatus::Completed;
        Ok(report)
    }

    /// Fetch every page of one cycle, each through throttling and retry
    async fn fetch_pages(
        &self,
        source: &dyn DatasetSource,
        params: CallParams,
    ) -> Result<RowSet, IngestError> {
        let provider = self.provider.as_ref();
        let mut params = params;
        let mut rows: Option<RowSet> = None;

        for page_number in 1..=MAX_PAGES {
            let page = self
                .invoker
                .invoke(source.api_name(), &params, |p| async move {
                    source.fetch(provider, &p).await
                })
                .await?;
            let next = source.next_page(&params, &page);
            debug!(page = page_number, rows = page.len(), "Fetched page");

            rows = Some(match rows.take() {
                None => page,
                Some(mut joined) => {
                    joined.append(page).map_err(|e| IngestError::Pagination {
                        call: source.api_name().to_string(),
                        reason: e.to_string(),
                    })?;
                    joined
                }
            });

            match next {
                Some(next) => params = next,
                None => return Ok(rows.unwrap_or_default()),
            }
        }

        Err(IngestError::Pagination {
            call: source.api_name().to_string(),
            reason: format!("more than {MAX_PAGES} pages"),
        })
    }

    /// Persist `rows`, then write the snapshot, off the async workers
    ///
    /// SQLite calls block, so both run on the blocking pool.
    async fn write_outputs(
        &self,
        descriptor: &DatasetDescriptor,
        rows: RowSet,
        snapshot_name: Option<String>,
    ) -> Result<(PersistSummary, Option<PathBuf>), IngestError> {
        let persister = self.persister.clone();
        let snapshots = self.snapshots.clone();
        let descriptor = descriptor.clone();
        let span = Span::current();

        let task = tokio::task::spawn_blocking(move || -> OutputResult<_> {
            let _entered = span.enter();
            let summary = persister.persist(&descriptor, &rows, descriptor.refresh().write_mode())?;

            let snapshot_path = match (snapshots, snapshot_name) {
                (Some(writer), Some(name)) => match writer.write(&name, &rows) {
                    Ok(path) => Some(path),
                    Err(err) => {
                        warn!(error = %err, "Snapshot not written");
                        None
                    }
                },
                _ => None,
            };
            Ok((summary, snapshot_path))
        });

        let outputs = task.await.map_err(|e| IngestError::Task(e.to_string()))??;
        Ok(outputs)
    }

    /// Run cycles for many sources, at most `concurrency` at a time
    ///
    /// A failing source is reported and never stops its siblings. Sources
    /// not yet started when shutdown is requested are reported as skipped.
    /// Reports come back in the order of `sources`.
    pub async fn run_batch(
        &self,
        sources: &[Arc<dyn DatasetSource>],
        concurrency: usize,
    ) -> Vec<CycleReport> {
        let concurrency = concurrency.max(1);
        info!(
            datasets = sources.len(),
            concurrency = concurrency,
            "Starting ingestion batch"
        );

        let mut reports: Vec<(usize, CycleReport)> = stream::iter(sources.iter().enumerate())
            .map(|(position, source)| async move {
                let report = if self.shutdown_requested() {
                    info!(dataset = %source.name(), "Shutdown requested, skipping dataset");
                    CycleReport::skipped(source.as_ref())
                } else {
                    match self.run_cycle(source.as_ref()).await {
                        Ok(report) => report,
                        Err(err) => CycleReport::failed(source.as_ref(), &err),
                    }
                };

                if let Some(bar) = &self.progress {
                    bar.set_message(source.name().to_string());
                    bar.inc(1);
                }
                (position, report)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        reports.sort_by_key(|(position, _)| *position);
        let reports: Vec<CycleReport> = reports.into_iter().map(|(_, report)| report).collect();

        let failed = reports.iter().filter(|r| r.is_failed()).count();
        info!(
            datasets = reports.len(),
            failed = failed,
            "Ingestion batch finished"
        );
        reports
    }
}
