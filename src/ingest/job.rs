//! Cycle outcome reporting

use serde::Serialize;
use std::path::PathBuf;

use crate::sources::DatasetSource;
use crate::store::WriteMode;

/// Cycle outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Rows fetched and persisted
    Completed,
    /// The cycle stopped on an error
    Failed,
    /// Never started because shutdown was requested
    Skipped,
}

/// What one ingestion cycle did
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Dataset name
    pub dataset: String,
    /// Target table
    pub table: String,
    /// Resolved start date, absent for full refreshes
    pub start_date: Option<String>,
    /// Write mode used
    pub mode: WriteMode,
    /// Rows returned by the provider
    pub rows_fetched: usize,
    /// Rows committed to the store
    pub rows_written: usize,
    /// Indexes created during this cycle
    pub indexes_created: Vec<String>,
    /// Snapshot file, if one was written
    pub snapshot_path: Option<PathBuf>,
    /// Outcome
    pub status: CycleStatus,
    /// Error message for failed cycles
    pub error: Option<String>,
}

impl CycleReport {
    /// Empty report for `source`
    pub fn pending(source: &dyn DatasetSource) -> Self {
        let descriptor = source.descriptor();
        Self {
            dataset: descriptor.name().to_string(),
            table: descriptor.table().to_string(),
            start_date: None,
            mode: descriptor.refresh().write_mode(),
            rows_fetched: 0,
            rows_written: 0,
            indexes_created: Vec::new(),
            snapshot_path: None,
            status: CycleStatus::Completed,
            error: None,
        }
    }

    /// Report for a cycle that never ran
    pub fn skipped(source: &dyn DatasetSource) -> Self {
        Self {
            status: CycleStatus::Skipped,
            ..Self::pending(source)
        }
    }

    /// Report for a cycle that stopped on `error`
    pub fn failed(source: &dyn DatasetSource, error: impl std::fmt::Display) -> Self {
        Self {
            status: CycleStatus::Failed,
            error: Some(error.to_string()),
            ..Self::pending(source)
        }
    }

    /// Whether the cycle failed
    pub fn is_failed(&self) -> bool {
        self.status == CycleStatus::Failed
    }
}
