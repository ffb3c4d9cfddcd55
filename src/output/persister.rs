//! Store persistence with explicit column typing and index maintenance

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{OutputError, OutputResult};
use crate::identifier::SqlIdentifier;
use crate::metrics::record_rows_persisted;
use crate::sources::DatasetDescriptor;
use crate::store::{Store, StoreError, WriteMode};
use crate::RowSet;

/// What one [`Persister::persist`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    /// Rows committed
    pub rows_written: usize,
    /// Indexes created by this call
    pub indexes_created: Vec<String>,
}

/// Writes row sets into their dataset tables
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn Store>,
}

impl Persister {
    /// Create a persister writing to `store`
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Write `rows` into the dataset's table, then ensure its indexes
    ///
    /// The whole row set goes in one store write. Appending an empty row set
    /// is a no-op and leaves the store untouched. Nothing is retried here.
    ///
    /// # Errors
    /// [`OutputError::PersistenceFailed`] when the row set lacks the dataset's
    /// date column or the store rejects the write or an index.
    pub fn persist(
        &self,
        dataset: &DatasetDescriptor,
        rows: &RowSet,
        mode: WriteMode,
    ) -> OutputResult<PersistSummary> {
        let table = dataset.table();
        let failed = |source: StoreError| OutputError::PersistenceFailed {
            table: table.to_string(),
            source,
        };

        if mode == WriteMode::Append && rows.is_empty() {
            debug!(table = %table, "Empty row set, nothing to append");
            return Ok(PersistSummary::default());
        }

        if !rows.has_column(dataset.date_column().as_str()) {
            return Err(failed(StoreError::InvalidRowSet(format!(
                "row set has no '{}' column",
                dataset.date_column()
            ))));
        }

        let started = Instant::now();
        let rows_written = self
            .store
            .write_rows(table, rows, mode, dataset.type_hints())
            .map_err(failed)?;

        info!(
            table = %table,
            mode = %mode,
            rows = rows_written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Persisted row set"
        );
        record_rows_persisted(table.as_str(), rows_written);

        let index_columns: Vec<SqlIdentifier> = dataset
            .index_columns()
            .iter()
            .filter(|c| rows.has_column(c.as_str()))
            .cloned()
            .collect();
        let indexes_created = self
            .store
            .ensure_indexes(table, &index_columns)
            .map_err(failed)?;

        if !indexes_created.is_empty() {
            info!(table = %table, indexes = ?indexes_created, "Created missing indexes");
        }

        Ok(PersistSummary {
            rows_written,
            indexes_created,
        })
    }
}
