//! Watermark resolution
//!
//! The watermark of a dataset is the largest value of its date column that
//! has been committed to the store. It is recomputed from the table on every
//! cycle and never cached, so a failed write can never advance it.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::identifier::SqlIdentifier;
use crate::ingest::config::DATE_FORMAT;
use crate::store::{Store, StoreError};

/// Computes the start date of the next incremental fetch
#[derive(Clone)]
pub struct WatermarkResolver {
    store: Arc<dyn Store>,
}

impl WatermarkResolver {
    /// Create a resolver reading from `store`
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Latest persisted value of `date_column`
    ///
    /// `None` when the table does not exist or holds no non-null dates.
    pub fn latest(
        &self,
        table: &SqlIdentifier,
        date_column: &SqlIdentifier,
    ) -> Result<Option<String>, WatermarkError> {
        if !self.store.table_exists(table)? {
            return Ok(None);
        }
        Ok(self.store.max_column_value(table, date_column)?)
    }

    /// Start date for the next fetch
    ///
    /// Returns `fallback` when the table is missing or empty, otherwise the
    /// day after the latest persisted date, formatted as `YYYYMMDD`.
    ///
    /// # Errors
    /// Store failures, or a persisted maximum that is not a `YYYYMMDD` date.
    pub fn resolve(
        &self,
        table: &SqlIdentifier,
        date_column: &SqlIdentifier,
        fallback: &str,
    ) -> Result<String, WatermarkError> {
        let latest = match self.latest(table, date_column)? {
            Some(latest) => latest,
            None => {
                debug!(
                    table = %table,
                    fallback = fallback,
                    "No persisted dates, using fallback start date"
                );
                return Ok(fallback.to_string());
            }
        };

        let next = next_day(&latest).ok_or_else(|| WatermarkError::InvalidDate {
            table: table.to_string(),
            column: date_column.to_string(),
            value: latest.clone(),
        })?;

        debug!(
            table = %table,
            column = %date_column,
            latest = %latest,
            next = %next,
            "Resolved watermark"
        );
        Ok(next)
    }
}

/// The `YYYYMMDD` date one day after `date`
pub fn next_day(date: &str) -> Option<String> {
    if date.len() != 8 {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    parsed
        .succ_opt()
        .map(|d| d.format(DATE_FORMAT).to_string())
}

/// Watermark resolution errors
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    /// Store read failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The persisted maximum is not a fixed-width date
    #[error("{table}.{column} holds '{value}', which is not a YYYYMMDD date")]
    InvalidDate {
        /// Table name
        table: String,
        /// Date column
        column: String,
        /// Offending value
        value: String,
    },
}
