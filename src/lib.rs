//! # Reference Data Ingest Library
//!
//! Incremental ingestion of time-series financial reference data from a
//! rate-limited provider into a relational store.
//!
//! ## Features
//!
//! - **Throttling**: a shared [`ingest::CallThrottler`] keeps outbound calls under the
//!   provider's calls-per-minute quota
//! - **Retry**: bounded exponential backoff around every provider call
//! - **Watermarks**: each cycle resumes the day after the latest persisted date
//! - **Durable writes**: one transaction per fetched row set, explicit fixed-width
//!   text typing for date columns, automatic secondary indexes
//! - **Snapshots**: optional CSV copy of every fetched row set
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use refdata_ingest::ingest::{IngestConfig, IngestExecutor};
//! use refdata_ingest::provider::tushare::TushareClient;
//! use refdata_ingest::sources::trade_cal::TradeCalendar;
//! use refdata_ingest::store::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open("data/refdata.sqlite")?);
//! let provider = Arc::new(TushareClient::new("my-token"));
//! let executor = IngestExecutor::new(store, provider, IngestConfig::default())?;
//!
//! let report = executor.run_cycle(&TradeCalendar::new()).await?;
//! println!("{} rows written to {}", report.rows_written, report.table);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - validated SQL identifiers for table and column names
//! - [`provider`] - provider call contract and the Tushare Pro HTTP client
//! - [`ingest`] - throttling, retry and the per-dataset cycle executor
//! - [`resume`] - watermark resolution for incremental fetches
//! - [`store`] - relational store contract and its SQLite implementation
//! - [`output`] - persistence into the store and CSV snapshots
//! - [`sources`] - the dataset extension point and built-in datasets
//! - [`registry`] - lookup of built-in datasets by name

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Ingestion pipeline: throttling, retry and cycle orchestration
pub mod ingest;

/// Validated SQL identifiers
pub mod identifier;

/// Metrics collection
pub mod metrics;

/// Store persistence and snapshot writers
pub mod output;

/// Provider call contract and implementations
pub mod provider;

/// Registry of built-in datasets
pub mod registry;

/// Watermark resolution
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Dataset sources
pub mod sources;

/// Relational store contract and implementations
pub mod store;

// Re-export commonly used types
pub use identifier::SqlIdentifier;

/// A single cell in a [`RowSet`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value
    Null,
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Real(f64),
    /// Text
    Text(String),
}

impl Value {
    /// Whether this value is [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as text, `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(v) => Some(v.to_string()),
            Value::Real(v) => Some(v.to_string()),
            Value::Text(v) => Some(v.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

/// Ordered batch of uniform rows returned by one provider call
///
/// Every row has exactly one value per column. Pages of a paginated fetch are
/// joined with [`RowSet::append`]; persistence and snapshots only borrow it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Build a row set, checking that every row matches the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, RowSetError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(RowSetError::RaggedRow {
                index,
                expected: columns.len(),
                actual: row.len(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(RowSetError::DuplicateColumn(dup.clone()));
        }

        Ok(Self { columns, rows })
    }

    /// Row set with columns but no rows
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in provider order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the row set has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether the row set carries the named column
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append the rows of another page with the same columns
    ///
    /// An empty page is ignored whatever its columns.
    pub fn append(&mut self, page: RowSet) -> Result<(), RowSetError> {
        if page.is_empty() {
            return Ok(());
        }
        if self.columns != page.columns {
            return Err(RowSetError::ColumnMismatch {
                expected: self.columns.join(","),
                actual: page.columns.join(","),
            });
        }
        self.rows.extend(page.rows);
        Ok(())
    }

    /// Iterate the values of one column
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }
}

/// Errors raised when constructing a [`RowSet`]
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RowSetError {
    /// A row does not have one value per column
    #[error("row {index} has {actual} values, expected {expected}")]
    RaggedRow {
        /// Row position
        index: usize,
        /// Column count
        expected: usize,
        /// Values in the offending row
        actual: usize,
    },

    /// The same column name appears twice
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// Appended page has different columns
    #[error("page columns [{actual}] differ from [{expected}]")]
    ColumnMismatch {
        /// Columns of the row set being extended
        expected: String,
        /// Columns of the appended page
        actual: String,
    },
}

/// Parameters for one provider call
///
/// Keys are kept sorted so the same parameters always log the same way.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallParams(BTreeMap<String, String>);

impl CallParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether no parameters are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for CallParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{}");
        }
        let rendered: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&rendered.join(", "))
    }
}
