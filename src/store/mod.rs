//! Relational store contract
//!
//! The pipeline only needs four things from a database: does a table exist,
//! what is the maximum of a column, write a row set, and make sure some
//! indexes exist. [`Store`] is that contract; [`sqlite::SqliteStore`] is the
//! implementation the binary uses.

use crate::identifier::SqlIdentifier;
use crate::RowSet;
use std::collections::BTreeMap;
use std::fmt;

pub mod sqlite;

/// How a row set is written into its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Add rows to the table, creating it if needed
    Append,
    /// Discard the table content and store exactly the given rows
    Replace,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Append => f.write_str("append"),
            WriteMode::Replace => f.write_str("replace"),
        }
    }
}

/// Declared SQL type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Fixed-width text such as `YYYYMMDD` dates or security codes
    FixedText(u16),
    /// Free text
    Text,
    /// Integer
    Integer,
    /// Floating point
    Real,
}

impl ColumnType {
    /// SQL spelling of the type
    pub fn sql(&self) -> String {
        match self {
            ColumnType::FixedText(width) => format!("VARCHAR({width})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Real => "REAL".to_string(),
        }
    }
}

/// Explicit column types that override inference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTypeHints(BTreeMap<String, ColumnType>);

impl ColumnTypeHints {
    /// No hints
    pub fn new() -> Self {
        Self::default()
    }

    /// Hints for the date and code columns shared by most reference datasets
    pub fn reference_defaults() -> Self {
        Self::new()
            .with("ts_code", ColumnType::FixedText(9))
            .with("trade_date", ColumnType::FixedText(8))
            .with("ann_date", ColumnType::FixedText(8))
    }

    /// Add or replace a hint
    pub fn with(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.0.insert(column.into(), column_type);
        self
    }

    /// Hint for a column, if any
    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.0.get(column).copied()
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error while opening the database
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The shared connection lock was poisoned by a panicking writer
    #[error("store connection lock poisoned")]
    LockPoisoned,

    /// A row set cannot be written as given
    #[error("invalid row set: {0}")]
    InvalidRowSet(String),

    /// A column in the row set is not a valid identifier
    #[error("invalid column name: {0}")]
    InvalidColumn(#[from] crate::identifier::IdentifierError),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Relational store used by the ingestion pipeline
pub trait Store: Send + Sync {
    /// Whether the table exists
    fn table_exists(&self, table: &SqlIdentifier) -> StoreResult<bool>;

    /// `max(column)` rendered as text; `None` when the table is empty or the
    /// column is all null
    fn max_column_value(
        &self,
        table: &SqlIdentifier,
        column: &SqlIdentifier,
    ) -> StoreResult<Option<String>>;

    /// Write all rows in one atomic operation, returning the number written
    fn write_rows(
        &self,
        table: &SqlIdentifier,
        rows: &RowSet,
        mode: WriteMode,
        hints: &ColumnTypeHints,
    ) -> StoreResult<usize>;

    /// Create missing single-column indexes, returning the names created
    fn ensure_indexes(
        &self,
        table: &SqlIdentifier,
        columns: &[SqlIdentifier],
    ) -> StoreResult<Vec<String>>;

    /// Number of rows in the table (0 when it does not exist)
    fn row_count(&self, table: &SqlIdentifier) -> StoreResult<u64>;
}
