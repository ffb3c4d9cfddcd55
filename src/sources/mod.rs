//! Dataset sources
//!
//! A [`DatasetSource`] is the only place that knows dataset-specific
//! semantics: which provider API to call, how the watermark maps onto call
//! parameters, and where the rows land. Everything else in a cycle is
//! generic.

use async_trait::async_trait;
use serde::Serialize;

use crate::identifier::SqlIdentifier;
use crate::provider::{Provider, ProviderResult};
use crate::store::{ColumnType, ColumnTypeHints, WriteMode};
use crate::{CallParams, RowSet};

pub mod daily;
pub mod stock_basic;
pub mod trade_cal;

pub use daily::DailyQuotes;
pub use stock_basic::StockBasic;
pub use trade_cal::TradeCalendar;

/// How a dataset is refreshed on each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Fetch from the day after the watermark and append
    Incremental,
    /// Fetch everything and replace the table
    FullRefresh,
}

impl RefreshMode {
    /// Store write mode for this refresh mode
    pub fn write_mode(&self) -> WriteMode {
        match self {
            RefreshMode::Incremental => WriteMode::Append,
            RefreshMode::FullRefresh => WriteMode::Replace,
        }
    }
}

/// Static description of one dataset
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    name: String,
    table: SqlIdentifier,
    date_column: SqlIdentifier,
    fallback_start: Option<String>,
    refresh: RefreshMode,
    type_hints: ColumnTypeHints,
    index_columns: Vec<SqlIdentifier>,
}

impl DatasetDescriptor {
    fn build(
        name: impl Into<String>,
        table: SqlIdentifier,
        date_column: SqlIdentifier,
        refresh: RefreshMode,
    ) -> Self {
        let type_hints = ColumnTypeHints::reference_defaults()
            .with(date_column.as_str(), ColumnType::FixedText(8));
        let index_columns = vec![date_column.clone()];

        Self {
            name: name.into(),
            table,
            date_column,
            fallback_start: None,
            refresh,
            type_hints,
            index_columns,
        }
    }

    /// Dataset fetched from the watermark onwards and appended
    pub fn incremental(
        name: impl Into<String>,
        table: SqlIdentifier,
        date_column: SqlIdentifier,
    ) -> Self {
        Self::build(name, table, date_column, RefreshMode::Incremental)
    }

    /// Dataset fetched whole and replaced on every cycle
    pub fn full_refresh(
        name: impl Into<String>,
        table: SqlIdentifier,
        date_column: SqlIdentifier,
    ) -> Self {
        Self::build(name, table, date_column, RefreshMode::FullRefresh)
    }

    /// Start date used when the table holds no dates, instead of the
    /// configured earliest date
    pub fn with_fallback_start(mut self, date: impl Into<String>) -> Self {
        self.fallback_start = Some(date.into());
        self
    }

    /// Declare an explicit column type
    pub fn with_type_hint(mut self, column: &str, column_type: ColumnType) -> Self {
        self.type_hints = self.type_hints.with(column, column_type);
        self
    }

    /// Add a secondary index column
    pub fn with_index(mut self, column: SqlIdentifier) -> Self {
        if !self.index_columns.contains(&column) {
            self.index_columns.push(column);
        }
        self
    }

    /// Dataset name used on the command line and in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target table
    pub fn table(&self) -> &SqlIdentifier {
        &self.table
    }

    /// Date column driving the watermark
    pub fn date_column(&self) -> &SqlIdentifier {
        &self.date_column
    }

    /// Dataset-specific start date for a missing or empty table
    pub fn fallback_start(&self) -> Option<&str> {
        self.fallback_start.as_deref()
    }

    /// Start date for a missing or empty table, given the configured default
    pub fn fallback_or<'a>(&'a self, earliest: &'a str) -> &'a str {
        self.fallback_start().unwrap_or(earliest)
    }

    /// Refresh mode
    pub fn refresh(&self) -> RefreshMode {
        self.refresh
    }

    /// Explicit column types
    pub fn type_hints(&self) -> &ColumnTypeHints {
        &self.type_hints
    }

    /// Columns that get a secondary index when present
    pub fn index_columns(&self) -> &[SqlIdentifier] {
        &self.index_columns
    }
}

/// Per-dataset extension point
///
/// Implementors supply a [`DatasetDescriptor`], the provider API name and a
/// way to turn the resolved start date into call parameters. `fetch` defaults
/// to a plain [`Provider::query`] and may be overridden to post-process rows.
/// Datasets whose provider caps the rows per response override `next_page`;
/// every page goes through throttling and retry, and all pages of one cycle
/// are committed together.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Static description of the dataset
    fn descriptor(&self) -> &DatasetDescriptor;

    /// Provider API called for this dataset
    fn api_name(&self) -> &str;

    /// Parameters for one fetch
    ///
    /// `start` is the resolved start date for incremental datasets and `None`
    /// for full refreshes.
    fn build_params(&self, start: Option<&str>) -> CallParams;

    /// Dataset name
    fn name(&self) -> &str {
        self.descriptor().name()
    }

    /// Target table
    fn table_name(&self) -> &SqlIdentifier {
        self.descriptor().table()
    }

    /// Date column driving the watermark
    fn date_column_name(&self) -> &SqlIdentifier {
        self.descriptor().date_column()
    }

    /// Parameters of the page following `page`, `None` when `page` was the last
    ///
    /// `params` are the parameters `page` was fetched with.
    fn next_page(&self, params: &CallParams, page: &RowSet) -> Option<CallParams> {
        let _ = (params, page);
        None
    }

    /// One provider call for this dataset
    async fn fetch(&self, provider: &dyn Provider, params: &CallParams) -> ProviderResult<RowSet> {
        provider.query(self.api_name(), params).await
    }
}

impl std::fmt::Debug for dyn DatasetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetSource").field("name", &self.name()).finish()
    }
}
