//! Daily end-of-day quotes
//!
//! The provider returns at most [`PAGE_LIMIT`] rows per `daily` call, fewer
//! than one trading day of the whole market. A fetch therefore pages through
//! its window with `limit`/`offset` until a short page arrives, so the
//! committed rows always cover every trading day up to the new watermark.
//! Each cycle covers at most [`DEFAULT_WINDOW_DAYS`] calendar days; catching
//! up on history takes several cycles.

use chrono::{Duration, Local, NaiveDate};

use super::{DatasetDescriptor, DatasetSource};
use crate::identifier::SqlIdentifier;
use crate::ingest::config::DATE_FORMAT;
use crate::{CallParams, RowSet};

/// Rows per `daily` response allowed by the provider
pub const PAGE_LIMIT: usize = 6000;

/// Calendar days fetched per cycle
pub const DEFAULT_WINDOW_DAYS: u32 = 366;

/// `daily`: one row per security and trading day, fetched incrementally
#[derive(Debug, Clone)]
pub struct DailyQuotes {
    descriptor: DatasetDescriptor,
    end_date: Option<String>,
    window_days: u32,
    page_limit: usize,
}

impl DailyQuotes {
    /// Daily quotes up to today
    pub fn new() -> Self {
        Self {
            descriptor: DatasetDescriptor::incremental(
                "daily",
                SqlIdentifier::from_static("daily"),
                SqlIdentifier::from_static("trade_date"),
            )
            .with_index(SqlIdentifier::from_static("ts_code")),
            end_date: None,
            window_days: DEFAULT_WINDOW_DAYS,
            page_limit: PAGE_LIMIT,
        }
    }

    /// Pin the end date instead of using today
    pub fn with_end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }

    /// Calendar days covered by one cycle (at least 1)
    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days.max(1);
        self
    }

    /// Rows requested per page (at least 1)
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    fn end_date(&self) -> String {
        self.end_date
            .clone()
            .unwrap_or_else(|| Local::now().format(DATE_FORMAT).to_string())
    }

    /// Last day of the window starting at `start`, never past the end date
    fn window_end(&self, start: &str) -> String {
        let end = self.end_date();
        let Ok(start) = NaiveDate::parse_from_str(start, DATE_FORMAT) else {
            return end;
        };
        let capped = (start + Duration::days(i64::from(self.window_days) - 1))
            .format(DATE_FORMAT)
            .to_string();
        // Fixed-width YYYYMMDD strings order like dates.
        capped.min(end)
    }
}

impl Default for DailyQuotes {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSource for DailyQuotes {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn api_name(&self) -> &str {
        "daily"
    }

    fn build_params(&self, start: Option<&str>) -> CallParams {
        let params = CallParams::new()
            .with("limit", self.page_limit.to_string())
            .with("offset", "0");
        match start {
            Some(start) => params
                .with("start_date", start)
                .with("end_date", self.window_end(start)),
            None => params.with("end_date", self.end_date()),
        }
    }

    fn next_page(&self, params: &CallParams, page: &RowSet) -> Option<CallParams> {
        if page.len() < self.page_limit {
            return None;
        }
        let offset: usize = params.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
        Some(
            params
                .clone()
                .with("offset", (offset + self.page_limit).to_string()),
        )
    }
}
