//! End-to-end ingestion cycles against an in-memory store

use std::sync::Arc;
use std::time::Duration;

use refdata_ingest::identifier::SqlIdentifier;
use refdata_ingest::ingest::{CycleStatus, IngestError};
use refdata_ingest::output::OutputError;
use refdata_ingest::resume::WatermarkResolver;
use refdata_ingest::sources::{DailyQuotes, TradeCalendar};
use refdata_ingest::store::sqlite::SqliteStore;
use refdata_ingest::store::{Store, WriteMode};
use refdata_ingest::{RowSet, Value};

use crate::support::{self, calendar_rows, daily_rows, empty_daily, transient, ScriptedProvider};

fn daily_table() -> (SqlIdentifier, SqlIdentifier) {
    (
        SqlIdentifier::from_static("daily"),
        SqlIdentifier::from_static("trade_date"),
    )
}

/// Every row of `table` in storage order, plus its schema and index objects
fn table_dump(store: &SqliteStore, table: &str) -> Vec<String> {
    store
        .with_connection(|conn| {
            let mut dump: Vec<String> = conn
                .prepare("SELECT type, name, sql FROM sqlite_master WHERE tbl_name = ?1 ORDER BY name")?
                .query_map([table], |r| {
                    Ok(format!(
                        "{}:{}:{}",
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, Option<String>>(2)?.unwrap_or_default()
                    ))
                })?
                .collect::<Result<_, _>>()?;

            let mut stmt = conn.prepare(&format!("SELECT rowid, * FROM \"{table}\" ORDER BY rowid"))?;
            let columns = stmt.column_count();
            let rows = stmt
                .query_map([], |r| {
                    (0..columns)
                        .map(|i| r.get::<_, rusqlite::types::Value>(i).map(|v| format!("{v:?}")))
                        .collect::<Result<Vec<_>, _>>()
                        .map(|values| values.join("|"))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            dump.extend(rows);
            Ok(dump)
        })
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_uses_fallback_and_advances_watermark() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(
        ScriptedProvider::new().script(
            "daily",
            vec![Ok(daily_rows(&["20080101", "20080102", "20080103"]))],
        ),
    );
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));
    let source = DailyQuotes::new().with_end_date("20080131");

    let report = executor.run_cycle(&source).await.unwrap();
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.start_date.as_deref(), Some("20080101"));
    assert_eq!(report.mode, WriteMode::Append);
    assert_eq!(report.rows_fetched, 3);
    assert_eq!(report.rows_written, 3);

    let calls = provider.calls_to("daily");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params.get("start_date"), Some("20080101"));
    assert_eq!(calls[0].params.get("end_date"), Some("20080131"));

    let (table, column) = daily_table();
    assert_eq!(store.row_count(&table).unwrap(), 3);
    let resolver = WatermarkResolver::new(store.clone());
    assert_eq!(resolver.resolve(&table, &column, "20080101").unwrap(), "20080104");
}

#[tokio::test(start_paused = true)]
async fn test_cycles_without_new_data_leave_table_unchanged() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new().script(
        "daily",
        vec![
            Ok(daily_rows(&["20080101", "20080102", "20080103"])),
            Ok(empty_daily()),
        ],
    ));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));
    let source = DailyQuotes::new().with_end_date("20080103");

    executor.run_cycle(&source).await.unwrap();
    let before = table_dump(&store, "daily");
    assert_eq!(before.len(), 3 + 3, "table, two indexes and three rows");

    for _ in 0..2 {
        let report = executor.run_cycle(&source).await.unwrap();
        assert_eq!(report.start_date.as_deref(), Some("20080104"));
        assert_eq!(report.rows_written, 0);
        assert!(report.indexes_created.is_empty());
        assert_eq!(table_dump(&store, "daily"), before);
    }

    let (table, _) = daily_table();
    assert_eq!(store.row_count(&table).unwrap(), 3);

    let starts: Vec<_> = provider
        .calls_to("daily")
        .iter()
        .map(|c| c.params.get("start_date").unwrap().to_string())
        .collect();
    assert_eq!(starts, vec!["20080101", "20080104", "20080104"]);
}

#[tokio::test(start_paused = true)]
async fn test_append_keeps_existing_rows() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new().script(
        "daily",
        vec![
            Ok(daily_rows(&["20080101", "20080102"])),
            Ok(daily_rows(&["20080103"])),
        ],
    ));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));
    let source = DailyQuotes::new().with_end_date("20080131");

    executor.run_cycle(&source).await.unwrap();
    let report = executor.run_cycle(&source).await.unwrap();
    assert_eq!(report.start_date.as_deref(), Some("20080103"));

    let (table, column) = daily_table();
    assert_eq!(store.row_count(&table).unwrap(), 3);
    assert_eq!(
        store.max_column_value(&table, &column).unwrap().as_deref(),
        Some("20080103")
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_refresh_replaces_table_content() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new().script(
        "trade_cal",
        vec![
            Ok(calendar_rows(&["20080101", "20080102", "20080103"])),
            Ok(calendar_rows(&["20080101", "20080102"])),
        ],
    ));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));

    let first = executor.run_cycle(&TradeCalendar::new()).await.unwrap();
    assert_eq!(first.mode, WriteMode::Replace);
    assert_eq!(first.start_date, None);

    let second = executor.run_cycle(&TradeCalendar::new()).await.unwrap();
    assert_eq!(second.rows_written, 2);

    let table = SqlIdentifier::from_static("trade_cal");
    assert_eq!(store.row_count(&table).unwrap(), 2);
    assert!(provider.calls_to("trade_cal")[0].params.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_indexes_created_once() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new().script(
        "daily",
        vec![
            Ok(daily_rows(&["20080101"])),
            Ok(daily_rows(&["20080102"])),
        ],
    ));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));
    let source = DailyQuotes::new().with_end_date("20080131");

    let first = executor.run_cycle(&source).await.unwrap();
    assert_eq!(
        first.indexes_created,
        vec!["idx_daily_trade_date", "idx_daily_ts_code"]
    );

    let second = executor.run_cycle(&source).await.unwrap();
    assert!(second.indexes_created.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_leaves_watermark_unchanged() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let missing_date = RowSet::new(
        vec!["ts_code".into(), "close".into()],
        vec![vec!["000001.SZ".into(), Value::Real(9.5)]],
    )
    .unwrap();
    let provider = Arc::new(ScriptedProvider::new().script(
        "daily",
        vec![Ok(daily_rows(&["20080101"])), Ok(missing_date)],
    ));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));
    let source = DailyQuotes::new().with_end_date("20080131");

    executor.run_cycle(&source).await.unwrap();
    let err = executor.run_cycle(&source).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Output(OutputError::PersistenceFailed { .. })
    ));
    assert!(err.to_string().starts_with("persistence failed for table daily"));

    // Persistence is never retried.
    assert_eq!(provider.calls_to("daily").len(), 2);

    let (table, column) = daily_table();
    assert_eq!(store.row_count(&table).unwrap(), 1);
    let resolver = WatermarkResolver::new(store.clone());
    assert_eq!(resolver.resolve(&table, &column, "20080101").unwrap(), "20080102");
}

#[tokio::test(start_paused = true)]
async fn test_numeric_dates_are_stored_as_text() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let numeric = RowSet::new(
        vec!["ts_code".into(), "trade_date".into(), "close".into()],
        vec![
            vec!["000001.SZ".into(), Value::Integer(20080102), Value::Real(10.0)],
            vec!["000001.SZ".into(), Value::Integer(20080103), Value::Real(10.2)],
        ],
    )
    .unwrap();
    let provider = Arc::new(ScriptedProvider::new().script("daily", vec![Ok(numeric)]));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));

    executor
        .run_cycle(&DailyQuotes::new().with_end_date("20080131"))
        .await
        .unwrap();

    let (declared, stored): (String, String) = store
        .with_connection(|conn| {
            let declared = conn.query_row(
                "SELECT type FROM pragma_table_info('daily') WHERE name = 'trade_date'",
                [],
                |r| r.get(0),
            )?;
            let stored = conn.query_row("SELECT typeof(trade_date) FROM daily LIMIT 1", [], |r| {
                r.get(0)
            })?;
            Ok((declared, stored))
        })
        .unwrap();
    assert_eq!(declared, "VARCHAR(8)");
    assert_eq!(stored, "text");

    let (table, column) = daily_table();
    let resolver = WatermarkResolver::new(store.clone());
    assert_eq!(resolver.resolve(&table, &column, "20080101").unwrap(), "20080104");
}

#[tokio::test(start_paused = true)]
async fn test_paginated_fetch_commits_every_page() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new().script(
        "daily",
        vec![
            Ok(daily_rows(&["20080102", "20080102"])),
            Ok(daily_rows(&["20080103", "20080103"])),
            Ok(daily_rows(&["20080104"])),
        ],
    ));
    let executor = support::executor(&store, &provider, support::config(5, Duration::from_secs(30)));
    let source = DailyQuotes::new()
        .with_end_date("20240131")
        .with_window_days(31)
        .with_page_limit(2);

    let report = executor.run_cycle(&source).await.unwrap();
    assert_eq!(report.rows_fetched, 5);
    assert_eq!(report.rows_written, 5);

    let calls = provider.calls_to("daily");
    let offsets: Vec<_> = calls.iter().map(|c| c.params.get("offset").unwrap()).collect();
    assert_eq!(offsets, vec!["0", "2", "4"]);
    assert!(calls
        .iter()
        .all(|c| c.params.get("start_date") == Some("20080101")
            && c.params.get("end_date") == Some("20080131")));

    let (table, column) = daily_table();
    let resolver = WatermarkResolver::new(store.clone());
    assert_eq!(resolver.resolve(&table, &column, "20080101").unwrap(), "20080105");
}

#[tokio::test(start_paused = true)]
async fn test_failed_page_commits_nothing() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new().script(
        "daily",
        vec![
            Ok(daily_rows(&["20080102", "20080102"])),
            transient("connection reset"),
        ],
    ));
    let executor = support::executor(&store, &provider, support::config(3, Duration::from_secs(1)));
    let source = DailyQuotes::new().with_end_date("20080131").with_page_limit(2);

    let err = executor.run_cycle(&source).await.unwrap_err();
    assert!(matches!(err, IngestError::ProviderExhausted { attempts: 3, .. }));
    assert_eq!(provider.calls_to("daily").len(), 1 + 3);

    let (table, column) = daily_table();
    assert!(!store.table_exists(&table).unwrap());
    let resolver = WatermarkResolver::new(store.clone());
    assert_eq!(resolver.resolve(&table, &column, "20080101").unwrap(), "20080101");
}
