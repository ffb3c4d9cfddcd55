//! CSV snapshots written alongside persistence

use std::sync::Arc;
use std::time::Duration;

use refdata_ingest::identifier::SqlIdentifier;
use refdata_ingest::ingest::{CycleStatus, IngestConfig};
use refdata_ingest::sources::{DailyQuotes, TradeCalendar};
use refdata_ingest::store::sqlite::SqliteStore;
use refdata_ingest::store::Store;

use crate::support::{self, calendar_rows, daily_rows, ScriptedProvider};

fn snapshot_config(dir: std::path::PathBuf) -> IngestConfig {
    IngestConfig {
        snapshot_dir: Some(dir),
        ..support::config(5, Duration::from_secs(30))
    }
}

#[tokio::test(start_paused = true)]
async fn test_incremental_snapshot_named_after_start_date() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("snapshots");
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(
        ScriptedProvider::new().script("daily", vec![Ok(daily_rows(&["20080101", "20080102"]))]),
    );
    let executor = support::executor(&store, &provider, snapshot_config(dir.clone()));

    let report = executor
        .run_cycle(&DailyQuotes::new().with_end_date("20080131"))
        .await
        .unwrap();

    let path = report.snapshot_path.expect("snapshot written");
    assert_eq!(path, dir.join("daily_20080101.csv"));
    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(
        content,
        "ts_code,trade_date,close\n000001.SZ,20080101,10\n000001.SZ,20080102,10\n"
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_refresh_snapshot_name() {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(
        ScriptedProvider::new().script("trade_cal", vec![Ok(calendar_rows(&["20080101"]))]),
    );
    let executor = support::executor(&store, &provider, snapshot_config(temp.path().to_path_buf()));

    let report = executor.run_cycle(&TradeCalendar::new()).await.unwrap();
    assert_eq!(
        report.snapshot_path,
        Some(temp.path().join("trade_cal_full.csv"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_failure_does_not_fail_cycle() {
    let temp = tempfile::tempdir().unwrap();
    // A regular file where the snapshot directory should be.
    let blocker = temp.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(
        ScriptedProvider::new().script("daily", vec![Ok(daily_rows(&["20080101"]))]),
    );
    let executor = support::executor(&store, &provider, snapshot_config(blocker));

    let report = executor
        .run_cycle(&DailyQuotes::new().with_end_date("20080131"))
        .await
        .unwrap();

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.snapshot_path, None);
    assert_eq!(
        store.row_count(&SqlIdentifier::from_static("daily")).unwrap(),
        1
    );
}
