//! Failure isolation between datasets in one batch

use std::sync::Arc;
use std::time::Duration;

use refdata_ingest::identifier::SqlIdentifier;
use refdata_ingest::ingest::CycleStatus;
use refdata_ingest::shutdown::ShutdownCoordinator;
use refdata_ingest::sources::{DailyQuotes, DatasetSource, StockBasic, TradeCalendar};
use refdata_ingest::store::sqlite::SqliteStore;
use refdata_ingest::store::Store;

use crate::support::{self, calendar_rows, daily_rows, transient, ScriptedProvider};

fn all_sources() -> Vec<Arc<dyn DatasetSource>> {
    vec![
        Arc::new(TradeCalendar::new()),
        Arc::new(StockBasic::new()),
        Arc::new(DailyQuotes::new().with_end_date("20080131")),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_failing_dataset_does_not_stop_siblings() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(
        ScriptedProvider::new()
            .script("trade_cal", vec![Ok(calendar_rows(&["20080101", "20080102"]))])
            .script("stock_basic", vec![transient("connection reset")])
            .script("daily", vec![Ok(daily_rows(&["20080101"]))]),
    );
    let executor = support::executor(&store, &provider, support::config(3, Duration::from_secs(1)));

    let reports = executor.run_batch(&all_sources(), 2).await;

    let names: Vec<_> = reports.iter().map(|r| r.dataset.as_str()).collect();
    assert_eq!(names, vec!["trade_cal", "stock_basic", "daily"]);

    assert_eq!(reports[0].status, CycleStatus::Completed);
    assert_eq!(reports[0].rows_written, 2);
    assert_eq!(reports[1].status, CycleStatus::Failed);
    assert!(reports[1]
        .error
        .as_deref()
        .unwrap()
        .contains("failed after 3 attempts"));
    assert_eq!(reports[2].status, CycleStatus::Completed);

    assert_eq!(provider.calls_to("stock_basic").len(), 3);
    assert!(!store
        .table_exists(&SqlIdentifier::from_static("stock_basic"))
        .unwrap());
    assert_eq!(
        store.row_count(&SqlIdentifier::from_static("daily")).unwrap(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_skips_unstarted_datasets() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let provider = Arc::new(ScriptedProvider::new());
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let executor = support::executor(&store, &provider, support::config(3, Duration::from_secs(1)))
        .with_shutdown(shutdown);

    let reports = executor.run_batch(&all_sources(), 2).await;
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.status == CycleStatus::Skipped));
    assert!(provider.calls().is_empty());
}
