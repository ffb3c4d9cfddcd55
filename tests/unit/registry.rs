//! Unit tests for dataset name resolution

use refdata_ingest::registry::{DatasetRegistry, RegistryError};

fn names(selected: &[std::sync::Arc<dyn refdata_ingest::sources::DatasetSource>]) -> Vec<String> {
    selected.iter().map(|s| s.name().to_string()).collect()
}

#[test]
fn test_builtin_names() {
    let registry = DatasetRegistry::builtin();
    assert_eq!(registry.names(), vec!["daily", "stock_basic", "trade_cal"]);
}

#[test]
fn test_empty_selection_is_everything() {
    let registry = DatasetRegistry::builtin();
    let selected = registry.resolve::<&str>(&[]).unwrap();
    assert_eq!(names(&selected), vec!["daily", "stock_basic", "trade_cal"]);
}

#[test]
fn test_wildcards_and_order() {
    let registry = DatasetRegistry::builtin();

    let selected = registry.resolve(&["trade_cal", "*_basic"]).unwrap();
    assert_eq!(names(&selected), vec!["trade_cal", "stock_basic"]);

    let selected = registry.resolve(&["*a*"]).unwrap();
    assert_eq!(names(&selected), vec!["daily", "stock_basic", "trade_cal"]);
}

#[test]
fn test_duplicates_removed() {
    let registry = DatasetRegistry::builtin();
    let selected = registry.resolve(&["daily", "d*", "daily"]).unwrap();
    assert_eq!(names(&selected), vec!["daily"]);
}

#[test]
fn test_unknown_dataset() {
    let registry = DatasetRegistry::builtin();
    let err = registry.resolve(&["daily", "weekly"]).unwrap_err();
    assert_eq!(
        err,
        RegistryError::NotFound {
            pattern: "weekly".to_string(),
            available: "daily, stock_basic, trade_cal".to_string(),
        }
    );
}
