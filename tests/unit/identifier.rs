//! Unit tests for SQL identifier validation

use refdata_ingest::identifier::SqlIdentifier;

#[test]
fn test_accepts_provider_table_names() {
    for name in ["trade_cal", "stock_basic", "daily", "adj_factor", "_tmp1"] {
        let ident = SqlIdentifier::parse(name).unwrap();
        assert_eq!(ident.as_str(), name);
        assert_eq!(ident.quoted(), format!("\"{name}\""));
    }
}

#[test]
fn test_rejects_injection_attempts() {
    for name in [
        "",
        "daily; DROP TABLE daily",
        "daily\"",
        "1daily",
        "trade-cal",
        "daily table",
        "../daily",
    ] {
        assert!(SqlIdentifier::parse(name).is_err(), "accepted {name:?}");
    }
}
