//! Listed securities master data

use super::{DatasetDescriptor, DatasetSource};
use crate::identifier::SqlIdentifier;
use crate::store::ColumnType;
use crate::CallParams;

/// `stock_basic`: currently listed securities, refreshed whole
#[derive(Debug, Clone)]
pub struct StockBasic {
    descriptor: DatasetDescriptor,
    list_status: String,
}

impl StockBasic {
    /// Securities with listing status `L` (listed)
    pub fn new() -> Self {
        Self::with_list_status("L")
    }

    /// Securities with the given listing status (`L`, `D` delisted, `P` paused)
    pub fn with_list_status(status: impl Into<String>) -> Self {
        Self {
            descriptor: DatasetDescriptor::full_refresh(
                "stock_basic",
                SqlIdentifier::from_static("stock_basic"),
                SqlIdentifier::from_static("list_date"),
            )
            .with_type_hint("delist_date", ColumnType::FixedText(8))
            .with_type_hint("symbol", ColumnType::FixedText(6))
            .with_index(SqlIdentifier::from_static("ts_code")),
            list_status: status.into(),
        }
    }
}

impl Default for StockBasic {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSource for StockBasic {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn api_name(&self) -> &str {
        "stock_basic"
    }

    fn build_params(&self, _start: Option<&str>) -> CallParams {
        CallParams::new().with("list_status", self.list_status.as_str())
    }
}
