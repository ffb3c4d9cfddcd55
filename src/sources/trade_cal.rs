//! Exchange trading calendar

use super::{DatasetDescriptor, DatasetSource};
use crate::identifier::SqlIdentifier;
use crate::CallParams;

/// `trade_cal`: one row per calendar day and exchange, refreshed whole
#[derive(Debug, Clone)]
pub struct TradeCalendar {
    descriptor: DatasetDescriptor,
}

impl TradeCalendar {
    /// Calendar for every exchange the provider covers
    pub fn new() -> Self {
        Self {
            descriptor: DatasetDescriptor::full_refresh(
                "trade_cal",
                SqlIdentifier::from_static("trade_cal"),
                SqlIdentifier::from_static("cal_date"),
            )
            .with_type_hint("pretrade_date", crate::store::ColumnType::FixedText(8)),
        }
    }
}

impl Default for TradeCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSource for TradeCalendar {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn api_name(&self) -> &str {
        "trade_cal"
    }

    // Small enough to fetch whole every time.
    fn build_params(&self, _start: Option<&str>) -> CallParams {
        CallParams::new()
    }
}
