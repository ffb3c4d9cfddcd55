//! Resume capability for incremental datasets
//!
//! Progress is never stored on the side: the persisted table itself is the
//! checkpoint, and [`WatermarkResolver`] reads it back at the start of each
//! cycle.

pub mod watermark;

pub use watermark::{next_day, WatermarkError, WatermarkResolver};
