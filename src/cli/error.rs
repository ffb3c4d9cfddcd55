//! CLI error types and conversions

use crate::ingest::IngestError;
use crate::registry::RegistryError;
use crate::resume::WatermarkError;
use crate::store::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Registry error
    #[error("registry error: {0}")]
    RegistryError(#[from] RegistryError),

    /// Store could not be opened or read
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// Ingestion setup error
    #[error("ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// Watermark error
    #[error("watermark error: {0}")]
    WatermarkError(#[from] WatermarkError),

    /// One or more dataset cycles failed
    #[error("{failed} of {total} datasets failed")]
    CyclesFailed {
        /// Failed cycles
        failed: usize,
        /// Cycles attempted
        total: usize,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
