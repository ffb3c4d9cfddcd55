//! Row set outputs
//!
//! [`persister::Persister`] is the durable path into the store.
//! [`snapshot::SnapshotWriter`] is a best-effort CSV side channel whose
//! failures never affect the durable path.

use crate::store::StoreError;
use std::path::PathBuf;

pub mod persister;
pub mod snapshot;

pub use persister::{PersistSummary, Persister};
pub use snapshot::SnapshotWriter;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Writing to the store or creating indexes failed
    #[error("persistence failed for table {table}: {source}")]
    PersistenceFailed {
        /// Target table
        table: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Writing a snapshot file failed
    #[error("snapshot write failed for {}: {reason}", path.display())]
    SnapshotWriteFailed {
        /// Intended file path
        path: PathBuf,
        /// Failure description
        reason: String,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
