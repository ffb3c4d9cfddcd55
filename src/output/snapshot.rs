//! Best-effort CSV snapshots of fetched row sets

use csv::WriterBuilder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult};
use crate::RowSet;

/// Writes `<dir>/<name>.csv` files atomically
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create a writer rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Snapshot directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `rows` as `<name>.csv` with a header line
    ///
    /// The file is written to a temp file in the same directory and renamed
    /// into place, so readers never see a partial snapshot. An empty row set
    /// still produces a header-only file.
    pub fn write(&self, name: &str, rows: &RowSet) -> OutputResult<PathBuf> {
        let path = self.dir.join(format!("{name}.csv"));
        let failed = |reason: String| OutputError::SnapshotWriteFailed {
            path: path.clone(),
            reason,
        };

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(failed(format!("invalid snapshot name '{name}'")));
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| failed(format!("failed to create directory: {e}")))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| failed(format!("failed to create temp file: {e}")))?;

        {
            let mut writer = WriterBuilder::new().from_writer(temp_file.as_file_mut());
            writer
                .write_record(rows.columns())
                .map_err(|e| failed(e.to_string()))?;
            for row in rows.rows() {
                writer
                    .write_record(row.iter().map(|v| v.to_string()))
                    .map_err(|e| failed(e.to_string()))?;
            }
            writer.flush().map_err(|e| failed(e.to_string()))?;
        }

        temp_file
            .as_file_mut()
            .flush()
            .map_err(|e| failed(format!("failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| failed(format!("failed to sync temp file: {e}")))?;
        temp_file
            .persist(&path)
            .map_err(|e| failed(format!("failed to persist temp file: {e}")))?;

        debug!(path = %path.display(), "Snapshot renamed into place");
        info!(path = %path.display(), rows = rows.len(), "Snapshot written");
        Ok(path)
    }
}
