//! SQLite store implementation
//!
//! One connection shared behind a mutex. Every `write_rows` call runs inside a
//! single transaction so a row set is either fully committed or not at all.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use super::{ColumnType, ColumnTypeHints, Store, StoreError, StoreResult, WriteMode};
use crate::identifier::SqlIdentifier;
use crate::{RowSet, Value};

/// How long a writer waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`Store`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        info!(path = %path.display(), "Opened SQLite store");
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run a read-only query against the connection (used by tests and tooling)
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let conn = self.conn()?;
        Ok(f(&conn)?)
    }
}

fn table_exists_on(conn: &Connection, table: &SqlIdentifier) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
    }
}

/// Hinted type if any, otherwise inferred from the first non-null value
fn column_type(rows: &RowSet, index: usize, name: &str, hints: &ColumnTypeHints) -> ColumnType {
    if let Some(hinted) = hints.get(name) {
        return hinted;
    }

    match rows.rows().iter().map(|row| &row[index]).find(|v| !v.is_null()) {
        Some(Value::Integer(_)) => ColumnType::Integer,
        Some(Value::Real(_)) => ColumnType::Real,
        _ => ColumnType::Text,
    }
}

fn column_identifiers(rows: &RowSet) -> StoreResult<Vec<SqlIdentifier>> {
    rows.columns()
        .iter()
        .map(|c| SqlIdentifier::parse(c).map_err(StoreError::from))
        .collect()
}

fn create_table_sql(
    table: &SqlIdentifier,
    columns: &[SqlIdentifier],
    rows: &RowSet,
    hints: &ColumnTypeHints,
) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{} {}",
                c.quoted(),
                column_type(rows, i, c.as_str(), hints).sql()
            )
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.quoted(),
        definitions.join(", ")
    )
}

impl Store for SqliteStore {
    fn table_exists(&self, table: &SqlIdentifier) -> StoreResult<bool> {
        let conn = self.conn()?;
        table_exists_on(&conn, table)
    }

    fn max_column_value(
        &self,
        table: &SqlIdentifier,
        column: &SqlIdentifier,
    ) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let sql = format!("SELECT MAX({}) FROM {}", column.quoted(), table.quoted());
        let value: SqlValue = conn.query_row(&sql, [], |row| row.get(0))?;

        Ok(match value {
            SqlValue::Null => None,
            SqlValue::Integer(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v),
            SqlValue::Blob(v) => Some(String::from_utf8_lossy(&v).into_owned()),
        })
    }

    fn write_rows(
        &self,
        table: &SqlIdentifier,
        rows: &RowSet,
        mode: WriteMode,
        hints: &ColumnTypeHints,
    ) -> StoreResult<usize> {
        if rows.columns().is_empty() {
            if mode == WriteMode::Append && rows.is_empty() {
                return Ok(0);
            }
            return Err(StoreError::InvalidRowSet(format!(
                "cannot write {} rows without columns into {table}",
                rows.len()
            )));
        }

        if mode == WriteMode::Append && rows.is_empty() {
            debug!(table = %table, "Nothing to append");
            return Ok(0);
        }

        let columns = column_identifiers(rows)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if mode == WriteMode::Replace {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.quoted()))?;
        }
        tx.execute_batch(&create_table_sql(table, &columns, rows, hints))?;

        {
            let column_list: Vec<String> = columns.iter().map(SqlIdentifier::quoted).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.quoted(),
                column_list.join(", "),
                placeholders.join(", ")
            );

            let mut stmt = tx.prepare(&sql)?;
            for row in rows.rows() {
                stmt.execute(rusqlite::params_from_iter(row.iter().map(to_sql)))?;
            }
        }

        tx.commit()?;
        Ok(rows.len())
    }

    fn ensure_indexes(
        &self,
        table: &SqlIdentifier,
        columns: &[SqlIdentifier],
    ) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut created = Vec::new();

        for column in columns {
            let index_name = format!("idx_{}_{}", table.as_str(), column.as_str());
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                    [&index_name],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if exists {
                continue;
            }

            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS \"{}\" ON {} ({})",
                index_name,
                table.quoted(),
                column.quoted()
            ))?;
            created.push(index_name);
        }

        Ok(created)
    }

    fn row_count(&self, table: &SqlIdentifier) -> StoreResult<u64> {
        let conn = self.conn()?;
        if !table_exists_on(&conn, table)? {
            return Ok(0);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table.quoted());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}
