//! SQLite-backed blob store.
//!
//! Blobs live in a `blobs(key, data)` table. Each [`TableSchema`] maps to a
//! real table with one TEXT column per schema column plus a `row_index`
//! primary key that preserves row order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    key_segments, parse_backup_name, BlobStore, Row, StoreError, StoreResult, TableSchema,
    TableWrite, BACKUP_DATE_FORMAT,
};

const BACKUPS_DIR: &str = "backups";

/// Blob store persisted in a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        log::debug!("SQLite store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blobs (
                key     TEXT PRIMARY KEY,
                data    BLOB NOT NULL
            );",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn backups_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map_or_else(|| PathBuf::from(BACKUPS_DIR), |p| p.join(BACKUPS_DIR))
    }

    fn backup_path(&self, date: NaiveDate) -> PathBuf {
        self.backups_dir()
            .join(format!("{}.db", date.format(BACKUP_DATE_FORMAT)))
    }

    fn table_exists(conn: &Connection, name: &str) -> StoreResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn value_to_string(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s,
            Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl BlobStore for SqliteStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        key_segments(key)?;
        let conn = self.lock();
        let data = conn
            .query_row("SELECT data FROM blobs WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(data)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        key_segments(key)?;
        self.lock().execute(
            "INSERT INTO blobs (key, data) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data",
            params![key, bytes],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        key_segments(key)?;
        let removed = self
            .lock()
            .execute("DELETE FROM blobs WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        key_segments(key)?;
        let found: Option<i64> = self
            .lock()
            .query_row("SELECT 1 FROM blobs WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn read_table(&self, schema: &TableSchema) -> StoreResult<Option<Vec<Row>>> {
        let conn = self.lock();
        if !Self::table_exists(&conn, schema.name)? {
            return Ok(None);
        }

        // SELECT * so rows written by an older schema keep their real width.
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY row_index",
            quote_ident(schema.name)
        ))?;
        let width = stmt.column_count();
        let rows = stmt.query_map([], |row| {
            (1..width)
                .map(|i| row.get::<_, Value>(i).map(Self::value_to_string))
                .collect::<Result<Row, _>>()
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(Some(result))
    }

    fn write_tables(&self, tables: &[TableWrite<'_>]) -> StoreResult<()> {
        for (schema, rows) in tables {
            schema.check_rows(rows)?;
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for (schema, rows) in tables {
            let table = quote_ident(schema.name);
            let columns: Vec<String> = schema
                .columns
                .iter()
                .map(|c| format!("{} TEXT NOT NULL", quote_ident(c)))
                .collect();
            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {table};
                 CREATE TABLE {table} (row_index INTEGER PRIMARY KEY, {});",
                columns.join(", ")
            ))?;

            let placeholders: Vec<String> =
                (1..=schema.width() + 1).map(|i| format!("?{i}")).collect();
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {table} VALUES ({})",
                placeholders.join(", ")
            ))?;
            for (index, row) in rows.iter().enumerate() {
                let index = index as i64;
                let values = std::iter::once(Value::Integer(index))
                    .chain(row.iter().map(|v| Value::Text(v.clone())));
                insert.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_backup(&self, date: NaiveDate) -> StoreResult<bool> {
        let target = self.backup_path(date);
        if target.exists() {
            return Ok(false);
        }
        let dir = self.backups_dir();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let target_str = target.to_string_lossy().into_owned();
        self.lock().execute("VACUUM INTO ?1", [target_str])?;
        log::info!("Catalog backup written to {}", target.display());
        Ok(true)
    }

    fn backup_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let dir = self.backups_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };
        let mut dates: Vec<NaiveDate> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("db"))
            .filter_map(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(parse_backup_name)
            })
            .collect();
        dates.sort();
        Ok(dates)
    }

    fn delete_backup(&self, date: NaiveDate) -> StoreResult<()> {
        let path = self.backup_path(date);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}
