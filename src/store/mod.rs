//! Durable key/byte storage for catalog tables and thumbnail payloads.
//!
//! The catalog never talks to files or databases directly. It goes through
//! the [`BlobStore`] trait, which offers two shapes of storage:
//!
//! * **Blobs**: opaque byte sequences addressed by a `/`-separated key
//!   (thumbnail payloads, the storage version marker).
//! * **Tables**: ordered rows of string columns whose layout is described
//!   by a [`TableSchema`] (folders, assets, import definitions).
//!
//! # Backends
//!
//! * [`flat_file`]: pipe-separated table files plus one file per blob.
//! * [`sqlite`]: a single SQLite database (bundled `rusqlite`).
//! * [`memory`]: in-process maps, used by tests and dry runs.
//!
//! All backends replace tables as a unit: either every table passed to
//! [`BlobStore::write_tables`] is replaced, or none is.

pub mod flat_file;
pub mod memory;
pub mod sqlite;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use flat_file::FlatFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Date format used to name backups.
pub const BACKUP_DATE_FORMAT: &str = "%Y%m%d";

/// A single table row: one string per schema column.
pub type Row = Vec<String>;

/// Result alias for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by blob store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred while accessing the backing files.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The SQLite backend failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A table file could not be written as delimited text.
    #[error("table file {path}: {source}")]
    Table {
        /// Table file that failed to parse
        path: PathBuf,
        /// The underlying CSV error
        #[source]
        source: csv::Error,
    },

    /// A single record of a table file could not be decoded.
    #[error("malformed row in {path}: {source}")]
    MalformedRow {
        /// Table file holding the row
        path: PathBuf,
        /// Raw text of the offending line, lossily decoded
        row: String,
        /// The underlying CSV error
        #[source]
        source: csv::Error,
    },

    /// The key is not a valid relative blob name.
    #[error("invalid blob key: '{0}'")]
    InvalidKey(String),

    /// A row does not have the number of columns its schema declares.
    #[error("table '{table}' expects {expected} columns, got {actual}")]
    ColumnCount {
        /// Table name
        table: &'static str,
        /// Columns declared by the schema
        expected: usize,
        /// Columns present in the row
        actual: usize,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Column layout of one persisted relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name, also used as file/table identifier by the backends.
    pub name: &'static str,
    /// Column names, in row order.
    pub columns: &'static [&'static str],
}

impl TableSchema {
    /// Number of columns per row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Check that every row matches the schema width.
    pub fn check_rows(&self, rows: &[Row]) -> StoreResult<()> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.width()) {
            return Err(StoreError::ColumnCount {
                table: self.name,
                expected: self.width(),
                actual: bad.len(),
            });
        }
        Ok(())
    }
}

/// A table to be replaced by [`BlobStore::write_tables`].
pub type TableWrite<'a> = (&'a TableSchema, Vec<Row>);

/// Durable key/byte storage.
///
/// Implementations must be safe to share between the caller thread and a
/// background scan.
pub trait BlobStore: Send + Sync {
    /// Human-readable location of the backend (directory, database file).
    fn location(&self) -> String;

    /// Read a blob, `None` if it does not exist.
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Durably write a blob, replacing any previous content.
    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Delete a blob. Returns `true` if something was removed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check whether a blob exists.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Read every row of a table, `None` if the table was never written.
    ///
    /// Rows are returned as stored; validating their width is left to the
    /// caller so that it can report the offending row.
    fn read_table(&self, schema: &TableSchema) -> StoreResult<Option<Vec<Row>>>;

    /// Replace the content of several tables together.
    fn write_tables(&self, tables: &[TableWrite<'_>]) -> StoreResult<()>;

    /// Snapshot the tables under the given date. Returns `false` if a
    /// backup for that date already exists.
    fn write_backup(&self, date: NaiveDate) -> StoreResult<bool>;

    /// Dates of all existing backups, in ascending order.
    fn backup_dates(&self) -> StoreResult<Vec<NaiveDate>>;

    /// Remove the backup taken on the given date.
    fn delete_backup(&self, date: NaiveDate) -> StoreResult<()>;
}

/// Validate a blob key and split it into its segments.
///
/// Keys are relative, `/`-separated, and may not contain empty, `.` or
/// `..` segments.
pub fn key_segments(key: &str) -> StoreResult<Vec<&str>> {
    let segments: Vec<&str> = key.split('/').collect();
    let valid = !key.is_empty()
        && segments.iter().all(|s| {
            !s.is_empty() && *s != "." && *s != ".." && !s.contains('\\') && !s.contains(':')
        });
    if valid {
        Ok(segments)
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Parse a backup name produced with [`BACKUP_DATE_FORMAT`].
pub(crate) fn parse_backup_name(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, BACKUP_DATE_FORMAT).ok()
}

/// Which backend to open for a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Pipe-separated table files and one file per blob.
    #[default]
    FlatFile,
    /// Single SQLite database file.
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FlatFile => write!(f, "flat_file"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Open the configured backend rooted at `data_dir`.
pub fn open_store(backend: StorageBackend, data_dir: &Path) -> StoreResult<Arc<dyn BlobStore>> {
    log::debug!("Opening {} store at {}", backend, data_dir.display());
    match backend {
        StorageBackend::FlatFile => Ok(Arc::new(FlatFileStore::open(data_dir)?)),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(
            &data_dir.join("catalog.sqlite"),
        )?)),
    }
}
