//! Flat-file blob store.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   Tables/<table>.db          pipe-separated rows with a header line
//!   Blobs/<key>                one file per blob
//!   Backups/<YYYYMMDD>/<table>.db
//! ```
//!
//! Every write lands in a temporary sibling file which is then renamed over
//! the target, so readers never observe a half-written table or blob.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;

use super::{
    key_segments, parse_backup_name, BlobStore, Row, StoreError, StoreResult, TableSchema,
    TableWrite, BACKUP_DATE_FORMAT,
};

const TABLES_DIR: &str = "Tables";
const BLOBS_DIR: &str = "Blobs";
const BACKUPS_DIR: &str = "Backups";
const TABLE_EXTENSION: &str = "db";
const SEPARATOR: u8 = b'|';

/// Blob store backed by plain files under a root directory.
#[derive(Debug)]
pub struct FlatFileStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FlatFileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> StoreResult<Self> {
        for dir in [TABLES_DIR, BLOBS_DIR, BACKUPS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.root.join(BLOBS_DIR);
        for segment in key_segments(key)? {
            path.push(segment);
        }
        Ok(path)
    }

    fn table_path(&self, dir: &Path, schema: &TableSchema) -> PathBuf {
        dir.join(format!("{}.{}", schema.name, TABLE_EXTENSION))
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = target
            .file_name()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), n));
        target.with_file_name(name)
    }

    /// Write `bytes` to a temporary sibling of `target`, fsync it, and return its path.
    fn write_temp(&self, target: &Path, bytes: &[u8]) -> StoreResult<PathBuf> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let temp = self.temp_path(target);
        let mut file = File::create(&temp).map_err(|e| StoreError::io(&temp, e))?;
        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&temp);
                StoreError::io(&temp, e)
            })?;
        Ok(temp)
    }

    fn encode_table(schema: &TableSchema, rows: &[Row]) -> StoreResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(SEPARATOR)
            .from_writer(Vec::new());
        let table_err = |source| StoreError::Table {
            path: PathBuf::from(schema.name),
            source,
        };
        writer.write_record(schema.columns).map_err(table_err)?;
        for row in rows {
            writer.write_record(row).map_err(table_err)?;
        }
        writer.into_inner().map_err(|e| StoreError::Io {
            path: PathBuf::from(schema.name),
            source: std::io::Error::new(e.error().kind(), e.error().to_string()),
        })
    }

    fn decode_table(path: &Path) -> StoreResult<Vec<Row>> {
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(SEPARATOR)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| StoreError::MalformedRow {
                path: path.to_path_buf(),
                row: raw_line(&bytes, source.position().map(|p| p.byte())),
                source,
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn backup_dir(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(BACKUPS_DIR)
            .join(date.format(BACKUP_DATE_FORMAT).to_string())
    }
}

/// The line of `bytes` containing byte offset `at`, without its terminator.
fn raw_line(bytes: &[u8], at: Option<u64>) -> String {
    let at = at.map_or(0, |at| (at as usize).min(bytes.len()));
    let start = bytes[..at]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let end = bytes[at..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |i| at + i);
    String::from_utf8_lossy(&bytes[start..end])
        .trim_end_matches('\r')
        .to_string()
}

impl BlobStore for FlatFileStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.blob_path(key)?;
        let temp = self.write_temp(&path, bytes)?;
        fs::rename(&temp, &path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            StoreError::io(&path, e)
        })
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.blob_path(key)?.is_file())
    }

    fn read_table(&self, schema: &TableSchema) -> StoreResult<Option<Vec<Row>>> {
        let path = self.table_path(&self.root.join(TABLES_DIR), schema);
        if !path.exists() {
            return Ok(None);
        }
        log::trace!("Reading table {} from {}", schema.name, path.display());
        Self::decode_table(&path).map(Some)
    }

    fn write_tables(&self, tables: &[TableWrite<'_>]) -> StoreResult<()> {
        let dir = self.root.join(TABLES_DIR);
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(tables.len());

        let staging = tables.iter().try_for_each(|(schema, rows)| {
            schema.check_rows(rows)?;
            let target = self.table_path(&dir, schema);
            let bytes = Self::encode_table(schema, rows)?;
            let temp = self.write_temp(&target, &bytes)?;
            staged.push((temp, target));
            Ok(())
        });

        if let Err(e) = staging {
            for (temp, _) in &staged {
                let _ = fs::remove_file(temp);
            }
            return Err(e);
        }

        for (temp, target) in &staged {
            fs::rename(temp, target).map_err(|e| StoreError::io(target, e))?;
        }
        Ok(())
    }

    fn write_backup(&self, date: NaiveDate) -> StoreResult<bool> {
        let target = self.backup_dir(date);
        if target.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&target).map_err(|e| StoreError::io(&target, e))?;

        let tables = self.root.join(TABLES_DIR);
        let entries = fs::read_dir(&tables).map_err(|e| StoreError::io(&tables, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&tables, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TABLE_EXTENSION) {
                let dest = target.join(entry.file_name());
                fs::copy(&path, &dest).map_err(|e| StoreError::io(&dest, e))?;
            }
        }
        log::info!("Catalog backup written to {}", target.display());
        Ok(true)
    }

    fn backup_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let dir = self.root.join(BACKUPS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };
        let mut dates: Vec<NaiveDate> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| parse_backup_name(&e.file_name().to_string_lossy()))
            .collect();
        dates.sort();
        Ok(dates)
    }

    fn delete_backup(&self, date: NaiveDate) -> StoreResult<()> {
        let dir = self.backup_dir(date);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(dir, e)),
        }
    }
}
