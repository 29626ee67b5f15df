//! In-memory blob store.
//!
//! Nothing survives the process. Blob reads are counted so tests can
//! observe when the thumbnail cache falls through to durable storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;

use super::{key_segments, BlobStore, Row, StoreResult, TableSchema, TableWrite};

type Tables = HashMap<&'static str, Vec<Row>>;

#[derive(Debug, Default)]
struct MemoryState {
    blobs: HashMap<String, Vec<u8>>,
    tables: Tables,
    backups: BTreeMap<NaiveDate, Tables>,
}

/// Blob store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    blob_reads: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`BlobStore::read`] calls served so far.
    #[must_use]
    pub fn blob_reads(&self) -> usize {
        self.blob_reads.load(Ordering::SeqCst)
    }

    /// Keys of all stored blobs, sorted.
    #[must_use]
    pub fn blob_keys(&self) -> Vec<String> {
        let state = self.lock();
        let mut keys: Vec<String> = state.blobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Overwrite a table without any validation.
    ///
    /// Lets tests plant malformed rows the way a damaged file would.
    pub fn put_raw_table(&self, schema: &TableSchema, rows: Vec<Row>) {
        self.lock().tables.insert(schema.name, rows);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl BlobStore for MemoryStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        key_segments(key)?;
        self.blob_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().blobs.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        key_segments(key)?;
        self.lock().blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        key_segments(key)?;
        Ok(self.lock().blobs.remove(key).is_some())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        key_segments(key)?;
        Ok(self.lock().blobs.contains_key(key))
    }

    fn read_table(&self, schema: &TableSchema) -> StoreResult<Option<Vec<Row>>> {
        Ok(self.lock().tables.get(schema.name).cloned())
    }

    fn write_tables(&self, tables: &[TableWrite<'_>]) -> StoreResult<()> {
        for (schema, rows) in tables {
            schema.check_rows(rows)?;
        }
        let mut state = self.lock();
        for (schema, rows) in tables {
            state.tables.insert(schema.name, rows.clone());
        }
        Ok(())
    }

    fn write_backup(&self, date: NaiveDate) -> StoreResult<bool> {
        let mut state = self.lock();
        if state.backups.contains_key(&date) {
            return Ok(false);
        }
        let snapshot = state.tables.clone();
        state.backups.insert(date, snapshot);
        Ok(true)
    }

    fn backup_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        Ok(self.lock().backups.keys().copied().collect())
    }

    fn delete_backup(&self, date: NaiveDate) -> StoreResult<()> {
        self.lock().backups.remove(&date);
        Ok(())
    }
}
