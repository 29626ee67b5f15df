//! Bounded, write-through thumbnail cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::entry::{FolderThumbnails, Thumbnail};
use super::{CacheError, CacheResult};
use crate::catalog::Folder;
use crate::store::BlobStore;

/// Key prefix of folder thumbnail blobs.
pub const THUMBNAILS_PREFIX: &str = "Thumbnails";

/// Blob key of a folder's thumbnails.
#[must_use]
pub fn blob_key(folder: &Folder) -> String {
    format!("{THUMBNAILS_PREFIX}/{}", folder.thumbnails_blob_name())
}

#[derive(Debug, Default)]
struct CacheState {
    /// Loaded folders, keyed by blob key. Always the same set as `recency`.
    folders: HashMap<String, FolderThumbnails>,
    /// Folders in the order they were first touched.
    recency: VecDeque<String>,
    /// Content of blobs whose write is in flight; `None` while a blob is
    /// being deleted. A folder found here must not be loaded from the store.
    pending: HashMap<String, Option<FolderThumbnails>>,
    /// Bumped every time a blob write or delete starts, so that a load that
    /// raced with it can be detected and retried.
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn touch(&mut self, key: &str, capacity: usize) {
        if self.recency.iter().any(|k| k == key) {
            return;
        }
        self.recency.push_back(key.to_string());
        while self.recency.len() > capacity {
            if let Some(oldest) = self.recency.pop_front() {
                log::trace!("Releasing thumbnails of {oldest} from memory");
                self.folders.remove(&oldest);
            }
        }
    }

    fn install(&mut self, key: &str, thumbs: FolderThumbnails, capacity: usize) {
        self.folders.insert(key.to_string(), thumbs);
        self.touch(key, capacity);
    }

    fn forget(&mut self, key: &str) {
        self.folders.remove(key);
        self.recency.retain(|k| k != key);
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn begin_write(&mut self, key: &str, content: Option<FolderThumbnails>) {
        let generation = self.generations.entry(key.to_string()).or_default();
        *generation = generation.wrapping_add(1);
        self.pending.insert(key.to_string(), content);
    }
}

/// Folder-granular thumbnail cache over a [`BlobStore`].
///
/// Reads are served from memory when the folder is loaded and fall through
/// to the folder blob otherwise. Writes update memory and rewrite the
/// folder blob before returning.
///
/// Blob I/O never happens while the in-memory state is locked, so readers
/// of other folders are not held up by a slow store. Writers are serialized
/// among themselves so that the last blob written always reflects the
/// last in-memory update. While a write is in flight its content is what
/// readers get, even if the folder left memory in the meantime.
pub struct ThumbnailCache {
    store: Arc<dyn BlobStore>,
    capacity: usize,
    state: Mutex<CacheState>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("store", &self.store.location())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl ThumbnailCache {
    /// Create a cache keeping at most `capacity` folders in memory.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            writer: Mutex::new(()),
        }
    }

    /// Maximum number of folders held in memory.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Thumbnail of `file_name` in `folder`.
    ///
    /// Returns `None` if the folder blob does not exist or does not contain
    /// the file.
    pub fn get_or_load(&self, folder: &Folder, file_name: &str) -> CacheResult<Option<Thumbnail>> {
        let key = blob_key(folder);
        let Some(state) = self.lock_folder(folder, &key, false)? else {
            return Ok(None);
        };
        Ok(state
            .folders
            .get(&key)
            .and_then(|thumbs| thumbs.get(file_name).cloned()))
    }

    /// Store a thumbnail in memory and durably in the folder blob.
    pub fn put(&self, folder: &Folder, file_name: &str, bytes: &[u8]) -> CacheResult<()> {
        let _writer = self.lock_writer();
        let key = blob_key(folder);
        let snapshot = {
            let Some(mut state) = self.lock_folder(folder, &key, true)? else {
                return Ok(());
            };
            let thumbs = state.folders.entry(key.clone()).or_default();
            thumbs.insert(file_name, Thumbnail::from(bytes));
            let snapshot = thumbs.clone();
            state.begin_write(&key, Some(snapshot.clone()));
            snapshot
        };
        let persisted = self.persist(&key, &snapshot);
        self.end_write(&key);
        persisted
    }

    /// Remove one thumbnail from memory and from the folder blob.
    ///
    /// Returns `true` if a thumbnail was removed. The blob itself is deleted
    /// once its last thumbnail is gone.
    pub fn evict(&self, folder: &Folder, file_name: &str) -> CacheResult<bool> {
        let _writer = self.lock_writer();
        let key = blob_key(folder);
        let snapshot = {
            let Some(mut state) = self.lock_folder(folder, &key, false)? else {
                return Ok(false);
            };
            let Some(thumbs) = state.folders.get_mut(&key) else {
                return Ok(false);
            };
            if !thumbs.remove(file_name) {
                return Ok(false);
            }
            let snapshot = thumbs.clone();
            state.begin_write(&key, Some(snapshot.clone()));
            snapshot
        };
        let persisted = self.persist(&key, &snapshot);
        self.end_write(&key);
        persisted.map(|()| true)
    }

    /// Drop every thumbnail of `folder` from memory and delete its blob.
    pub fn evict_folder(&self, folder: &Folder) -> CacheResult<()> {
        let _writer = self.lock_writer();
        let key = blob_key(folder);
        {
            let mut state = self.lock_state();
            state.forget(&key);
            state.begin_write(&key, None);
        }
        let deleted = self.store.delete(&key);
        self.end_write(&key);
        if deleted? {
            log::debug!("Deleted thumbnails of {}", folder.path.display());
        }
        Ok(())
    }

    /// Whether `folder` has any persisted thumbnails.
    pub fn has_thumbnails(&self, folder: &Folder) -> CacheResult<bool> {
        let key = blob_key(folder);
        {
            let state = self.lock_state();
            if let Some(pending) = state.pending.get(&key) {
                return Ok(pending.as_ref().is_some_and(|thumbs| !thumbs.is_empty()));
            }
            if state.folders.contains_key(&key) {
                return Ok(true);
            }
        }
        Ok(self.store.exists(&key)?)
    }

    /// Whether the thumbnails of `folder` are currently held in memory.
    #[must_use]
    pub fn is_loaded(&self, folder: &Folder) -> bool {
        self.lock_state().folders.contains_key(&blob_key(folder))
    }

    /// Number of folders currently held in memory.
    #[must_use]
    pub fn loaded_folder_count(&self) -> usize {
        self.lock_state().folders.len()
    }

    /// Lock the state with the thumbnails of `folder` held in memory.
    ///
    /// When the folder has no blob, an empty map is installed if `create`
    /// is set and `None` is returned otherwise. A blob read while a write
    /// to the same key started is discarded and read again.
    fn lock_folder(
        &self,
        folder: &Folder,
        key: &str,
        create: bool,
    ) -> CacheResult<Option<MutexGuard<'_, CacheState>>> {
        loop {
            let generation = {
                let mut state = self.lock_state();
                if state.folders.contains_key(key) {
                    return Ok(Some(state));
                }
                if let Some(pending) = state.pending.get(key).cloned() {
                    return Ok(match pending.or_else(|| create.then(FolderThumbnails::new)) {
                        Some(thumbs) => {
                            state.install(key, thumbs, self.capacity);
                            Some(state)
                        }
                        None => None,
                    });
                }
                state.generation(key)
            };

            let loaded = self.read_blob(key)?;

            let mut state = self.lock_state();
            if state.folders.contains_key(key) {
                return Ok(Some(state));
            }
            if state.generation(key) != generation {
                log::trace!(
                    "Thumbnails of {} changed while loading, reading again",
                    folder.path.display()
                );
                continue;
            }
            return Ok(match loaded.or_else(|| create.then(FolderThumbnails::new)) {
                Some(thumbs) => {
                    log::trace!("Loaded thumbnails of {}", folder.path.display());
                    state.install(key, thumbs, self.capacity);
                    Some(state)
                }
                None => None,
            });
        }
    }

    fn read_blob(&self, key: &str) -> CacheResult<Option<FolderThumbnails>> {
        match self.store.read(key)? {
            Some(bytes) => FolderThumbnails::decode(&bytes)
                .map(Some)
                .map_err(|reason| CacheError::Corrupt {
                    key: key.to_string(),
                    reason,
                }),
            None => Ok(None),
        }
    }

    fn persist(&self, key: &str, thumbs: &FolderThumbnails) -> CacheResult<()> {
        if thumbs.is_empty() {
            self.store.delete(key)?;
            return Ok(());
        }
        let bytes = thumbs.encode().map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.write(key, &bytes)?;
        Ok(())
    }

    fn end_write(&self, key: &str) {
        self.lock_state().pending.remove(key);
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
