//! Per-folder thumbnail map and its blob encoding.
//!
//! A folder blob is a JSON object mapping each file name to the base64 of
//! its encoded thumbnail:
//!
//! ```json
//! { "a.jpg": "/9j/4AAQ...", "b.png": "/9j/4AAQ..." }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encoded thumbnail bytes, shared between the cache and its readers.
pub type Thumbnail = Arc<[u8]>;

/// Thumbnails of one folder, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderThumbnails {
    entries: HashMap<String, Thumbnail>,
}

impl FolderThumbnails {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Thumbnail of `file_name`, if present.
    #[must_use]
    pub fn get(&self, file_name: &str) -> Option<&Thumbnail> {
        self.entries.get(file_name)
    }

    /// Insert or replace a thumbnail.
    pub fn insert(&mut self, file_name: &str, thumbnail: Thumbnail) {
        self.entries.insert(file_name.to_string(), thumbnail);
    }

    /// Remove a thumbnail. Returns `true` if one was present.
    pub fn remove(&mut self, file_name: &str) -> bool {
        self.entries.remove(file_name).is_some()
    }

    /// Whether `file_name` has a thumbnail.
    #[must_use]
    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains_key(file_name)
    }

    /// Number of thumbnails.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the folder has no thumbnails.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the blob format. Keys are written in sorted order.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let encoded: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), STANDARD.encode(bytes)))
            .collect();
        serde_json::to_vec(&encoded)
    }

    /// Parse the blob format.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let encoded: HashMap<String, String> =
            serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        let mut entries = HashMap::with_capacity(encoded.len());
        for (name, data) in encoded {
            let raw = STANDARD
                .decode(data.as_bytes())
                .map_err(|e| format!("thumbnail of '{name}': {e}"))?;
            entries.insert(name, Thumbnail::from(raw));
        }
        Ok(Self { entries })
    }
}
