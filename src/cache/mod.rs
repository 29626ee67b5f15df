//! Thumbnail caching module for photocat.
//!
//! Decoded thumbnails are kept in memory per folder and backed by one blob
//! per folder in the [`BlobStore`](crate::store::BlobStore), so browsing a
//! folder never re-decodes full-resolution images.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`thumbnails`]: The [`ThumbnailCache`] with its folder-granular
//!   recency queue and write-through persistence.
//! * [`entry`]: The per-folder thumbnail map and its blob encoding.
//!
//! # Eviction
//!
//! Folders are enqueued the first time their thumbnails are touched. When
//! more than `capacity` folders are queued, the oldest one is dropped from
//! memory in full. Durable blobs are never removed by eviction; a later
//! access simply reads the blob again.

pub mod entry;
pub mod thumbnails;

use thiserror::Error;

use crate::store::StoreError;

pub use entry::{FolderThumbnails, Thumbnail};
pub use thumbnails::{blob_key, ThumbnailCache, THUMBNAILS_PREFIX};

/// Result alias for thumbnail cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the thumbnail cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing blob store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A folder thumbnail blob could not be decoded.
    #[error("corrupt thumbnail blob '{key}': {reason}")]
    Corrupt {
        /// Blob key
        key: String,
        /// What was wrong with it
        reason: String,
    },
}
