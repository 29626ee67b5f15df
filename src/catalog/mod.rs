//! The catalog: folders, assets and the state mirrored to the blob store.
//!
//! # Overview
//!
//! [`CatalogStore`] owns the in-memory index of [`Folder`] and [`Asset`]
//! records, the dirty flag, and the [`ThumbnailCache`](crate::cache::ThumbnailCache)
//! holding each asset's thumbnail. Every read and write of the index goes
//! through one lock; callers share the store behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use photocat::catalog::{CatalogOptions, CatalogStore};
//! use photocat::store::MemoryStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), CatalogOptions::default())?;
//! let folder = catalog.resolve_or_create_folder(Path::new("/photos"));
//! assert_eq!(catalog.resolve_or_create_folder(Path::new("/photos/")), folder);
//! assert!(catalog.has_changes());
//! catalog.save()?;
//! assert!(!catalog.has_changes());
//! # Ok::<(), photocat::catalog::CatalogError>(())
//! ```

pub mod backup;
pub mod model;
pub mod schema;
pub mod store;

use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;

pub use backup::BackupPolicy;
pub use model::{
    thumbnail_dimensions, Asset, AssetPage, Folder, FolderId, ImportDefinition, Rotation,
    ThumbnailedAsset,
};
pub use store::{CatalogOptions, CatalogStore};

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by the catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A persisted row could not be decoded. Loading stops here.
    #[error("corrupt catalog at {location}, table '{table}': {reason} (row: {row})")]
    CorruptCatalog {
        /// Location of the blob store backend
        location: String,
        /// Table the row was read from
        table: &'static str,
        /// The raw row, columns joined with `|`
        row: String,
        /// What was wrong with it
        reason: String,
    },

    /// The asset's folder is not part of the catalog.
    #[error("asset '{file_name}' references unknown folder {folder_id}")]
    InvalidReference {
        /// Folder the asset points at
        folder_id: FolderId,
        /// File name of the asset
        file_name: String,
    },

    /// The persisted catalog was written by a newer version.
    #[error("catalog storage version {found} is newer than supported version {supported}")]
    UnsupportedStorageVersion {
        /// Version found in the store
        found: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// An import definition failed validation.
    #[error("invalid import definition: {0}")]
    InvalidImportDefinition(String),

    /// The blob store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The thumbnail cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
