//! Asset actions module.
//!
//! This module provides functionality for:
//! - Copying and moving catalogued images between folders
//! - Deleting assets from the catalog, to the trash, or permanently
//!
//! Every action keeps the catalog and its thumbnails consistent with the
//! files it touches and saves the catalog when done.
//!
//! ```no_run
//! use photocat::actions::{AssetActions, DeleteConfig};
//! use photocat::catalog::{CatalogOptions, CatalogStore};
//! use photocat::store::{open_store, StorageBackend};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let store = open_store(StorageBackend::FlatFile, Path::new("/tmp/photocat"))?;
//! let catalog = Arc::new(CatalogStore::open(store, CatalogOptions::default())?);
//! let actions = AssetActions::new(catalog.clone());
//!
//! if let Some(asset) = catalog.get_asset(Path::new("/photos"), "IMG_0001.jpg") {
//!     actions.copy_asset(&asset, Path::new("/backup/photos"))?;
//!     let result = actions.delete_assets(&[asset], &DeleteConfig::trash())?;
//!     println!("{}", result.summary());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod delete;
pub mod transfer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{Asset, CatalogError, CatalogStore, Folder};
use crate::scanner::{FileSystem, LocalFileSystem, ScanError};

// Re-export commonly used types
pub use delete::{BatchDeleteResult, DeleteConfig, DeleteMode, DeleteOutcome};

/// Error type for asset actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The asset's file is gone from disk.
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    /// A file with the same name already exists at the destination.
    #[error("destination already exists: {destination} (source {source_path})")]
    SourceDestinationCollision {
        /// File being copied or moved
        source_path: PathBuf,
        /// Existing file at the destination
        destination: PathBuf,
    },

    /// The file changed on disk since it was catalogued.
    #[error("file modified since it was catalogued: {0}")]
    Modified(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    Trash {
        /// File being trashed
        path: PathBuf,
        /// Error reported by the platform
        message: String,
    },

    /// A filesystem operation failed.
    #[error(transparent)]
    FileSystem(#[from] ScanError),

    /// The catalog rejected the update.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ActionError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound(p)
            | Self::Modified(p)
            | Self::SourceDestinationCollision { destination: p, .. }
            | Self::Trash { path: p, .. } => Some(p),
            Self::FileSystem(_) | Self::Catalog(_) => None,
        }
    }
}

/// Copy, move and delete catalogued assets.
pub struct AssetActions {
    catalog: Arc<CatalogStore>,
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for AssetActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetActions")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl AssetActions {
    /// Actions over the local disk.
    #[must_use]
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self::with_file_system(catalog, Arc::new(LocalFileSystem::new()))
    }

    /// Actions over a custom filesystem.
    #[must_use]
    pub fn with_file_system(catalog: Arc<CatalogStore>, fs: Arc<dyn FileSystem>) -> Self {
        Self { catalog, fs }
    }

    /// Folder of a catalogued asset.
    fn folder_of(&self, asset: &Asset) -> Result<Folder, ActionError> {
        self.catalog.get_folder_by_id(asset.folder_id).ok_or_else(|| {
            ActionError::Catalog(CatalogError::InvalidReference {
                folder_id: asset.folder_id,
                file_name: asset.file_name.clone(),
            })
        })
    }
}
