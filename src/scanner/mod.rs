//! Scanner module: reconciles the catalog with the filesystem.
//!
//! This module provides functionality for:
//! - Listing directories one level at a time (walkdir)
//! - Decoding images and rendering thumbnails (image, kamadak-exif)
//! - Content hashing with BLAKE3
//! - Unicode path normalization
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`engine`]: The [`CatalogScanner`] directory work-list and diff
//! - [`factory`]: Builds an [`Asset`](crate::catalog::Asset) and its thumbnail from a file
//! - [`filesystem`]: The [`FileSystem`] collaborator and its local implementation
//! - [`codec`]: The [`ImageCodec`] collaborator and its `image` crate implementation
//! - [`hasher`]: The [`ContentHasher`] collaborator (BLAKE3)
//! - [`path_utils`]: NFC path normalization
//!
//! # Example
//!
//! ```no_run
//! use photocat::catalog::{CatalogOptions, CatalogStore};
//! use photocat::scanner::{CatalogScanner, ScanConfig};
//! use photocat::store::{open_store, StorageBackend};
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! let store = open_store(StorageBackend::FlatFile, Path::new("/tmp/photocat"))?;
//! let catalog = Arc::new(CatalogStore::open(store, CatalogOptions::default())?);
//! let scanner = CatalogScanner::with_defaults(catalog, ScanConfig::default());
//! let summary = scanner.scan(&[PathBuf::from("/home/me/Pictures")])?;
//! println!("{} new, {} removed", summary.created, summary.deleted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod engine;
pub mod factory;
pub mod filesystem;
pub mod hasher;
pub mod path_utils;

use std::path::{Path, PathBuf};

use crate::catalog::{Asset, CatalogError, Folder};

// Re-export main types
pub use codec::{exif_rotation, CodecError, ImageCodec, ImageCrateCodec, ImageInfo, RgbImage};
pub use engine::{CatalogScanner, ScanSummary};
pub use factory::{AssetFactory, NewAsset};
pub use filesystem::{FileSystem, LocalFileSystem};
pub use hasher::{Blake3Hasher, ContentHasher};

/// File extensions catalogued by the scanner, lowercase.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "gif"];

/// Whether `file_name` has one of the [`IMAGE_EXTENSIONS`] (case-insensitive).
///
/// # Example
///
/// ```
/// use photocat::scanner::is_image_file_name;
///
/// assert!(is_image_file_name("IMG_0001.JPG"));
/// assert!(!is_image_file_name("IMG_0001.jpeg"));
/// assert!(!is_image_file_name("notes.txt"));
/// ```
#[must_use]
pub fn is_image_file_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// A change the scanner made to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogChange {
    /// A new file was catalogued.
    Created {
        /// Folder the asset belongs to
        folder: Folder,
        /// The new asset
        asset: Asset,
        /// On the first scan of a folder, every asset catalogued in it so
        /// far (including this one), so a listener can fill an empty view
        /// in one go.
        folder_assets: Option<Vec<Asset>>,
    },
    /// A catalogued file changed on disk and was re-catalogued.
    Updated {
        /// Folder the asset belongs to
        folder: Folder,
        /// The asset as re-catalogued
        asset: Asset,
    },
    /// A catalogued file disappeared from disk.
    Deleted {
        /// Folder the asset belonged to
        folder: Folder,
        /// The removed asset
        asset: Asset,
    },
}

impl CatalogChange {
    /// The asset this change is about.
    #[must_use]
    pub fn asset(&self) -> &Asset {
        match self {
            Self::Created { asset, .. } | Self::Updated { asset, .. } | Self::Deleted { asset, .. } => {
                asset
            }
        }
    }

    /// The folder this change happened in.
    #[must_use]
    pub fn folder(&self) -> &Folder {
        match self {
            Self::Created { folder, .. }
            | Self::Updated { folder, .. }
            | Self::Deleted { folder, .. } => folder,
        }
    }

    /// Full path of the affected file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.folder().file_path(&self.asset().file_name)
    }
}

/// Configuration for a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Threads used to decode, thumbnail and hash new files.
    pub io_threads: usize,
    /// Also scan hidden files and directories (names starting with `.`).
    pub include_hidden: bool,
    /// Re-catalogue files whose size changed since they were catalogued.
    pub detect_modified: bool,
    /// After the roots, also rescan catalogued folders outside them.
    pub rescan_catalogued_folders: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            include_hidden: false,
            detect_modified: true,
            rescan_catalogued_folders: true,
        }
    }
}

impl ScanConfig {
    /// Set the number of worker threads (at least one).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Include or skip hidden entries.
    #[must_use]
    pub fn with_include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Enable or disable size-based modification detection.
    #[must_use]
    pub fn with_detect_modified(mut self, detect: bool) -> Self {
        self.detect_modified = detect;
        self
    }

    /// Enable or disable rescanning catalogued folders outside the roots.
    #[must_use]
    pub fn with_rescan_catalogued_folders(mut self, rescan: bool) -> Self {
        self.rescan_catalogued_folders = rescan;
        self
    }
}

/// Errors that can occur during scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file that must be created already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A file could not be decoded or its thumbnail encoded.
    #[error("Cannot process image {path}: {source}")]
    Codec {
        /// Image file
        path: PathBuf,
        /// The underlying codec error
        #[source]
        source: CodecError,
    },

    /// The catalog rejected an update.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The scan was cancelled.
    #[error("Scan interrupted")]
    Interrupted,
}

impl ScanError {
    /// Whether the error means the path is missing or unreadable, as opposed
    /// to a failure of the catalog itself.
    #[must_use]
    pub fn is_filesystem_unavailable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::NotFound(_) | Self::NotADirectory(_) | Self::Io { .. }
        )
    }
}

/// Map an I/O error on `path` to the matching [`ScanError`].
pub(crate) fn io_error(path: &Path, error: std::io::Error) -> ScanError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
        ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
        ErrorKind::AlreadyExists => ScanError::AlreadyExists(path.to_path_buf()),
        _ => ScanError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}
