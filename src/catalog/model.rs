//! Catalog records.
//!
//! Folders and assets form an arena: assets point at their folder through a
//! [`FolderId`] and the owning folder is looked up in the catalog when needed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scanner::path_utils::{is_hidden_path, path_key};

/// Number of hex characters of the path digest used in a thumbnail blob name.
const BLOB_NAME_HEX_LEN: usize = 32;

/// Opaque unique identifier of a [`Folder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(Uuid);

impl FolderId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the hyphenated textual form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for FolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A catalogued directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier
    pub folder_id: FolderId,
    /// Absolute, normalized directory path
    pub path: PathBuf,
}

impl Folder {
    /// Create a folder record. `path` is expected to be normalized already.
    #[must_use]
    pub fn new(folder_id: FolderId, path: PathBuf) -> Self {
        Self { folder_id, path }
    }

    /// Name of the blob holding this folder's thumbnails.
    ///
    /// Derived from the path only, so it is stable across runs and backends.
    #[must_use]
    pub fn thumbnails_blob_name(&self) -> String {
        thumbnails_blob_name(&self.path)
    }

    /// Last path component, or the full path for roots.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Whether the folder name starts with `.`.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        is_hidden_path(&self.path)
    }

    /// Full path of a file inside this folder.
    #[must_use]
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }
}

/// Thumbnail blob name for a folder path.
#[must_use]
pub fn thumbnails_blob_name(path: &Path) -> String {
    let digest = blake3::hash(path_key(path).as_bytes()).to_hex();
    format!("{}.bin", &digest[..BLOB_NAME_HEX_LEN])
}

/// Clockwise rotation to apply when displaying an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation
    #[default]
    Rotate0,
    /// Quarter turn clockwise
    Rotate90,
    /// Half turn
    Rotate180,
    /// Three quarter turns clockwise
    Rotate270,
}

impl Rotation {
    /// Persisted spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotate0 => "Rotate0",
            Self::Rotate90 => "Rotate90",
            Self::Rotate180 => "Rotate180",
            Self::Rotate270 => "Rotate270",
        }
    }

    /// Rotation in degrees.
    #[must_use]
    pub fn degrees(self) -> u16 {
        match self {
            Self::Rotate0 => 0,
            Self::Rotate90 => 90,
            Self::Rotate180 => 180,
            Self::Rotate270 => 270,
        }
    }

    /// Map an EXIF `Orientation` value to the rotation that uprights it.
    ///
    /// Mirrored orientations (2, 4, 5, 7) map to the rotation of their
    /// unmirrored counterpart.
    #[must_use]
    pub fn from_exif_orientation(orientation: u32) -> Self {
        match orientation {
            3 | 4 => Self::Rotate180,
            5 | 6 => Self::Rotate90,
            7 | 8 => Self::Rotate270,
            _ => Self::Rotate0,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Rotate0" => Ok(Self::Rotate0),
            "Rotate90" => Ok(Self::Rotate90),
            "Rotate180" => Ok(Self::Rotate180),
            "Rotate270" => Ok(Self::Rotate270),
            other => Err(format!("unknown rotation '{other}'")),
        }
    }
}

/// One catalogued image file.
///
/// Identity is `(folder_id, file_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Owning folder
    pub folder_id: FolderId,
    /// File name inside the folder
    pub file_name: String,
    /// Size of the source file in bytes
    pub file_size: u64,
    /// Width of the source image
    pub pixel_width: u32,
    /// Height of the source image
    pub pixel_height: u32,
    /// Width of the stored thumbnail
    pub thumbnail_pixel_width: u32,
    /// Height of the stored thumbnail
    pub thumbnail_pixel_height: u32,
    /// Display rotation
    pub image_rotation: Rotation,
    /// When the thumbnail was generated
    pub thumbnail_creation_time: DateTime<Utc>,
    /// Hex content fingerprint of the source file
    pub content_hash: String,
}

impl Asset {
    /// Identity key inside the catalog.
    #[must_use]
    pub fn key(&self) -> (FolderId, String) {
        (self.folder_id, self.file_name.clone())
    }
}

/// An asset together with its decoded thumbnail bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailedAsset {
    /// The catalog record
    pub asset: Asset,
    /// Encoded thumbnail (JPEG)
    pub thumbnail: Arc<[u8]>,
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct AssetPage {
    /// Assets of this page that have a thumbnail, in catalog order
    pub items: Vec<ThumbnailedAsset>,
    /// Zero-based page index
    pub page_index: usize,
    /// Number of assets in the folder once orphans were dropped
    pub total_count: usize,
    /// Page size the listing was computed with
    pub page_size: usize,
}

impl AssetPage {
    /// Number of pages needed for `total_count` items.
    #[must_use]
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size)
    }
}

/// A saved import job: copy images from a source tree into a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDefinition {
    /// Directory images are imported from
    pub source_directory: PathBuf,
    /// Directory images are imported into
    pub destination_directory: PathBuf,
    /// Also import from subdirectories of the source
    pub include_sub_folders: bool,
    /// Remove destination images that no longer exist in the source
    pub delete_assets_not_in_source: bool,
}

/// Size of a thumbnail for a `width` x `height` source fitted into a
/// `max_width` x `max_height` box.
///
/// The longer source side is mapped onto the matching side of the box and
/// the other side follows the source aspect ratio, rounded to the nearest
/// pixel. When the aspect ratio of the source is closer to square than the
/// box, the shorter side is bounded instead so the result always fits.
/// Every dimension is at least one pixel.
///
/// # Example
///
/// ```
/// use photocat::catalog::thumbnail_dimensions;
///
/// assert_eq!(thumbnail_dimensions(4000, 3000, 200, 150), (200, 150));
/// assert_eq!(thumbnail_dimensions(1000, 500, 200, 150), (200, 100));
/// assert_eq!(thumbnail_dimensions(600, 1200, 200, 150), (75, 150));
/// ```
#[must_use]
pub fn thumbnail_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let (w, h) = (f64::from(width), f64::from(height));
    let scale = (f64::from(max_width) / w).min(f64::from(max_height) / h);
    let fit = |side: f64, max: u32| ((side * scale).round() as u32).clamp(1, max.max(1));
    (fit(w, max_width), fit(h, max_height))
}
