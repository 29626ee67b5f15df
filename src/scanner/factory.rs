//! Builds catalog records for image files.
//!
//! [`AssetFactory::build`] does all the expensive per-file work of a scan
//! (read, decode, thumbnail, hash) and touches no shared state, so the
//! engine can run it on a worker pool.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use super::codec::{exif_rotation, ImageCodec};
use super::filesystem::FileSystem;
use super::hasher::ContentHasher;
use super::ScanError;
use crate::catalog::{thumbnail_dimensions, Asset, Folder};

/// A freshly built asset and its encoded thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    /// The catalog record
    pub asset: Asset,
    /// JPEG thumbnail bytes
    pub thumbnail: Vec<u8>,
}

/// Turns image files into [`NewAsset`]s.
pub struct AssetFactory {
    fs: Arc<dyn FileSystem>,
    codec: Arc<dyn ImageCodec>,
    hasher: Arc<dyn ContentHasher>,
    max_width: u32,
    max_height: u32,
}

impl std::fmt::Debug for AssetFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetFactory")
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .finish_non_exhaustive()
    }
}

impl AssetFactory {
    /// Create a factory producing thumbnails that fit `max_width` x `max_height`.
    #[must_use]
    pub fn new(
        fs: Arc<dyn FileSystem>,
        codec: Arc<dyn ImageCodec>,
        hasher: Arc<dyn ContentHasher>,
        max_width: u32,
        max_height: u32,
    ) -> Self {
        Self {
            fs,
            codec,
            hasher,
            max_width,
            max_height,
        }
    }

    /// Build the asset of `folder` for the file `file_name` of `dir`.
    ///
    /// `dir` is the directory as enumerated on disk; it may be spelled
    /// differently from `folder.path`.
    ///
    /// # Errors
    ///
    /// * Filesystem errors from reading the file.
    /// * [`ScanError::Codec`] if the image cannot be decoded or the
    ///   thumbnail cannot be encoded.
    pub fn build(
        &self,
        folder: &Folder,
        dir: &Path,
        file_name: &str,
    ) -> Result<NewAsset, ScanError> {
        let path = dir.join(file_name);
        let codec_error = |source| ScanError::Codec {
            path: path.clone(),
            source,
        };

        let bytes = self.fs.read_bytes(&path)?;
        let info = self.codec.decode(&bytes).map_err(codec_error)?;
        let (thumb_width, thumb_height) = thumbnail_dimensions(
            info.pixel_width,
            info.pixel_height,
            self.max_width,
            self.max_height,
        );
        let scaled = self
            .codec
            .decode_scaled(&bytes, thumb_width, thumb_height)
            .map_err(codec_error)?;
        let thumbnail = self.codec.encode_jpeg(&scaled).map_err(codec_error)?;

        let asset = Asset {
            folder_id: folder.folder_id,
            file_name: file_name.to_string(),
            file_size: bytes.len() as u64,
            pixel_width: info.pixel_width,
            pixel_height: info.pixel_height,
            thumbnail_pixel_width: thumb_width,
            thumbnail_pixel_height: thumb_height,
            image_rotation: exif_rotation(&bytes),
            thumbnail_creation_time: Utc::now(),
            content_hash: self.hasher.hash(&bytes),
        };
        log::trace!(
            "Built asset {} ({}x{}, thumbnail {}x{})",
            path.display(),
            asset.pixel_width,
            asset.pixel_height,
            thumb_width,
            thumb_height
        );
        Ok(NewAsset { asset, thumbnail })
    }
}
