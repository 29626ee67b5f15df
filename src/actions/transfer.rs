//! Copying and moving assets between folders.
//!
//! Existing files are never overwritten. When the destination folder is
//! catalogued the copy is catalogued too, reusing the source thumbnail.

use std::path::Path;

use super::{ActionError, AssetActions};
use crate::catalog::Asset;
use crate::scanner::path_utils::clean_folder_path;
use crate::scanner::ScanError;

impl AssetActions {
    /// Copy an asset's file into `destination_dir`.
    ///
    /// Returns the catalogued copy, or `None` when the destination folder is
    /// not part of the catalog.
    ///
    /// # Errors
    ///
    /// See [`AssetActions::move_asset`].
    pub fn copy_asset(
        &self,
        asset: &Asset,
        destination_dir: &Path,
    ) -> Result<Option<Asset>, ActionError> {
        self.move_asset(asset, destination_dir, true)
    }

    /// Move an asset's file into `destination_dir`, keeping the original
    /// when `preserve_original` is set.
    ///
    /// # Errors
    ///
    /// - `SourceNotFound` if the asset's file is missing
    /// - `SourceDestinationCollision` if the destination file exists
    /// - `FileSystem` if copying or deleting fails
    /// - `Catalog` if the asset's folder is unknown or saving fails
    pub fn move_asset(
        &self,
        asset: &Asset,
        destination_dir: &Path,
        preserve_original: bool,
    ) -> Result<Option<Asset>, ActionError> {
        let source_folder = self.folder_of(asset)?;
        let source_path = source_folder.file_path(&asset.file_name);
        let destination_dir = clean_folder_path(destination_dir);
        let destination_path = destination_dir.join(&asset.file_name);

        if !self.fs.exists(&source_path) {
            log::warn!("Cannot transfer {}: file not found", source_path.display());
            return Err(ActionError::SourceNotFound(source_path));
        }
        // The copy itself refuses an existing destination, so a file created
        // after this point is reported the same way.
        match self.fs.copy(&source_path, &destination_path) {
            Ok(()) => {}
            Err(ScanError::AlreadyExists(_)) => {
                log::warn!(
                    "Cannot transfer {}: {} already exists",
                    source_path.display(),
                    destination_path.display()
                );
                return Err(ActionError::SourceDestinationCollision {
                    source_path,
                    destination: destination_path,
                });
            }
            Err(e) => return Err(e.into()),
        }
        log::info!(
            "{} {} to {}",
            if preserve_original { "Copied" } else { "Moved" },
            source_path.display(),
            destination_path.display()
        );

        let copy = match self.catalog.get_folder(&destination_dir) {
            Some(destination_folder) => {
                match self
                    .catalog
                    .load_thumbnail(&source_folder.path, &asset.file_name)?
                {
                    Some(thumbnail) => {
                        let copy = Asset {
                            folder_id: destination_folder.folder_id,
                            ..asset.clone()
                        };
                        self.catalog.add_asset(copy.clone(), &thumbnail)?;
                        Some(copy)
                    }
                    None => {
                        log::debug!(
                            "No thumbnail for {}, the next scan will catalogue {}",
                            source_path.display(),
                            destination_path.display()
                        );
                        None
                    }
                }
            }
            None => None,
        };

        if !preserve_original {
            self.fs.delete(&source_path)?;
            self.catalog
                .delete_asset(&source_folder.path, &asset.file_name)?;
        }

        self.catalog.add_recent_target_path(&destination_dir);
        self.catalog.save()?;
        Ok(copy)
    }
}
