//! Asset deletion using the trash crate.
//!
//! # Overview
//!
//! Assets can be removed three ways:
//! - From the catalog only, leaving the file alone
//! - Moved to the system trash (recoverable)
//! - Permanently deleted
//!
//! File deletions first check that the file still has the catalogued size,
//! so an image replaced since the last scan is never removed by mistake.

use std::path::{Path, PathBuf};

use super::{ActionError, AssetActions};
use crate::catalog::Asset;
use crate::scanner::ScanError;

/// What happens to the file of a deleted asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DeleteMode {
    /// Leave the file on disk.
    #[default]
    CatalogOnly,
    /// Move the file to the system trash.
    Trash,
    /// Remove the file permanently.
    Permanent,
}

/// Configuration for deletion operations.
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    /// What to do with the files.
    pub mode: DeleteMode,
    /// Refuse to delete files whose size differs from the catalog.
    pub verify_size: bool,
    /// Continue on error (process remaining assets even if some fail).
    pub continue_on_error: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            mode: DeleteMode::CatalogOnly,
            verify_size: true,
            continue_on_error: true,
        }
    }
}

impl DeleteConfig {
    /// Create config for the given mode.
    #[must_use]
    pub fn new(mode: DeleteMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Create config for trash deletion.
    #[must_use]
    pub fn trash() -> Self {
        Self::new(DeleteMode::Trash)
    }

    /// Create config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self::new(DeleteMode::Permanent)
    }

    /// Enable/disable size verification.
    #[must_use]
    pub fn with_verify_size(mut self, verify: bool) -> Self {
        self.verify_size = verify;
        self
    }

    /// Enable/disable continue on error.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// One successfully deleted asset.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// Full path of the asset's file.
    pub path: PathBuf,
    /// The removed catalog record.
    pub asset: Asset,
    /// Whether the file itself was removed.
    pub file_removed: bool,
}

/// Results of a batch deletion.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted assets.
    pub successes: Vec<DeleteOutcome>,
    /// Failed deletions with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes of removed files.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let freed = bytesize::ByteSize(self.bytes_freed);
        if self.all_succeeded() {
            format!("Deleted {} asset(s), freed {freed}", self.success_count())
        } else {
            format!(
                "Deleted {} asset(s), {} failed, freed {freed}",
                self.success_count(),
                self.failure_count()
            )
        }
    }
}

impl AssetActions {
    /// Delete assets and their thumbnails, then save the catalog.
    ///
    /// Per-asset failures are collected in the result; the catalog record is
    /// only removed when the file operation succeeded.
    ///
    /// # Errors
    ///
    /// Returns `Catalog` if the catalog cannot be saved.
    pub fn delete_assets(
        &self,
        assets: &[Asset],
        config: &DeleteConfig,
    ) -> Result<BatchDeleteResult, ActionError> {
        let mut result = BatchDeleteResult::default();

        for asset in assets {
            match self.delete_one(asset, config) {
                Ok(outcome) => {
                    if outcome.file_removed {
                        result.bytes_freed += outcome.asset.file_size;
                    }
                    result.successes.push(outcome);
                }
                Err((path, e)) => {
                    let error_msg = e.to_string();
                    log::warn!("Failed to delete {}: {}", path.display(), error_msg);
                    result.failures.push((path, error_msg));

                    if !config.continue_on_error {
                        log::info!("Stopping batch deletion due to error (continue_on_error=false)");
                        break;
                    }
                }
            }
        }

        if !result.successes.is_empty() {
            self.catalog.save()?;
        }
        log::info!("{}", result.summary());
        Ok(result)
    }

    fn delete_one(
        &self,
        asset: &Asset,
        config: &DeleteConfig,
    ) -> Result<DeleteOutcome, (PathBuf, ActionError)> {
        let folder = self
            .folder_of(asset)
            .map_err(|e| (PathBuf::from(&asset.file_name), e))?;
        let path = folder.file_path(&asset.file_name);
        let fail = |e: ActionError| (path.clone(), e);

        let file_removed = match config.mode {
            DeleteMode::CatalogOnly => false,
            DeleteMode::Trash | DeleteMode::Permanent => {
                if config.verify_size {
                    self.verify_size(&path, asset.file_size).map_err(fail)?;
                }
                if config.mode == DeleteMode::Trash {
                    trash::delete(&path).map_err(|e| {
                        fail(ActionError::Trash {
                            path: path.clone(),
                            message: e.to_string(),
                        })
                    })?;
                    log::info!("Moved to trash: {}", path.display());
                } else {
                    self.fs.delete(&path).map_err(|e| fail(e.into()))?;
                    log::info!("Permanently deleted: {}", path.display());
                }
                true
            }
        };

        let removed = self
            .catalog
            .delete_asset(&folder.path, &asset.file_name)
            .map_err(|e| fail(e.into()))?;
        Ok(DeleteOutcome {
            path: path.clone(),
            asset: removed.unwrap_or_else(|| asset.clone()),
            file_removed,
        })
    }

    fn verify_size(&self, path: &Path, expected: u64) -> Result<(), ActionError> {
        let actual = self.fs.file_size(path).map_err(|e| match e {
            ScanError::NotFound(p) => ActionError::SourceNotFound(p),
            other => other.into(),
        })?;
        if actual != expected {
            log::warn!(
                "File modified since it was catalogued: {} (size changed from {} to {})",
                path.display(),
                expected,
                actual
            );
            return Err(ActionError::Modified(path.to_path_buf()));
        }
        Ok(())
    }
}
