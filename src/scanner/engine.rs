//! Catalog scan engine.
//!
//! # Overview
//!
//! [`CatalogScanner::scan`] keeps a work-list of directories seeded with the
//! scan roots. Each directory is diffed against the catalog:
//!
//! 1. Catalogued files missing on disk are removed (`Deleted`).
//! 2. Catalogued files whose size changed are rebuilt (`Updated`).
//! 3. Image files not yet catalogued are built and added (`Created`).
//!
//! Files are built on a bounded rayon pool and applied in enumeration
//! order. A failing directory is logged and counted, its subdirectories
//! are still visited. Cancellation is checked between directories.
//!
//! Directories are opened with the path they were enumerated with; the
//! catalog matches them to folders by [`path_key`], so an NFD name on disk
//! and an NFC name in the catalog still meet.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;

use super::codec::{ImageCodec, ImageCrateCodec};
use super::factory::{AssetFactory, NewAsset};
use super::filesystem::{FileSystem, LocalFileSystem};
use super::hasher::{Blake3Hasher, ContentHasher};
use super::path_utils::{
    clean_folder_path, is_hidden_name, is_hidden_path, normalize_folder_path, path_key,
};
use super::{is_image_file_name, CatalogChange, ScanConfig, ScanError};
use crate::catalog::{Asset, CatalogError, CatalogStore, Folder};
use crate::progress::ProgressCallback;

/// Outcome of a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories reconciled
    pub folders_scanned: usize,
    /// Assets added
    pub created: usize,
    /// Assets rebuilt because their file changed
    pub updated: usize,
    /// Assets removed because their file disappeared
    pub deleted: usize,
    /// Directories or files skipped because of an error
    pub errors: usize,
    /// Wall-clock time of the scan
    pub duration: Duration,
}

impl ScanSummary {
    /// Whether some directories or files could not be processed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.errors > 0
    }

    /// Total number of catalog changes.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// A file to (re)build during one directory step.
#[derive(Debug)]
struct BuildJob {
    file_name: String,
    /// Catalogued asset being replaced, for modified files.
    replaces: Option<Asset>,
}

/// Reconciles a [`CatalogStore`] with the filesystem.
pub struct CatalogScanner {
    catalog: Arc<CatalogStore>,
    fs: Arc<dyn FileSystem>,
    factory: AssetFactory,
    config: ScanConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for CatalogScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogScanner")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl CatalogScanner {
    /// Create a scanner with explicit collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<CatalogStore>,
        fs: Arc<dyn FileSystem>,
        codec: Arc<dyn ImageCodec>,
        hasher: Arc<dyn ContentHasher>,
        config: ScanConfig,
    ) -> Self {
        let options = catalog.options();
        let factory = AssetFactory::new(
            fs.clone(),
            codec,
            hasher,
            options.thumbnail_max_width,
            options.thumbnail_max_height,
        );
        Self {
            catalog,
            fs,
            factory,
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Create a scanner over the local disk with the `image` codec and BLAKE3.
    #[must_use]
    pub fn with_defaults(catalog: Arc<CatalogStore>, config: ScanConfig) -> Self {
        Self::new(
            catalog,
            Arc::new(LocalFileSystem::new()),
            Arc::new(ImageCrateCodec),
            Arc::new(Blake3Hasher::new()),
            config,
        )
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The catalog this scanner updates.
    #[must_use]
    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Scan `roots` recursively, then the catalogued folders outside them.
    ///
    /// # Errors
    ///
    /// [`ScanError::Interrupted`] if the shutdown flag was raised; folders
    /// catalogued before that point are saved first. Failures of single
    /// directories or files are counted in [`ScanSummary::errors`] instead.
    pub fn scan(&self, roots: &[PathBuf]) -> Result<ScanSummary, ScanError> {
        let start = Instant::now();
        let pool = self.build_pool();
        let mut summary = ScanSummary::default();

        let roots: Vec<PathBuf> = roots.iter().map(|r| clean_folder_path(r)).collect();
        log::info!("Scanning {} root(s)", roots.len());

        let walked = self.walk(&roots, &mut summary, pool.as_ref());
        // Visiting a directory catalogues its folder even when no asset
        // changed, so there may be something to persist either way.
        let saved = self.catalog.save();
        walked?;
        saved?;

        summary.duration = start.elapsed();
        log::info!(
            "Scan finished in {:.2?}: {} folders, {} created, {} updated, {} deleted, {} errors",
            summary.duration,
            summary.folders_scanned,
            summary.created,
            summary.updated,
            summary.deleted,
            summary.errors
        );
        if let Some(callback) = &self.progress_callback {
            callback.on_scan_end(&summary);
        }
        Ok(summary)
    }

    /// Drain the roots, then the catalogued folders outside them.
    fn walk(
        &self,
        roots: &[PathBuf],
        summary: &mut ScanSummary,
        pool: Option<&ThreadPool>,
    ) -> Result<(), ScanError> {
        let mut visited = HashSet::new();
        // Reversed so the first root is processed first.
        let mut pending: Vec<PathBuf> = roots.iter().rev().cloned().collect();
        self.drain(&mut pending, &mut visited, summary, pool)?;

        if !self.config.rescan_catalogued_folders {
            return Ok(());
        }
        let root_keys: Vec<PathBuf> = roots.iter().map(|r| normalize_folder_path(r)).collect();
        for folder in self.catalog.list_folders() {
            let key = normalize_folder_path(&folder.path);
            if visited.contains(&path_key(&folder.path))
                || root_keys.iter().any(|root| key.starts_with(root))
            {
                continue;
            }
            if !self.fs.is_dir(&folder.path) {
                log::warn!(
                    "Catalogued folder {} is unavailable, skipping",
                    folder.path.display()
                );
                continue;
            }
            pending.push(folder.path);
            self.drain(&mut pending, &mut visited, summary, pool)?;
        }
        Ok(())
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Failed to create scan thread pool, building files sequentially: {e}");
                None
            }
        }
    }

    /// Process the work-list until it is empty.
    fn drain(
        &self,
        pending: &mut Vec<PathBuf>,
        visited: &mut HashSet<String>,
        summary: &mut ScanSummary,
        pool: Option<&ThreadPool>,
    ) -> Result<(), ScanError> {
        while let Some(dir) = pending.pop() {
            if self.is_shutdown_requested() {
                log::info!("Scan interrupted before {}", dir.display());
                return Err(ScanError::Interrupted);
            }
            let dir = clean_folder_path(&dir);
            if !visited.insert(path_key(&dir)) {
                continue;
            }

            let step = self.scan_directory(&dir, summary, pool);
            let step_failed = step.is_err();
            if let Err(e) = step {
                self.report_error(&format!("Skipping folder {}: {e}", dir.display()), summary);
            }

            match self.fs.list_subdirectories(&dir) {
                Ok(subdirs) => {
                    // Reversed so siblings are visited in enumeration order.
                    for subdir in subdirs.into_iter().rev() {
                        if self.config.include_hidden || !is_hidden_path(&subdir) {
                            pending.push(subdir);
                        }
                    }
                }
                Err(e) if step_failed => {
                    log::debug!("No subdirectories for {}: {e}", dir.display());
                }
                Err(e) => {
                    self.report_error(
                        &format!("Cannot list subfolders of {}: {e}", dir.display()),
                        summary,
                    );
                }
            }
        }
        Ok(())
    }

    fn report_error(&self, message: &str, summary: &mut ScanSummary) {
        log::warn!("{message}");
        summary.errors += 1;
        if let Some(callback) = &self.progress_callback {
            callback.on_message(message);
        }
    }

    fn emit(&self, change: CatalogChange, summary: &mut ScanSummary) {
        match &change {
            CatalogChange::Created { .. } => summary.created += 1,
            CatalogChange::Updated { .. } => summary.updated += 1,
            CatalogChange::Deleted { .. } => summary.deleted += 1,
        }
        log::debug!("{:?} {}", ChangeKind(&change), change.path().display());
        if let Some(callback) = &self.progress_callback {
            callback.on_change(&change);
        }
    }

    /// Reconcile one directory with the catalog.
    fn scan_directory(
        &self,
        dir: &Path,
        summary: &mut ScanSummary,
        pool: Option<&ThreadPool>,
    ) -> Result<(), ScanError> {
        if !self.fs.is_dir(dir) {
            return Err(if self.fs.exists(dir) {
                ScanError::NotADirectory(dir.to_path_buf())
            } else {
                ScanError::NotFound(dir.to_path_buf())
            });
        }

        let folder = self.catalog.resolve_or_create_folder(dir);
        summary.folders_scanned += 1;
        if let Some(callback) = &self.progress_callback {
            callback.on_folder_start(&folder.path);
        }
        log::debug!("Inspecting folder {}", folder.path.display());

        let file_names: Vec<String> = self
            .fs
            .list_file_names(dir)?
            .into_iter()
            .filter(|name| is_image_file_name(name))
            .filter(|name| self.config.include_hidden || !is_hidden_name(name))
            .collect();
        let on_disk: HashSet<&str> = file_names.iter().map(String::as_str).collect();

        let catalogued = self.catalog.list_assets(&folder);
        let first_scan = catalogued.is_empty()
            && !self
                .catalog
                .thumbnails()
                .has_thumbnails(&folder)
                .map_err(CatalogError::from)?;

        let mut changed = false;
        let mut kept = Vec::with_capacity(catalogued.len());
        for asset in catalogued {
            if on_disk.contains(asset.file_name.as_str()) {
                kept.push(asset);
                continue;
            }
            if let Some(removed) = self.catalog.delete_asset(&folder.path, &asset.file_name)? {
                changed = true;
                self.emit(
                    CatalogChange::Deleted {
                        folder: folder.clone(),
                        asset: removed,
                    },
                    summary,
                );
            }
        }

        let jobs = self.plan_jobs(dir, &file_names, kept);
        let mut running: Vec<Asset> = Vec::new();
        for (job, result) in self.build_all(&folder, dir, jobs, pool) {
            let new_asset = match result {
                Ok(new_asset) => new_asset,
                Err(ScanError::Interrupted) => continue,
                Err(e) => {
                    self.report_error(&format!("Skipping file: {e}"), summary);
                    continue;
                }
            };
            let NewAsset { asset, thumbnail } = new_asset;
            self.catalog.add_asset(asset.clone(), &thumbnail)?;
            changed = true;

            let change = if job.replaces.is_some() {
                CatalogChange::Updated {
                    folder: folder.clone(),
                    asset,
                }
            } else {
                let folder_assets = first_scan.then(|| {
                    running.push(asset.clone());
                    running.clone()
                });
                CatalogChange::Created {
                    folder: folder.clone(),
                    asset,
                    folder_assets,
                }
            };
            self.emit(change, summary);
        }

        if changed {
            self.catalog.save()?;
        }
        Ok(())
    }

    /// New files in enumeration order, plus modified ones when enabled.
    fn plan_jobs(&self, dir: &Path, file_names: &[String], kept: Vec<Asset>) -> Vec<BuildJob> {
        let mut kept: std::collections::HashMap<String, Asset> = kept
            .into_iter()
            .map(|asset| (asset.file_name.clone(), asset))
            .collect();

        let mut jobs = Vec::new();
        for name in file_names {
            match kept.remove(name) {
                None => jobs.push(BuildJob {
                    file_name: name.clone(),
                    replaces: None,
                }),
                Some(asset) if self.config.detect_modified => {
                    let path = dir.join(name);
                    match self.fs.file_size(&path) {
                        Ok(size) if size != asset.file_size => {
                            log::debug!(
                                "{} changed size ({} -> {size})",
                                path.display(),
                                asset.file_size
                            );
                            jobs.push(BuildJob {
                                file_name: name.clone(),
                                replaces: Some(asset),
                            });
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("Cannot stat {}: {e}", path.display()),
                    }
                }
                Some(_) => {}
            }
        }
        jobs
    }

    fn build_all(
        &self,
        folder: &Folder,
        dir: &Path,
        jobs: Vec<BuildJob>,
        pool: Option<&ThreadPool>,
    ) -> Vec<(BuildJob, Result<NewAsset, ScanError>)> {
        let build = |job: BuildJob| {
            if self.is_shutdown_requested() {
                return (job, Err(ScanError::Interrupted));
            }
            let result = self.factory.build(folder, dir, &job.file_name);
            (job, result)
        };
        match pool {
            Some(pool) => pool.install(|| jobs.into_par_iter().map(&build).collect()),
            None => jobs.into_iter().map(&build).collect(),
        }
    }
}

/// Short label of a change for log lines.
struct ChangeKind<'a>(&'a CatalogChange);

impl std::fmt::Debug for ChangeKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            CatalogChange::Created { .. } => "Created",
            CatalogChange::Updated { .. } => "Updated",
            CatalogChange::Deleted { .. } => "Deleted",
        })
    }
}
