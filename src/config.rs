//! Application configuration management.
//!
//! Settings are layered with figment:
//! defaults < `config.toml` < `PHOTOCAT_*` environment variables. CLI flags
//! are applied on top by the binary.
//!
//! ```toml
//! backend = "sqlite"
//! root_paths = ["/home/me/Pictures", "/mnt/photos"]
//! thumbnail_folders_to_keep = 10
//! backup_every_n_days = 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::catalog::{BackupPolicy, CatalogOptions};
use crate::scanner::ScanConfig;
use crate::store::StorageBackend;

/// Prefix of environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "PHOTOCAT_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the catalog, thumbnails and backups.
    pub data_dir: PathBuf,
    /// Blob store backend.
    pub backend: StorageBackend,
    /// Directories scanned when `scan` gets no path.
    pub root_paths: Vec<PathBuf>,
    /// Thumbnail bounding box width.
    pub thumbnail_max_width: u32,
    /// Thumbnail bounding box height.
    pub thumbnail_max_height: u32,
    /// Folders whose thumbnails stay in memory.
    pub thumbnail_folders_to_keep: usize,
    /// Assets per page when listing a folder.
    pub page_size: usize,
    /// Days between catalog backups; 0 disables backups.
    pub backup_every_n_days: u32,
    /// Number of backups kept.
    pub backups_to_keep: usize,
    /// Threads used to build new assets during a scan.
    pub io_threads: usize,
    /// Scan hidden files and folders.
    pub include_hidden: bool,
    /// Re-catalogue files whose size changed.
    pub detect_modified: bool,
    /// Rescan catalogued folders outside the scanned roots.
    pub rescan_catalogued_folders: bool,
}

impl Default for Config {
    fn default() -> Self {
        let catalog = CatalogOptions::default();
        let scan = ScanConfig::default();
        Self {
            data_dir: default_data_dir(),
            backend: StorageBackend::default(),
            root_paths: UserDirs::new()
                .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf))
                .into_iter()
                .collect(),
            thumbnail_max_width: catalog.thumbnail_max_width,
            thumbnail_max_height: catalog.thumbnail_max_height,
            thumbnail_folders_to_keep: catalog.thumbnail_folders_to_keep,
            page_size: 100,
            backup_every_n_days: catalog.backup.every_n_days,
            backups_to_keep: catalog.backup.backups_to_keep,
            io_threads: scan.io_threads,
            include_hidden: scan.include_hidden,
            detect_modified: scan.detect_modified,
            rescan_catalogued_folders: scan.rescan_catalogued_folders,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "photocat", "photocat")
}

fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".photocat"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

impl Config {
    /// Default platform-specific configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layered figment for `path` (or the default file when `None`).
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = path.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration.
    ///
    /// A missing file is not an error; defaults and the environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment variable holds an
    /// invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .context("invalid configuration")?;
        log::debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    /// Catalog tunables.
    #[must_use]
    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            thumbnail_max_width: self.thumbnail_max_width.max(1),
            thumbnail_max_height: self.thumbnail_max_height.max(1),
            thumbnail_folders_to_keep: self.thumbnail_folders_to_keep,
            backup: BackupPolicy {
                every_n_days: self.backup_every_n_days,
                backups_to_keep: self.backups_to_keep,
            },
        }
    }

    /// Scan settings.
    #[must_use]
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::default()
            .with_io_threads(self.io_threads)
            .with_include_hidden(self.include_hidden)
            .with_detect_modified(self.detect_modified)
            .with_rescan_catalogued_folders(self.rescan_catalogued_folders)
    }
}
