//! The catalog store: in-memory index mirrored to a blob store.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDate};

use super::backup::BackupPolicy;
use super::model::{
    thumbnail_dimensions, Asset, AssetPage, Folder, FolderId, ImportDefinition, ThumbnailedAsset,
};
use super::schema::{
    decode_asset, decode_folder, decode_import, decode_recent_path, encode_asset, encode_folder,
    encode_import, encode_recent_path, DecodeResult, ThumbnailBox, ASSET_TABLE, FOLDER_TABLE,
    IMPORT_TABLE, RECENT_TARGET_PATHS_TABLE, STORAGE_VERSION, STORAGE_VERSION_KEY,
};
use super::{CatalogError, CatalogResult};
use crate::cache::{Thumbnail, ThumbnailCache};
use crate::scanner::path_utils::{clean_folder_path, path_key};
use crate::store::{BlobStore, Row, StoreError, TableSchema, TableWrite};

/// Number of recent copy/move destinations remembered.
pub const MAX_RECENT_TARGET_PATHS: usize = 20;

/// Tunables of a [`CatalogStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Thumbnail bounding box width
    pub thumbnail_max_width: u32,
    /// Thumbnail bounding box height
    pub thumbnail_max_height: u32,
    /// Folders whose thumbnails stay in memory
    pub thumbnail_folders_to_keep: usize,
    /// Backups taken when saving
    pub backup: BackupPolicy,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            thumbnail_max_width: 200,
            thumbnail_max_height: 150,
            thumbnail_folders_to_keep: 5,
            backup: BackupPolicy::default(),
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    folders: HashMap<FolderId, Folder>,
    /// Keyed by [`path_key`], so NFC and NFD spellings share a folder.
    folder_paths: HashMap<String, FolderId>,
    /// Ordered by folder, then file name.
    assets: BTreeMap<(FolderId, String), Asset>,
    imports: Vec<ImportDefinition>,
    /// Most recent first.
    recent_target_paths: Vec<PathBuf>,
    has_changes: bool,
    stored_version: Option<u32>,
}

impl CatalogState {
    fn folder_by_path(&self, path: &Path) -> Option<&Folder> {
        self.folder_paths
            .get(&path_key(path))
            .and_then(|id| self.folders.get(id))
    }

    fn insert_folder(&mut self, folder: Folder) {
        self.folder_paths.insert(path_key(&folder.path), folder.folder_id);
        self.folders.insert(folder.folder_id, folder);
    }

    fn folder_assets(&self, folder_id: FolderId) -> impl Iterator<Item = &Asset> {
        self.assets
            .range((folder_id, String::new())..)
            .take_while(move |((id, _), _)| *id == folder_id)
            .map(|(_, asset)| asset)
    }
}

/// Catalog of folders and assets.
///
/// Share it between the caller thread and a scan with an `Arc`. All index
/// reads and writes take the same lock; thumbnail I/O happens outside it.
pub struct CatalogStore {
    store: Arc<dyn BlobStore>,
    thumbnails: ThumbnailCache,
    options: CatalogOptions,
    state: Mutex<CatalogState>,
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("location", &self.store.location())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CatalogStore {
    /// Load the catalog persisted in `store`.
    ///
    /// A store without any catalog tables yields an empty catalog, which is
    /// written immediately.
    ///
    /// # Errors
    ///
    /// * [`CatalogError::CorruptCatalog`] if a persisted row is malformed.
    /// * [`CatalogError::UnsupportedStorageVersion`] if the catalog was
    ///   written by a newer layout.
    pub fn open(store: Arc<dyn BlobStore>, options: CatalogOptions) -> CatalogResult<Self> {
        let (state, fresh) = Self::load_state(store.as_ref(), &options)?;
        log::debug!(
            "Loaded catalog from {}: {} folders, {} assets",
            store.location(),
            state.folders.len(),
            state.assets.len()
        );

        let catalog = Self {
            thumbnails: ThumbnailCache::new(store.clone(), options.thumbnail_folders_to_keep),
            store,
            options,
            state: Mutex::new(state),
        };

        if fresh {
            log::info!("Creating new catalog at {}", catalog.location());
            let mut state = catalog.lock();
            catalog.write_state(&mut state)?;
            drop(state);
        }
        Ok(catalog)
    }

    fn load_state(
        store: &dyn BlobStore,
        options: &CatalogOptions,
    ) -> CatalogResult<(CatalogState, bool)> {
        let location = store.location();
        let corrupt = |table: &'static str, row: &Row, reason: String| CatalogError::CorruptCatalog {
            location: location.clone(),
            table,
            row: row.join("|"),
            reason,
        };

        let stored_version = match store.read(STORAGE_VERSION_KEY)? {
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                let version = text.parse::<u32>().map_err(|_| {
                    corrupt(
                        STORAGE_VERSION_KEY,
                        &vec![text.clone()],
                        "invalid storage version".to_string(),
                    )
                })?;
                if version > STORAGE_VERSION {
                    return Err(CatalogError::UnsupportedStorageVersion {
                        found: version,
                        supported: STORAGE_VERSION,
                    });
                }
                Some(version)
            }
            None => None,
        };

        let read_rows = |schema: &TableSchema| match store.read_table(schema) {
            Err(StoreError::MalformedRow { row, source, .. }) => {
                Err(CatalogError::CorruptCatalog {
                    location: location.clone(),
                    table: schema.name,
                    row,
                    reason: source.to_string(),
                })
            }
            other => other.map_err(CatalogError::from),
        };
        let folder_rows = read_rows(&FOLDER_TABLE)?;
        let asset_rows = read_rows(&ASSET_TABLE)?;
        let import_rows = read_rows(&IMPORT_TABLE)?;
        let recent_rows = read_rows(&RECENT_TARGET_PATHS_TABLE)?;
        let fresh = stored_version.is_none()
            && folder_rows.is_none()
            && asset_rows.is_none()
            && import_rows.is_none()
            && recent_rows.is_none();

        let mut state = CatalogState {
            stored_version,
            has_changes: !fresh && stored_version != Some(STORAGE_VERSION),
            ..CatalogState::default()
        };

        for row in folder_rows.unwrap_or_default() {
            let mut folder = decode_folder(&row).map_err(|r| corrupt(FOLDER_TABLE.name, &row, r))?;
            folder.path = clean_folder_path(&folder.path);
            if state.folders.contains_key(&folder.folder_id)
                || state.folder_by_path(&folder.path).is_some()
            {
                return Err(corrupt(FOLDER_TABLE.name, &row, "duplicate folder".to_string()));
            }
            state.insert_folder(folder);
        }

        let thumbnail_box = ThumbnailBox {
            max_width: options.thumbnail_max_width,
            max_height: options.thumbnail_max_height,
        };
        let mut migrated = 0usize;
        for row in asset_rows.unwrap_or_default() {
            let decoded =
                decode_asset(&row, thumbnail_box).map_err(|r| corrupt(ASSET_TABLE.name, &row, r))?;
            let asset = decoded.asset;
            if !state.folders.contains_key(&asset.folder_id) {
                log::warn!(
                    "Dropping asset '{}' that references unknown folder {}",
                    asset.file_name,
                    asset.folder_id
                );
                state.has_changes = true;
                continue;
            }
            if state.assets.contains_key(&asset.key()) {
                return Err(corrupt(ASSET_TABLE.name, &row, "duplicate asset".to_string()));
            }
            if decoded.migrated {
                migrated += 1;
            }
            state.assets.insert(asset.key(), asset);
        }
        if migrated > 0 {
            log::info!("Migrated {migrated} asset rows to storage version {STORAGE_VERSION}");
            state.has_changes = true;
        }

        state.imports = decode_all(&IMPORT_TABLE, import_rows, decode_import, &corrupt)?
            .into_iter()
            .map(normalize_import)
            .collect();
        state.recent_target_paths =
            decode_all(&RECENT_TARGET_PATHS_TABLE, recent_rows, decode_recent_path, &corrupt)?
                .into_iter()
                .map(|p| clean_folder_path(&p))
                .collect();

        Ok((state, fresh))
    }

    /// Location of the backing store, for diagnostics.
    #[must_use]
    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Options the catalog was opened with.
    #[must_use]
    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// The thumbnail cache backing this catalog.
    #[must_use]
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Thumbnail size for a source image of the given size.
    #[must_use]
    pub fn thumbnail_size(&self, width: u32, height: u32) -> (u32, u32) {
        thumbnail_dimensions(
            width,
            height,
            self.options.thumbnail_max_width,
            self.options.thumbnail_max_height,
        )
    }

    /// Whether there are unsaved changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.lock().has_changes
    }

    // ---- folders ----

    /// The folder at `path`, created if it is not catalogued yet.
    ///
    /// A new folder keeps the spelling of `path`; an existing one is found
    /// whatever the Unicode normalization of `path`.
    pub fn resolve_or_create_folder(&self, path: &Path) -> Folder {
        let mut state = self.lock();
        if let Some(folder) = state.folder_by_path(path) {
            return folder.clone();
        }
        let folder = Folder::new(FolderId::new(), clean_folder_path(path));
        log::debug!("Cataloguing folder {}", folder.path.display());
        state.insert_folder(folder.clone());
        state.has_changes = true;
        folder
    }

    /// The folder at `path`, if catalogued.
    #[must_use]
    pub fn get_folder(&self, path: &Path) -> Option<Folder> {
        self.lock().folder_by_path(path).cloned()
    }

    /// The folder with the given identifier, if catalogued.
    #[must_use]
    pub fn get_folder_by_id(&self, folder_id: FolderId) -> Option<Folder> {
        self.lock().folders.get(&folder_id).cloned()
    }

    /// All catalogued folders, sorted by path.
    #[must_use]
    pub fn list_folders(&self) -> Vec<Folder> {
        let mut folders: Vec<Folder> = self.lock().folders.values().cloned().collect();
        folders.sort_by(|a, b| a.path.cmp(&b.path));
        folders
    }

    /// Catalogued folders directly inside `parent`, sorted by path.
    #[must_use]
    pub fn list_subfolders(&self, parent: &Path, include_hidden: bool) -> Vec<Folder> {
        let parent = path_key(parent);
        let mut folders: Vec<Folder> = self
            .lock()
            .folders
            .values()
            .filter(|f| f.path.parent().is_some_and(|p| path_key(p) == parent))
            .filter(|f| include_hidden || !f.is_hidden())
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.path.cmp(&b.path));
        folders
    }

    /// Remove a folder, its assets and its thumbnails.
    ///
    /// Returns the number of assets removed with it.
    pub fn delete_folder(&self, folder: &Folder) -> CatalogResult<usize> {
        let removed_assets = {
            let mut state = self.lock();
            match state.folders.remove(&folder.folder_id) {
                Some(existing) => {
                    state.folder_paths.remove(&path_key(&existing.path));
                    let before = state.assets.len();
                    state.assets.retain(|(id, _), _| *id != folder.folder_id);
                    state.has_changes = true;
                    before - state.assets.len()
                }
                None => 0,
            }
        };
        self.thumbnails.evict_folder(folder)?;
        log::debug!(
            "Removed folder {} ({} assets)",
            folder.path.display(),
            removed_assets
        );
        Ok(removed_assets)
    }

    // ---- assets ----

    /// Assets of `folder`, ordered by file name.
    #[must_use]
    pub fn list_assets(&self, folder: &Folder) -> Vec<Asset> {
        self.lock()
            .folder_assets(folder.folder_id)
            .cloned()
            .collect()
    }

    /// Every catalogued asset.
    #[must_use]
    pub fn list_all_assets(&self) -> Vec<Asset> {
        self.lock().assets.values().cloned().collect()
    }

    /// Number of catalogued assets.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.lock().assets.len()
    }

    /// The asset `file_name` in the folder at `folder_path`.
    #[must_use]
    pub fn get_asset(&self, folder_path: &Path, file_name: &str) -> Option<Asset> {
        let state = self.lock();
        let folder_id = state.folder_by_path(folder_path)?.folder_id;
        state
            .assets
            .get(&(folder_id, file_name.to_string()))
            .cloned()
    }

    /// Whether `file_name` is catalogued in the folder at `folder_path`.
    #[must_use]
    pub fn is_asset_catalogued(&self, folder_path: &Path, file_name: &str) -> bool {
        self.get_asset(folder_path, file_name).is_some()
    }

    /// Add an asset and store its thumbnail.
    ///
    /// Replaces any asset with the same identity.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidReference`] if `asset.folder_id` is not a
    /// catalogued folder.
    pub fn add_asset(&self, asset: Asset, thumbnail: &[u8]) -> CatalogResult<()> {
        let invalid = || CatalogError::InvalidReference {
            folder_id: asset.folder_id,
            file_name: asset.file_name.clone(),
        };
        let folder = self.get_folder_by_id(asset.folder_id).ok_or_else(invalid)?;

        self.thumbnails.put(&folder, &asset.file_name, thumbnail)?;

        let mut state = self.lock();
        if !state.folders.contains_key(&asset.folder_id) {
            // Folder removed while the thumbnail was being written.
            return Err(invalid());
        }
        log::trace!("Adding asset {}", folder.file_path(&asset.file_name).display());
        state.assets.insert(asset.key(), asset);
        state.has_changes = true;
        Ok(())
    }

    /// Add an asset to the folder at `folder_path`, cataloguing the folder
    /// if needed and re-pointing the asset at it.
    pub fn add_asset_to(
        &self,
        folder_path: &Path,
        mut asset: Asset,
        thumbnail: &[u8],
    ) -> CatalogResult<Asset> {
        let folder = self.resolve_or_create_folder(folder_path);
        if asset.folder_id != folder.folder_id {
            if self.get_folder_by_id(asset.folder_id).is_none() {
                log::warn!(
                    "Asset '{}' referenced unknown folder {}, attaching it to {}",
                    asset.file_name,
                    asset.folder_id,
                    folder.path.display()
                );
            }
            asset.folder_id = folder.folder_id;
        }
        self.add_asset(asset.clone(), thumbnail)?;
        Ok(asset)
    }

    /// Remove an asset and its thumbnail.
    ///
    /// Returns the removed asset, or `None` (without touching the dirty
    /// flag) if it was not catalogued.
    pub fn delete_asset(
        &self,
        folder_path: &Path,
        file_name: &str,
    ) -> CatalogResult<Option<Asset>> {
        let (folder, removed) = {
            let mut state = self.lock();
            let Some(folder) = state.folder_by_path(folder_path).cloned() else {
                return Ok(None);
            };
            let removed = state
                .assets
                .remove(&(folder.folder_id, file_name.to_string()));
            if removed.is_some() {
                state.has_changes = true;
            }
            (folder, removed)
        };

        if removed.is_some() {
            self.thumbnails.evict(&folder, file_name)?;
            log::trace!("Removed asset {}", folder.file_path(file_name).display());
        }
        Ok(removed)
    }

    /// Thumbnail of one catalogued asset.
    ///
    /// An asset whose thumbnail cannot be found is removed from the catalog
    /// and the catalog is saved; `None` is returned in that case.
    pub fn load_thumbnail(
        &self,
        folder_path: &Path,
        file_name: &str,
    ) -> CatalogResult<Option<Thumbnail>> {
        let Some(folder) = self.get_folder(folder_path) else {
            return Ok(None);
        };
        if !self.is_asset_catalogued(&folder.path, file_name) {
            return Ok(None);
        }
        match self.thumbnails.get_or_load(&folder, file_name)? {
            Some(thumbnail) => Ok(Some(thumbnail)),
            None => {
                self.drop_orphans(&folder, &[file_name.to_string()])?;
                Ok(None)
            }
        }
    }

    /// One page of the assets of `directory`, with their thumbnails.
    ///
    /// The folder is catalogued if needed. Assets of this page without a
    /// thumbnail are removed from the catalog (which is then saved) and left
    /// out of the page. `page_size` is at least one.
    pub fn list_assets_paginated(
        &self,
        directory: &Path,
        page_index: usize,
        page_size: usize,
    ) -> CatalogResult<AssetPage> {
        let page_size = page_size.max(1);
        let folder = self.resolve_or_create_folder(directory);
        let (page, total) = {
            let state = self.lock();
            let total = state.folder_assets(folder.folder_id).count();
            let page: Vec<Asset> = state
                .folder_assets(folder.folder_id)
                .skip(page_index.saturating_mul(page_size))
                .take(page_size)
                .cloned()
                .collect();
            (page, total)
        };

        let mut items = Vec::with_capacity(page.len());
        let mut orphans = Vec::new();
        for asset in page {
            match self.thumbnails.get_or_load(&folder, &asset.file_name)? {
                Some(thumbnail) => items.push(ThumbnailedAsset { asset, thumbnail }),
                None => orphans.push(asset.file_name),
            }
        }
        if !orphans.is_empty() {
            self.drop_orphans(&folder, &orphans)?;
        }

        Ok(AssetPage {
            items,
            page_index,
            total_count: total - orphans.len(),
            page_size,
        })
    }

    fn drop_orphans(&self, folder: &Folder, file_names: &[String]) -> CatalogResult<()> {
        for file_name in file_names {
            log::warn!(
                "Thumbnail missing for {}, removing it from the catalog",
                folder.file_path(file_name).display()
            );
            self.delete_asset(&folder.path, file_name)?;
        }
        self.save()?;
        Ok(())
    }

    // ---- import definitions and recent targets ----

    /// Saved import definitions.
    #[must_use]
    pub fn import_definitions(&self) -> Vec<ImportDefinition> {
        self.lock().imports.clone()
    }

    /// Replace the saved import definitions.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidImportDefinition`] if a definition has an
    /// empty source or destination, or imports a directory into itself.
    pub fn set_import_definitions(&self, definitions: Vec<ImportDefinition>) -> CatalogResult<()> {
        let mut normalized = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if definition.source_directory.as_os_str().is_empty() {
                return Err(CatalogError::InvalidImportDefinition(
                    "source directory is empty".to_string(),
                ));
            }
            if definition.destination_directory.as_os_str().is_empty() {
                return Err(CatalogError::InvalidImportDefinition(
                    "destination directory is empty".to_string(),
                ));
            }
            let definition = normalize_import(definition);
            if path_key(&definition.source_directory)
                == path_key(&definition.destination_directory)
            {
                return Err(CatalogError::InvalidImportDefinition(format!(
                    "{} is both source and destination",
                    definition.source_directory.display()
                )));
            }
            normalized.push(definition);
        }

        let mut state = self.lock();
        if state.imports != normalized {
            state.imports = normalized;
            state.has_changes = true;
        }
        Ok(())
    }

    /// Recently used copy/move destinations, most recent first.
    #[must_use]
    pub fn recent_target_paths(&self) -> Vec<PathBuf> {
        self.lock().recent_target_paths.clone()
    }

    /// Record `path` as the most recent copy/move destination.
    pub fn add_recent_target_path(&self, path: &Path) {
        let path = clean_folder_path(path);
        let key = path_key(&path);
        let mut state = self.lock();
        if state.recent_target_paths.first() == Some(&path) {
            return;
        }
        state.recent_target_paths.retain(|p| path_key(p) != key);
        state.recent_target_paths.insert(0, path);
        state.recent_target_paths.truncate(MAX_RECENT_TARGET_PATHS);
        state.has_changes = true;
    }

    // ---- persistence ----

    /// Persist the catalog if it has unsaved changes, then take a backup if
    /// one is due.
    ///
    /// Returns `true` if something was written.
    pub fn save(&self) -> CatalogResult<bool> {
        self.save_on(Local::now().date_naive())
    }

    /// [`save`](Self::save) with an explicit date for the backup policy.
    pub fn save_on(&self, today: NaiveDate) -> CatalogResult<bool> {
        let mut state = self.lock();
        if !state.has_changes {
            return Ok(false);
        }
        self.write_state(&mut state)?;
        log::debug!(
            "Saved catalog: {} folders, {} assets",
            state.folders.len(),
            state.assets.len()
        );

        if let Err(e) = self.options.backup.apply(self.store.as_ref(), today) {
            log::warn!("Catalog backup failed: {e}");
        }
        Ok(true)
    }

    fn write_state(&self, state: &mut CatalogState) -> CatalogResult<()> {
        let mut folders: Vec<&Folder> = state.folders.values().collect();
        folders.sort_by(|a, b| a.path.cmp(&b.path));

        let tables: [TableWrite<'_>; 4] = [
            (&FOLDER_TABLE, folders.into_iter().map(encode_folder).collect()),
            (&ASSET_TABLE, state.assets.values().map(encode_asset).collect()),
            (&IMPORT_TABLE, state.imports.iter().map(encode_import).collect()),
            (
                &RECENT_TARGET_PATHS_TABLE,
                state
                    .recent_target_paths
                    .iter()
                    .map(|p| encode_recent_path(p))
                    .collect(),
            ),
        ];
        self.store.write_tables(&tables)?;

        if state.stored_version != Some(STORAGE_VERSION) {
            self.store
                .write(STORAGE_VERSION_KEY, STORAGE_VERSION.to_string().as_bytes())?;
            state.stored_version = Some(STORAGE_VERSION);
        }
        state.has_changes = false;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode_all<T>(
    schema: &TableSchema,
    rows: Option<Vec<Row>>,
    decode: fn(&Row) -> DecodeResult<T>,
    corrupt: &dyn Fn(&'static str, &Row, String) -> CatalogError,
) -> CatalogResult<Vec<T>> {
    rows.unwrap_or_default()
        .iter()
        .map(|row| decode(row).map_err(|reason| corrupt(schema.name, row, reason)))
        .collect()
}

fn normalize_import(definition: ImportDefinition) -> ImportDefinition {
    ImportDefinition {
        source_directory: clean_folder_path(&definition.source_directory),
        destination_directory: clean_folder_path(&definition.destination_directory),
        ..definition
    }
}
