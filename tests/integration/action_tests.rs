use image::{ImageFormat, Rgb, RgbImage};
use photocat::actions::{ActionError, AssetActions, DeleteConfig};
use photocat::catalog::{BackupPolicy, CatalogOptions, CatalogStore};
use photocat::duplicates::{find_duplicated_assets, DuplicateStats};
use photocat::scanner::{CatalogScanner, ScanConfig};
use photocat::store::{open_store, StorageBackend};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

struct Library {
    photos: TempDir,
    _data: TempDir,
    catalog: Arc<CatalogStore>,
}

impl Library {
    /// Two folders, `inbox` with three images and an empty `album`, scanned.
    fn new() -> Self {
        let photos = tempdir().unwrap();
        let inbox = photos.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        fs::create_dir(photos.path().join("album")).unwrap();
        for (name, shade) in [("a.png", 10u8), ("b.png", 20), ("c.png", 30)] {
            RgbImage::from_pixel(16, 12, Rgb([shade, shade, shade]))
                .save_with_format(inbox.join(name), ImageFormat::Png)
                .unwrap();
        }

        let data = tempdir().unwrap();
        let store = open_store(StorageBackend::Sqlite, data.path()).unwrap();
        let options = CatalogOptions {
            backup: BackupPolicy::disabled(),
            ..CatalogOptions::default()
        };
        let catalog = Arc::new(CatalogStore::open(store, options).unwrap());
        let library = Self {
            photos,
            _data: data,
            catalog,
        };
        library.rescan();
        library
    }

    fn inbox(&self) -> std::path::PathBuf {
        self.photos.path().join("inbox")
    }

    fn album(&self) -> std::path::PathBuf {
        self.photos.path().join("album")
    }

    fn rescan(&self) -> photocat::scanner::ScanSummary {
        CatalogScanner::with_defaults(self.catalog.clone(), ScanConfig::default())
            .scan(&[self.photos.path().to_path_buf()])
            .unwrap()
    }

    fn actions(&self) -> AssetActions {
        AssetActions::new(self.catalog.clone())
    }
}

#[test]
fn test_move_keeps_catalog_in_sync_with_disk() {
    let lib = Library::new();
    let asset = lib.catalog.get_asset(&lib.inbox(), "a.png").unwrap();
    let thumb_before = lib.catalog.load_thumbnail(&lib.inbox(), "a.png").unwrap().unwrap();

    let moved = lib.actions().move_asset(&asset, &lib.album(), false).unwrap().unwrap();
    assert!(!lib.inbox().join("a.png").exists());
    assert!(lib.album().join("a.png").exists());
    assert_eq!(moved.content_hash, asset.content_hash);
    assert!(lib.catalog.get_asset(&lib.inbox(), "a.png").is_none());

    let thumb_after = lib.catalog.load_thumbnail(&lib.album(), "a.png").unwrap().unwrap();
    assert_eq!(thumb_before, thumb_after);
    assert_eq!(lib.catalog.recent_target_paths(), vec![lib.album()]);
    assert!(!lib.catalog.has_changes());

    // The catalog already matches the disk.
    assert_eq!(lib.rescan().total_changes(), 0);
}

#[test]
fn test_copy_creates_duplicates() {
    let lib = Library::new();
    let asset = lib.catalog.get_asset(&lib.inbox(), "b.png").unwrap();
    lib.actions().copy_asset(&asset, &lib.album()).unwrap();
    assert!(lib.inbox().join("b.png").exists());

    let groups = find_duplicated_assets(&lib.catalog);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].paths(),
        vec![lib.album().join("b.png"), lib.inbox().join("b.png")]
    );
    let stats = DuplicateStats::from_groups(&groups);
    assert_eq!(stats.duplicate_count, 1);
    assert_eq!(stats.wasted_bytes, asset.file_size);
}

#[test]
fn test_copy_onto_existing_file_is_refused() {
    let lib = Library::new();
    let asset = lib.catalog.get_asset(&lib.inbox(), "c.png").unwrap();
    fs::write(lib.album().join("c.png"), b"someone else").unwrap();

    let err = lib.actions().copy_asset(&asset, &lib.album()).unwrap_err();
    assert!(matches!(err, ActionError::SourceDestinationCollision { .. }));
    assert_eq!(fs::read(lib.album().join("c.png")).unwrap(), b"someone else");
}

#[test]
fn test_copy_to_new_folder_is_picked_up_by_scan() {
    let lib = Library::new();
    let asset = lib.catalog.get_asset(&lib.inbox(), "a.png").unwrap();
    let fresh = lib.photos.path().join("fresh");
    fs::create_dir(&fresh).unwrap();

    assert!(lib.actions().copy_asset(&asset, &fresh).unwrap().is_none());
    assert!(lib.catalog.get_folder(&fresh).is_none());

    let summary = lib.rescan();
    assert_eq!(summary.created, 1);
    assert!(lib.catalog.get_asset(&fresh, "a.png").is_some());
}

#[test]
fn test_permanent_delete_then_rescan() {
    let lib = Library::new();
    let assets = lib.catalog.list_assets(&lib.catalog.get_folder(&lib.inbox()).unwrap());
    let result = lib
        .actions()
        .delete_assets(&assets[..2], &DeleteConfig::permanent())
        .unwrap();
    assert!(result.all_succeeded());
    assert_eq!(result.success_count(), 2);
    assert!(result.bytes_freed > 0);
    assert!(!lib.inbox().join("a.png").exists());
    assert!(lib.inbox().join("c.png").exists());

    assert_eq!(lib.rescan().total_changes(), 0);
    assert_eq!(lib.catalog.asset_count(), 1);
}

#[test]
fn test_catalog_only_delete_comes_back_on_scan() {
    let lib = Library::new();
    let asset = lib.catalog.get_asset(&lib.inbox(), "a.png").unwrap();
    lib.actions()
        .delete_assets(&[asset], &DeleteConfig::default())
        .unwrap();
    assert!(lib.catalog.get_asset(&lib.inbox(), "a.png").is_none());
    assert!(lib.inbox().join("a.png").exists());

    assert_eq!(lib.rescan().created, 1);
}

#[test]
fn test_delete_refuses_modified_file() {
    let lib = Library::new();
    let asset = lib.catalog.get_asset(&lib.inbox(), "b.png").unwrap();
    fs::write(lib.inbox().join("b.png"), b"overwritten").unwrap();

    let result = lib
        .actions()
        .delete_assets(&[asset], &DeleteConfig::permanent())
        .unwrap();
    assert_eq!(result.failure_count(), 1);
    assert!(Path::new(&lib.inbox().join("b.png")).exists());
    assert!(lib.catalog.get_asset(&lib.inbox(), "b.png").is_some());
}
