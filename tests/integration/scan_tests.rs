use image::{ImageFormat, Rgb, RgbImage};
use photocat::catalog::{BackupPolicy, CatalogOptions, CatalogStore};
use photocat::progress::ProgressCallback;
use photocat::scanner::{CatalogChange, CatalogScanner, ScanConfig, ScanError, ScanSummary};
use photocat::store::{open_store, StorageBackend};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
    img.save_with_format(path, format).unwrap();
}

fn open_catalog(data: &Path) -> Arc<CatalogStore> {
    let store = open_store(StorageBackend::FlatFile, data).unwrap();
    let options = CatalogOptions {
        backup: BackupPolicy::disabled(),
        ..CatalogOptions::default()
    };
    Arc::new(CatalogStore::open(store, options).unwrap())
}

fn photo_tree() -> TempDir {
    let dir = tempdir().unwrap();
    write_image(&dir.path().join("wide.png"), 400, 100, ImageFormat::Png);
    write_image(&dir.path().join("tall.jpg"), 60, 120, ImageFormat::Jpeg);
    fs::write(dir.path().join("readme.txt"), b"not an image").unwrap();
    fs::create_dir(dir.path().join("2024")).unwrap();
    write_image(&dir.path().join("2024/anim.gif"), 30, 30, ImageFormat::Gif);
    dir
}

#[derive(Default)]
struct Collect {
    changes: Mutex<Vec<CatalogChange>>,
    ended: Mutex<Option<ScanSummary>>,
}

impl ProgressCallback for Collect {
    fn on_folder_start(&self, _path: &Path) {}

    fn on_change(&self, change: &CatalogChange) {
        self.changes.lock().unwrap().push(change.clone());
    }

    fn on_scan_end(&self, summary: &ScanSummary) {
        *self.ended.lock().unwrap() = Some(summary.clone());
    }
}

#[test]
fn test_scan_real_images() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let scanner = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default());

    let summary = scanner.scan(&[photos.path().to_path_buf()]).unwrap();
    assert_eq!(summary.folders_scanned, 2);
    assert_eq!(summary.created, 3);
    assert_eq!(summary.errors, 0);

    let wide = catalog.get_asset(photos.path(), "wide.png").unwrap();
    assert_eq!((wide.pixel_width, wide.pixel_height), (400, 100));
    assert_eq!((wide.thumbnail_pixel_width, wide.thumbnail_pixel_height), (200, 50));
    assert_eq!(wide.content_hash.len(), 64);

    let tall = catalog.get_asset(photos.path(), "tall.jpg").unwrap();
    assert_eq!((tall.thumbnail_pixel_width, tall.thumbnail_pixel_height), (75, 150));

    let thumb = catalog
        .load_thumbnail(photos.path(), "wide.png")
        .unwrap()
        .unwrap();
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 50));

    assert!(catalog.get_asset(&photos.path().join("2024"), "anim.gif").is_some());
    assert!(catalog.get_asset(photos.path(), "readme.txt").is_none());
}

#[test]
fn test_scan_results_survive_reopen() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    {
        let catalog = open_catalog(data.path());
        CatalogScanner::with_defaults(catalog, ScanConfig::default())
            .scan(&[photos.path().to_path_buf()])
            .unwrap();
    }

    let catalog = open_catalog(data.path());
    assert_eq!(catalog.asset_count(), 3);
    let page = catalog.list_assets_paginated(photos.path(), 0, 10).unwrap();
    let names: Vec<&str> = page.items.iter().map(|i| i.asset.file_name.as_str()).collect();
    assert_eq!(names, vec!["tall.jpg", "wide.png"]);

    // Nothing changed on disk: a second scan is a no-op.
    let collect = Arc::new(Collect::default());
    let summary = CatalogScanner::with_defaults(catalog, ScanConfig::default())
        .with_progress_callback(collect.clone())
        .scan(&[photos.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.total_changes(), 0);
    assert!(collect.changes.lock().unwrap().is_empty());
    assert!(collect.ended.lock().unwrap().is_some());
}

#[test]
fn test_rescan_picks_up_disk_changes() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let scanner = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default());
    scanner.scan(&[photos.path().to_path_buf()]).unwrap();

    fs::remove_file(photos.path().join("tall.jpg")).unwrap();
    write_image(&photos.path().join("wide.png"), 800, 100, ImageFormat::Png);
    write_image(&photos.path().join("new.png"), 10, 10, ImageFormat::Png);

    let collect = Arc::new(Collect::default());
    let summary = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default())
        .with_progress_callback(collect.clone())
        .scan(&[photos.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 1);
    let wide = catalog.get_asset(photos.path(), "wide.png").unwrap();
    assert_eq!(wide.pixel_width, 800);

    let changes = collect.changes.lock().unwrap();
    assert!(matches!(&changes[0], CatalogChange::Deleted { asset, .. } if asset.file_name == "tall.jpg"));
    // Not a first scan, so no running list is attached.
    assert!(changes.iter().all(|c| !matches!(
        c,
        CatalogChange::Created {
            folder_assets: Some(_),
            ..
        }
    )));
}

#[test]
fn test_modified_files_ignored_when_detection_disabled() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let config = ScanConfig::default().with_detect_modified(false);
    let scanner = CatalogScanner::with_defaults(catalog.clone(), config);
    scanner.scan(&[photos.path().to_path_buf()]).unwrap();

    write_image(&photos.path().join("wide.png"), 800, 100, ImageFormat::Png);
    let summary = scanner.scan(&[photos.path().to_path_buf()]).unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(catalog.get_asset(photos.path(), "wide.png").unwrap().pixel_width, 400);
}

#[test]
fn test_corrupt_image_is_skipped() {
    let photos = photo_tree();
    fs::write(photos.path().join("broken.jpg"), b"definitely not a jpeg").unwrap();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());

    let summary = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default())
        .scan(&[photos.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.created, 3);
    assert_eq!(summary.errors, 1);
    assert!(summary.is_partial());
    assert!(catalog.get_asset(photos.path(), "broken.jpg").is_none());
}

#[test]
fn test_missing_and_file_roots() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let missing = photos.path().join("nope");
    let file_root = photos.path().join("readme.txt");

    let summary = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default())
        .scan(&[missing.clone(), file_root, photos.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.errors, 2);
    assert_eq!(summary.created, 3);
    assert!(catalog.get_folder(&missing).is_none());
}

#[test]
fn test_roots_only_leaves_other_folders_alone() {
    let first = photo_tree();
    let second = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let scanner = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default());
    scanner.scan(&[second.path().to_path_buf()]).unwrap();

    write_image(&second.path().join("extra.png"), 5, 5, ImageFormat::Png);
    let roots_only = CatalogScanner::with_defaults(
        catalog.clone(),
        ScanConfig::default().with_rescan_catalogued_folders(false),
    );
    roots_only.scan(&[first.path().to_path_buf()]).unwrap();
    assert!(catalog.get_asset(second.path(), "extra.png").is_none());

    // Default scans revisit every catalogued folder.
    scanner.scan(&[first.path().to_path_buf()]).unwrap();
    assert!(catalog.get_asset(second.path(), "extra.png").is_some());
}

#[test]
fn test_vanished_catalogued_folder_is_skipped() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let scanner = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default());
    scanner.scan(&[photos.path().to_path_buf()]).unwrap();

    let other = tempdir().unwrap();
    fs::remove_dir_all(photos.path().join("2024")).unwrap();
    let summary = scanner.scan(&[other.path().to_path_buf()]).unwrap();
    assert_eq!(summary.errors, 0);
    // The folder stays catalogued until the user removes it.
    assert!(catalog.get_folder(&photos.path().join("2024")).is_some());
}

#[test]
fn test_interrupted_scan() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let flag = Arc::new(AtomicBool::new(true));
    let result = CatalogScanner::with_defaults(catalog.clone(), ScanConfig::default())
        .with_shutdown_flag(flag)
        .scan(&[photos.path().to_path_buf()]);
    assert!(matches!(result, Err(ScanError::Interrupted)));
    assert_eq!(catalog.asset_count(), 0);
}

#[test]
fn test_first_scan_running_list() {
    let photos = photo_tree();
    let data = tempdir().unwrap();
    let catalog = open_catalog(data.path());
    let collect = Arc::new(Collect::default());
    CatalogScanner::with_defaults(catalog, ScanConfig::default().with_io_threads(1))
        .with_progress_callback(collect.clone())
        .scan(&[photos.path().to_path_buf()])
        .unwrap();

    let changes = collect.changes.lock().unwrap();
    let lists: Vec<Vec<PathBuf>> = changes
        .iter()
        .filter_map(|c| match c {
            CatalogChange::Created {
                folder,
                folder_assets: Some(all),
                ..
            } if folder.path == photos.path() => {
                Some(all.iter().map(|a| folder.file_path(&a.file_name)).collect())
            }
            _ => None,
        })
        .collect();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].len(), 1);
    assert_eq!(lists[1].len(), 2);
}
