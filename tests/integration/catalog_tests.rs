use chrono::{NaiveDate, Utc};
use photocat::catalog::{
    Asset, BackupPolicy, CatalogError, CatalogOptions, CatalogStore, FolderId, ImportDefinition,
    Rotation,
};
use photocat::store::{open_store, BlobStore, MemoryStore, StorageBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn options() -> CatalogOptions {
    CatalogOptions {
        backup: BackupPolicy::disabled(),
        ..CatalogOptions::default()
    }
}

fn asset(folder_id: FolderId, name: &str, size: u64, hash: &str) -> Asset {
    Asset {
        folder_id,
        file_name: name.to_string(),
        file_size: size,
        pixel_width: 1600,
        pixel_height: 1200,
        thumbnail_pixel_width: 200,
        thumbnail_pixel_height: 150,
        image_rotation: Rotation::Rotate90,
        thumbnail_creation_time: Utc::now(),
        content_hash: hash.to_string(),
    }
}

fn populate(catalog: &CatalogStore, dir: &Path, names: &[&str]) {
    let folder = catalog.resolve_or_create_folder(dir);
    for (i, name) in names.iter().enumerate() {
        let thumb = format!("thumb of {name}");
        catalog
            .add_asset(asset(folder.folder_id, name, i as u64 + 1, name), thumb.as_bytes())
            .unwrap();
    }
}

fn reopen_roundtrip(backend: StorageBackend) {
    let data = tempdir().unwrap();
    let photos = PathBuf::from("/photos/2024");

    {
        let store = open_store(backend, data.path()).unwrap();
        let catalog = CatalogStore::open(store, options()).unwrap();
        populate(&catalog, &photos, &["b.jpg", "a.png"]);
        catalog.add_recent_target_path(Path::new("/backup"));
        catalog
            .set_import_definitions(vec![ImportDefinition {
                source_directory: PathBuf::from("/camera"),
                destination_directory: PathBuf::from("/photos"),
                include_sub_folders: true,
                delete_assets_not_in_source: false,
            }])
            .unwrap();
        assert!(catalog.has_changes());
        assert!(catalog.save().unwrap());
        assert!(!catalog.has_changes());
    }

    let store = open_store(backend, data.path()).unwrap();
    let catalog = CatalogStore::open(store, options()).unwrap();
    assert!(!catalog.has_changes());
    assert_eq!(catalog.asset_count(), 2);

    let folder = catalog.get_folder(&photos).unwrap();
    let names: Vec<String> = catalog
        .list_assets(&folder)
        .into_iter()
        .map(|a| a.file_name)
        .collect();
    assert_eq!(names, vec!["a.png", "b.jpg"]);

    let a = catalog.get_asset(&photos, "a.png").unwrap();
    assert_eq!(a.image_rotation, Rotation::Rotate90);
    assert_eq!(a.content_hash, "a.png");
    assert_eq!(a.file_size, 2);

    let thumb = catalog.load_thumbnail(&photos, "b.jpg").unwrap().unwrap();
    assert_eq!(&thumb[..], b"thumb of b.jpg");

    assert_eq!(catalog.recent_target_paths(), vec![PathBuf::from("/backup")]);
    assert_eq!(catalog.import_definitions().len(), 1);
    assert!(catalog.import_definitions()[0].include_sub_folders);
}

#[test]
fn test_catalog_persists_flat_file() {
    reopen_roundtrip(StorageBackend::FlatFile);
}

#[test]
fn test_catalog_persists_sqlite() {
    reopen_roundtrip(StorageBackend::Sqlite);
}

#[test]
fn test_fresh_catalog_is_written_on_open() {
    let data = tempdir().unwrap();
    let store = open_store(StorageBackend::FlatFile, data.path()).unwrap();
    let catalog = CatalogStore::open(store.clone(), options()).unwrap();
    assert!(!catalog.has_changes());
    assert!(store.exists("storage_version").unwrap());
    assert_eq!(catalog.list_folders(), Vec::new());
}

#[test]
fn test_resolve_or_create_folder_normalizes_paths() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    let a = catalog.resolve_or_create_folder(Path::new("/photos/café/"));
    let b = catalog.resolve_or_create_folder(Path::new("/photos/./cafe\u{0301}"));
    assert_eq!(a.folder_id, b.folder_id);
    assert_eq!(catalog.list_folders().len(), 1);
}

#[test]
fn test_subfolders_and_hidden() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    for path in ["/p", "/p/a", "/p/.cache", "/p/a/deep", "/q"] {
        catalog.resolve_or_create_folder(Path::new(path));
    }
    let visible: Vec<PathBuf> = catalog
        .list_subfolders(Path::new("/p"), false)
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(visible, vec![PathBuf::from("/p/a")]);
    assert_eq!(catalog.list_subfolders(Path::new("/p"), true).len(), 2);
}

#[test]
fn test_delete_folder_cascades() {
    let store = Arc::new(MemoryStore::new());
    let catalog = CatalogStore::open(store.clone(), options()).unwrap();
    populate(&catalog, Path::new("/p"), &["a.jpg", "b.jpg"]);
    populate(&catalog, Path::new("/q"), &["c.jpg"]);
    catalog.save().unwrap();

    let folder = catalog.get_folder(Path::new("/p")).unwrap();
    assert_eq!(catalog.delete_folder(&folder).unwrap(), 2);
    assert!(catalog.get_folder(Path::new("/p")).is_none());
    assert_eq!(catalog.asset_count(), 1);
    assert!(!store
        .blob_keys()
        .iter()
        .any(|k| k.ends_with(&folder.thumbnails_blob_name())));
}

#[test]
fn test_add_asset_to_unknown_folder_fails() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    let err = catalog
        .add_asset(asset(FolderId::new(), "x.jpg", 1, "h"), b"t")
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidReference { .. }));
    assert_eq!(catalog.asset_count(), 0);

    // add_asset_to catalogues the folder and re-points the asset.
    let added = catalog
        .add_asset_to(Path::new("/new"), asset(FolderId::new(), "x.jpg", 1, "h"), b"t")
        .unwrap();
    assert_eq!(
        Some(added.folder_id),
        catalog.get_folder(Path::new("/new")).map(|f| f.folder_id)
    );
}

#[test]
fn test_delete_asset_twice() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    populate(&catalog, Path::new("/p"), &["a.jpg"]);
    catalog.save().unwrap();

    assert!(catalog.delete_asset(Path::new("/p"), "a.jpg").unwrap().is_some());
    assert!(catalog.has_changes());
    catalog.save().unwrap();
    assert!(catalog.delete_asset(Path::new("/p"), "a.jpg").unwrap().is_none());
    assert!(!catalog.has_changes());
    assert!(catalog.load_thumbnail(Path::new("/p"), "a.jpg").unwrap().is_none());
}

#[test]
fn test_pagination_pages_in_name_order() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    populate(&catalog, Path::new("/p"), &["e.jpg", "a.jpg", "d.jpg", "b.jpg", "c.jpg"]);

    let first = catalog.list_assets_paginated(Path::new("/p"), 0, 2).unwrap();
    let names: Vec<&str> = first.items.iter().map(|i| i.asset.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    assert_eq!(first.total_count, 5);
    assert_eq!(first.page_count(), 3);

    let last = catalog.list_assets_paginated(Path::new("/p"), 2, 2).unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(&last.items[0].thumbnail[..], b"thumb of e.jpg");

    let beyond = catalog.list_assets_paginated(Path::new("/p"), 9, 2).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_count, 5);
}

#[test]
fn test_pagination_creates_unknown_folder() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    let page = catalog
        .list_assets_paginated(Path::new("/never/seen"), 0, 10)
        .unwrap();
    assert!(page.items.is_empty());
    assert!(catalog.get_folder(Path::new("/never/seen")).is_some());
}

#[test]
fn test_missing_thumbnail_removes_asset() {
    let store = Arc::new(MemoryStore::new());
    let catalog = CatalogStore::open(store.clone(), options()).unwrap();
    populate(&catalog, Path::new("/p"), &["a.jpg", "b.jpg"]);
    catalog.save().unwrap();
    let folder = catalog.get_folder(Path::new("/p")).unwrap();

    // Losing the thumbnail blob behind the cache's back.
    drop(catalog);
    for key in store.blob_keys() {
        if key.ends_with(&folder.thumbnails_blob_name()) {
            store.delete(&key).unwrap();
        }
    }

    let catalog = CatalogStore::open(store, options()).unwrap();
    let page = catalog.list_assets_paginated(Path::new("/p"), 0, 10).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(catalog.asset_count(), 0);
    assert!(!catalog.has_changes());
}

#[test]
fn test_import_definitions_rejected() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    let same = ImportDefinition {
        source_directory: PathBuf::from("/camera/"),
        destination_directory: PathBuf::from("/camera"),
        include_sub_folders: false,
        delete_assets_not_in_source: false,
    };
    assert!(matches!(
        catalog.set_import_definitions(vec![same]),
        Err(CatalogError::InvalidImportDefinition(_))
    ));
    let empty = ImportDefinition {
        source_directory: PathBuf::new(),
        destination_directory: PathBuf::from("/photos"),
        include_sub_folders: false,
        delete_assets_not_in_source: false,
    };
    assert!(catalog.set_import_definitions(vec![empty]).is_err());
    assert!(catalog.import_definitions().is_empty());
}

#[test]
fn test_recent_target_paths_most_recent_first() {
    let catalog = CatalogStore::open(Arc::new(MemoryStore::new()), options()).unwrap();
    for i in 0..25 {
        catalog.add_recent_target_path(&PathBuf::from(format!("/t/{i}")));
    }
    catalog.add_recent_target_path(Path::new("/t/10/"));
    let recent = catalog.recent_target_paths();
    assert_eq!(recent.len(), 20);
    assert_eq!(recent[0], PathBuf::from("/t/10"));
    assert_eq!(recent[1], PathBuf::from("/t/24"));
    assert_eq!(recent.iter().filter(|p| **p == Path::new("/t/10")).count(), 1);
}

#[test]
fn test_unsupported_storage_version() {
    let store = Arc::new(MemoryStore::new());
    store.write("storage_version", b"99").unwrap();
    let err = CatalogStore::open(store, options()).unwrap_err();
    assert!(matches!(
        err,
        CatalogError::UnsupportedStorageVersion { found: 99, .. }
    ));
}

#[test]
fn test_corrupt_row_reports_table() {
    let store = Arc::new(MemoryStore::new());
    store.put_raw_table(
        &photocat::catalog::schema::FOLDER_TABLE,
        vec![vec!["not-a-uuid".to_string(), "/p".to_string()]],
    );
    match CatalogStore::open(store, options()) {
        Err(CatalogError::CorruptCatalog { table, .. }) => assert_eq!(table, "Folder"),
        other => panic!("expected corrupt catalog, got {other:?}"),
    }
}

#[test]
fn test_undecodable_table_file_reports_row() {
    let data = tempdir().unwrap();
    {
        let store = open_store(StorageBackend::FlatFile, data.path()).unwrap();
        let catalog = CatalogStore::open(store, options()).unwrap();
        populate(&catalog, Path::new("/photos"), &["a.jpg"]);
        catalog.save().unwrap();
    }
    let table = data.path().join("Tables/Asset.db");
    let mut raw = std::fs::read(&table).unwrap();
    raw.extend_from_slice(b"broken\xfe|row\n");
    std::fs::write(&table, raw).unwrap();

    let store = open_store(StorageBackend::FlatFile, data.path()).unwrap();
    match CatalogStore::open(store, options()) {
        Err(CatalogError::CorruptCatalog { table, row, .. }) => {
            assert_eq!(table, "Asset");
            assert!(row.ends_with("|row"));
        }
        other => panic!("expected corrupt catalog, got {other:?}"),
    }
}

#[test]
fn test_legacy_rows_are_migrated() {
    let store = Arc::new(MemoryStore::new());
    let folder_id = FolderId::new();
    store.put_raw_table(
        &photocat::catalog::schema::FOLDER_TABLE,
        vec![vec![folder_id.to_string(), "/p".to_string()]],
    );
    store.put_raw_table(
        &photocat::catalog::schema::ASSET_TABLE,
        vec![vec![
            folder_id.to_string(),
            "old.jpg".to_string(),
            "10".to_string(),
            "1000".to_string(),
            "500".to_string(),
            "2020-01-01T00:00:00Z".to_string(),
            "abc".to_string(),
        ]],
    );

    let catalog = CatalogStore::open(store.clone(), options()).unwrap();
    assert!(catalog.has_changes());
    let old = catalog.get_asset(Path::new("/p"), "old.jpg").unwrap();
    assert_eq!((old.thumbnail_pixel_width, old.thumbnail_pixel_height), (200, 100));
    assert_eq!(old.image_rotation, Rotation::Rotate0);

    catalog.save().unwrap();
    assert_eq!(store.read("storage_version").unwrap().unwrap(), b"2");
}

#[test]
fn test_save_takes_backup_when_due() {
    let data = tempdir().unwrap();
    let store = open_store(StorageBackend::FlatFile, data.path()).unwrap();
    let catalog = CatalogStore::open(
        store.clone(),
        CatalogOptions {
            backup: BackupPolicy {
                every_n_days: 7,
                backups_to_keep: 1,
            },
            ..CatalogOptions::default()
        },
    )
    .unwrap();

    let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
    populate(&catalog, Path::new("/p"), &["a.jpg"]);
    assert!(catalog.save_on(day(1)).unwrap());
    assert_eq!(store.backup_dates().unwrap(), vec![day(1)]);

    // Not due yet.
    populate(&catalog, Path::new("/p"), &["b.jpg"]);
    catalog.save_on(day(3)).unwrap();
    assert_eq!(store.backup_dates().unwrap(), vec![day(1)]);

    // Due again; the older backup is pruned.
    populate(&catalog, Path::new("/p"), &["c.jpg"]);
    catalog.save_on(day(9)).unwrap();
    assert_eq!(store.backup_dates().unwrap(), vec![day(9)]);
}
