use chrono::NaiveDate;
use photocat::store::{
    open_store, BlobStore, MemoryStore, Row, StorageBackend, StoreError, TableSchema,
};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const PEOPLE: TableSchema = TableSchema {
    name: "People",
    columns: &["name", "note"],
};

const PLACES: TableSchema = TableSchema {
    name: "Places",
    columns: &["city"],
};

fn row(values: &[&str]) -> Row {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// One instance of every backend, kept alive with its directory.
fn backends() -> Vec<(TempDir, Arc<dyn BlobStore>)> {
    let mut stores: Vec<(TempDir, Arc<dyn BlobStore>)> = Vec::new();
    for backend in [StorageBackend::FlatFile, StorageBackend::Sqlite] {
        let dir = tempdir().unwrap();
        let store = open_store(backend, dir.path()).unwrap();
        stores.push((dir, store));
    }
    stores.push((tempdir().unwrap(), Arc::new(MemoryStore::new())));
    stores
}

#[test]
fn test_blob_lifecycle() {
    for (_dir, store) in backends() {
        let location = store.location();
        assert_eq!(store.read("Thumbnails/x.bin").unwrap(), None, "{location}");
        assert!(!store.exists("Thumbnails/x.bin").unwrap());

        store.write("Thumbnails/x.bin", &[1, 2, 3]).unwrap();
        store.write("Thumbnails/x.bin", &[4, 5]).unwrap();
        assert_eq!(store.read("Thumbnails/x.bin").unwrap(), Some(vec![4, 5]));
        assert!(store.exists("Thumbnails/x.bin").unwrap());

        assert!(store.delete("Thumbnails/x.bin").unwrap());
        assert!(!store.delete("Thumbnails/x.bin").unwrap());
        assert_eq!(store.read("Thumbnails/x.bin").unwrap(), None);
    }
}

#[test]
fn test_invalid_keys_rejected() {
    for (_dir, store) in backends() {
        for key in ["", "../escape", "a//b", "a/./b", "C:\\x", "/abs"] {
            assert!(
                matches!(store.write(key, b"x"), Err(StoreError::InvalidKey(_))),
                "{} accepted '{key}'",
                store.location()
            );
        }
    }
}

#[test]
fn test_tables_roundtrip_with_awkward_values() {
    for (_dir, store) in backends() {
        assert_eq!(store.read_table(&PEOPLE).unwrap(), None);

        let rows = vec![
            row(&["plain", ""]),
            row(&["pipe|inside", "line\nbreak"]),
            row(&["quote \"here\"", "café"]),
        ];
        store
            .write_tables(&[(&PEOPLE, rows.clone()), (&PLACES, Vec::new())])
            .unwrap();
        assert_eq!(store.read_table(&PEOPLE).unwrap(), Some(rows));
        assert_eq!(store.read_table(&PLACES).unwrap(), Some(Vec::new()));
    }
}

#[test]
fn test_write_tables_is_all_or_nothing() {
    for (_dir, store) in backends() {
        store
            .write_tables(&[
                (&PEOPLE, vec![row(&["ann", "first"])]),
                (&PLACES, vec![row(&["Oslo"])]),
            ])
            .unwrap();

        let err = store
            .write_tables(&[
                (&PEOPLE, vec![row(&["bob", "second"])]),
                (&PLACES, vec![row(&["Rome", "extra column"])]),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ColumnCount {
                table: "Places",
                expected: 1,
                actual: 2
            }
        ));

        assert_eq!(
            store.read_table(&PEOPLE).unwrap(),
            Some(vec![row(&["ann", "first"])]),
            "{} kept a partial write",
            store.location()
        );
    }
}

#[test]
fn test_backups() {
    let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    for (_dir, store) in backends() {
        store
            .write_tables(&[(&PEOPLE, vec![row(&["ann", "first"])])])
            .unwrap();
        assert!(store.backup_dates().unwrap().is_empty());

        assert!(store.write_backup(day(5)).unwrap());
        assert!(!store.write_backup(day(5)).unwrap());
        assert!(store.write_backup(day(2)).unwrap());
        assert_eq!(store.backup_dates().unwrap(), vec![day(2), day(5)]);

        store.delete_backup(day(2)).unwrap();
        store.delete_backup(day(2)).unwrap();
        assert_eq!(store.backup_dates().unwrap(), vec![day(5)]);

        // Backups are snapshots, later writes do not touch them.
        store
            .write_tables(&[(&PEOPLE, vec![row(&["bob", "second"])])])
            .unwrap();
        assert_eq!(store.backup_dates().unwrap(), vec![day(5)]);
    }
}

#[test]
fn test_flat_file_data_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = open_store(StorageBackend::FlatFile, dir.path()).unwrap();
        store.write("version", b"2").unwrap();
        store
            .write_tables(&[(&PLACES, vec![row(&["Lima"])])])
            .unwrap();
    }
    let store = open_store(StorageBackend::FlatFile, dir.path()).unwrap();
    assert_eq!(store.read("version").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.read_table(&PLACES).unwrap(), Some(vec![row(&["Lima"])]));
}

#[test]
fn test_sqlite_data_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = open_store(StorageBackend::Sqlite, dir.path()).unwrap();
        store.write("Thumbnails/a", b"blob").unwrap();
        store
            .write_tables(&[(&PLACES, vec![row(&["Kyoto"])])])
            .unwrap();
    }
    assert!(dir.path().join("catalog.sqlite").exists());
    let store = open_store(StorageBackend::Sqlite, dir.path()).unwrap();
    assert_eq!(store.read("Thumbnails/a").unwrap(), Some(b"blob".to_vec()));
    assert_eq!(store.read_table(&PLACES).unwrap(), Some(vec![row(&["Kyoto"])]));
}
