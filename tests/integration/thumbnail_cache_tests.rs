use photocat::cache::{blob_key, CacheError, ThumbnailCache};
use photocat::catalog::{Folder, FolderId};
use photocat::store::{BlobStore, FlatFileStore, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn folder(path: &str) -> Folder {
    Folder::new(FolderId::new(), PathBuf::from(path))
}

#[test]
fn test_evicted_folder_is_reloaded_from_store() {
    let store = Arc::new(MemoryStore::new());
    let cache = ThumbnailCache::new(store.clone(), 2);
    let (a, b, c) = (folder("/a"), folder("/b"), folder("/c"));

    cache.put(&a, "1.jpg", b"a1").unwrap();
    cache.put(&b, "1.jpg", b"b1").unwrap();
    cache.put(&c, "1.jpg", b"c1").unwrap();
    assert_eq!(cache.loaded_folder_count(), 2);
    assert!(!cache.is_loaded(&a));

    let reads = store.blob_reads();
    let thumb = cache.get_or_load(&a, "1.jpg").unwrap().unwrap();
    assert_eq!(&thumb[..], b"a1");
    assert_eq!(store.blob_reads(), reads + 1);

    // Served from memory now.
    cache.get_or_load(&a, "1.jpg").unwrap();
    assert_eq!(store.blob_reads(), reads + 1);
    assert!(!cache.is_loaded(&b));
}

#[test]
fn test_write_through_survives_new_cache() {
    let data = tempdir().unwrap();
    let store: Arc<dyn BlobStore> = Arc::new(FlatFileStore::open(data.path()).unwrap());
    let photos = folder("/photos");
    {
        let cache = ThumbnailCache::new(store.clone(), 5);
        cache.put(&photos, "a.jpg", &[0xff, 0xd8, 0x00]).unwrap();
        cache.put(&photos, "b.jpg", b"bbb").unwrap();
        assert!(cache.evict(&photos, "b.jpg").unwrap());
    }

    let cache = ThumbnailCache::new(store, 5);
    assert!(cache.has_thumbnails(&photos).unwrap());
    assert_eq!(
        &cache.get_or_load(&photos, "a.jpg").unwrap().unwrap()[..],
        &[0xff, 0xd8, 0x00]
    );
    assert!(cache.get_or_load(&photos, "b.jpg").unwrap().is_none());
}

#[test]
fn test_last_eviction_deletes_blob() {
    let store = Arc::new(MemoryStore::new());
    let cache = ThumbnailCache::new(store.clone(), 5);
    let photos = folder("/photos");
    cache.put(&photos, "a.jpg", b"a").unwrap();
    assert_eq!(store.blob_keys(), vec![blob_key(&photos)]);

    assert!(cache.evict(&photos, "a.jpg").unwrap());
    assert!(store.blob_keys().is_empty());
    assert!(!cache.evict(&photos, "a.jpg").unwrap());
}

#[test]
fn test_unknown_folder_has_nothing() {
    let cache = ThumbnailCache::new(Arc::new(MemoryStore::new()), 5);
    let nowhere = folder("/nowhere");
    assert!(cache.get_or_load(&nowhere, "x.jpg").unwrap().is_none());
    assert!(!cache.has_thumbnails(&nowhere).unwrap());
    assert!(!cache.is_loaded(&nowhere));
}

#[test]
fn test_corrupt_blob_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    let photos = folder("/photos");
    store.write(&blob_key(&photos), b"{not json").unwrap();
    let cache = ThumbnailCache::new(store, 5);
    assert!(matches!(
        cache.get_or_load(&photos, "a.jpg"),
        Err(CacheError::Corrupt { .. })
    ));
}

#[test]
fn test_concurrent_writers_to_one_folder() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(ThumbnailCache::new(store.clone(), 1));
    let photos = folder("/photos");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            let photos = photos.clone();
            thread::spawn(move || {
                let name = format!("{i}.jpg");
                cache.put(&photos, &name, name.as_bytes()).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // A fresh cache sees every write in the blob.
    let fresh = ThumbnailCache::new(store, 1);
    for i in 0..8 {
        let name = format!("{i}.jpg");
        let thumb = fresh.get_or_load(&photos, &name).unwrap().unwrap();
        assert_eq!(&thumb[..], name.as_bytes());
    }
}
