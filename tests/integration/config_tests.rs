//! Layered configuration: defaults, TOML file, `PHOTOCAT_*` environment.

use photocat::config::Config;
use photocat::store::StorageBackend;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all PHOTOCAT_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("PHOTOCAT_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_missing_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    let defaults = Config::default();
    assert_eq!(config.thumbnail_max_width, defaults.thumbnail_max_width);
    assert_eq!(config.backend, StorageBackend::FlatFile);
    assert_eq!(config.page_size, 100);
}

#[test]
fn test_file_overrides_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
backend = "sqlite"
root_paths = ["/mnt/a", "/mnt/b"]
thumbnail_max_width = 320
backup_every_n_days = 0
include_hidden = true
"#,
    )
    .unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.backend, StorageBackend::Sqlite);
    assert_eq!(
        config.root_paths,
        vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]
    );
    assert_eq!(config.thumbnail_max_width, 320);
    assert_eq!(config.thumbnail_max_height, 150);
    assert!(config.include_hidden);

    let options = config.catalog_options();
    assert_eq!(options.thumbnail_max_width, 320);
    assert_eq!(options.backup.every_n_days, 0);
    assert!(config.scan_config().include_hidden);
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "page_size = 10\nio_threads = 2\n").unwrap();

    std::env::set_var("PHOTOCAT_PAGE_SIZE", "25");
    std::env::set_var("PHOTOCAT_BACKEND", "sqlite");
    let config = Config::load(Some(path.as_path()));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.page_size, 25);
    assert_eq!(config.io_threads, 2);
    assert_eq!(config.backend, StorageBackend::Sqlite);
}

#[test]
fn test_invalid_values_are_errors() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "backend = \"floppy\"\n").unwrap();
    let err = Config::load(Some(path.as_path())).unwrap_err();
    assert!(format!("{err:#}").contains("invalid configuration"));

    fs::write(&path, "page_size = \"many\"\n").unwrap();
    assert!(Config::load(Some(path.as_path())).is_err());
}

#[test]
fn test_save_then_load() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/config.toml");
    let config = Config {
        data_dir: dir.path().join("data"),
        backend: StorageBackend::Sqlite,
        root_paths: vec![PathBuf::from("/photos")],
        thumbnail_folders_to_keep: 12,
        rescan_catalogued_folders: false,
        ..Config::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(loaded, config);
}
