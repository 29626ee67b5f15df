//! Filesystem access used by the scanner and asset actions.
//!
//! # Overview
//!
//! The scanner never walks a whole tree in one go: it lists one directory
//! at a time and keeps its own work-list. [`LocalFileSystem`] does this with
//! `walkdir` limited to depth one, sorted by file name so that enumeration
//! order is deterministic.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{io_error, ScanError};

/// Filesystem collaborator.
pub trait FileSystem: Send + Sync {
    /// Names of the regular files directly inside `dir`, in enumeration order.
    fn list_file_names(&self, dir: &Path) -> Result<Vec<String>, ScanError>;

    /// Paths of the directories directly inside `dir`, in enumeration order.
    fn list_subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError>;

    /// Whole content of a file.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, ScanError>;

    /// Size of a file in bytes.
    fn file_size(&self, path: &Path) -> Result<u64, ScanError>;

    /// Copy a file, creating the destination directory if needed.
    ///
    /// Never overwrites: fails with [`ScanError::AlreadyExists`] if `to`
    /// exists, including when it appears while the copy starts.
    fn copy(&self, from: &Path, to: &Path) -> Result<(), ScanError>;

    /// Permanently delete a file.
    fn delete(&self, path: &Path) -> Result<(), ScanError>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;
}

/// [`FileSystem`] over the local disk.
///
/// Symbolic links are not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

impl LocalFileSystem {
    /// Create a new local filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Entries of one kind directly inside `dir`, sorted by name.
    fn entries(&self, dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>, ScanError> {
        let metadata = fs::metadata(dir).map_err(|e| io_error(dir, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    let wanted = match kind {
                        EntryKind::File => file_type.is_file(),
                        EntryKind::Dir => file_type.is_dir(),
                    };
                    if wanted {
                        paths.push(entry.into_path());
                    }
                }
                Err(e) if e.depth() == 0 => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    return Err(match e.into_io_error() {
                        Some(source) => io_error(&path, source),
                        None => ScanError::Io {
                            path,
                            source: std::io::Error::other("filesystem loop"),
                        },
                    });
                }
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                }
            }
        }
        Ok(paths)
    }
}

impl FileSystem for LocalFileSystem {
    fn list_file_names(&self, dir: &Path) -> Result<Vec<String>, ScanError> {
        let names = self
            .entries(dir, EntryKind::File)?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str().map(str::to_string);
                if name.is_none() {
                    log::warn!("Skipping file with non UTF-8 name: {}", path.display());
                }
                name
            })
            .collect();
        Ok(names)
    }

    fn list_subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        self.entries(dir, EntryKind::Dir)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, ScanError> {
        fs::read(path).map_err(|e| io_error(path, e))
    }

    fn file_size(&self, path: &Path) -> Result<u64, ScanError> {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| io_error(path, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), ScanError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let mut source = File::open(from).map_err(|e| io_error(from, e))?;
        let mut target = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(to)
            .map_err(|e| io_error(to, e))?;
        if let Err(e) = io::copy(&mut source, &mut target) {
            drop(target);
            if let Err(cleanup) = fs::remove_file(to) {
                log::warn!("Cannot remove partial copy {}: {cleanup}", to.display());
            }
            return Err(io_error(to, e));
        }
        target.sync_all().map_err(|e| io_error(to, e))?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), ScanError> {
        fs::remove_file(path).map_err(|e| io_error(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
