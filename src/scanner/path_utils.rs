//! Unicode path normalization utilities.
//!
//! Folder paths are the catalog's natural key. Lookups compare
//! [`path_key`]s, while the stored path keeps the spelling found on disk
//! (only cleaned by [`clean_folder_path`]) so it can still be opened.
//!
//! # Background
//!
//! macOS uses NFD (Decomposed) normalization for file paths, while Windows
//! and Linux typically use NFC (Composed) normalization. This means the same
//! visual folder name can have different byte representations:
//!
//! - NFC: `café` - 'é' is U+00E9 (single code point)
//! - NFD: `café` - 'e' U+0065 + combining acute accent U+0301
//!
//! Without normalization, these would be catalogued as two folders.
//!
//! # Example
//!
//! ```
//! use photocat::scanner::path_utils::normalize_folder_path;
//! use std::path::Path;
//!
//! let nfc = normalize_folder_path(Path::new("/photos/café/"));
//! let nfd = normalize_folder_path(Path::new("/photos/cafe\u{0301}"));
//! assert_eq!(nfc, nfd);
//! ```

use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
///
/// # Example
///
/// ```
/// use photocat::scanner::path_utils::normalize_path_str;
///
/// let nfd = "cafe\u{0301}.jpg"; // NFD form
/// assert_eq!(normalize_path_str(nfd), "café.jpg");
/// ```
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Normalize a [`Path`] to NFC form.
///
/// If the path contains invalid UTF-8, returns the original path unchanged.
#[must_use]
pub fn normalize_pathbuf(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(normalize_path_str(s)),
        None => path.to_path_buf(),
    }
}

/// Drop trailing separators and interior `.` segments without touching
/// the bytes of any name.
///
/// This is the form used for I/O: filesystems such as ext4 compare names
/// byte for byte, so an NFD directory must be opened with its NFD name.
#[must_use]
pub fn clean_folder_path(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Canonical comparison form of a folder path.
///
/// NFC-normalizes the path and rebuilds it from its components, which drops
/// trailing separators and interior `.` segments. `..` is left alone: the
/// catalog never resolves links or parents on its own.
#[must_use]
pub fn normalize_folder_path(path: &Path) -> PathBuf {
    normalize_pathbuf(path).components().collect()
}

/// Create a normalized comparison key for a path.
///
/// Used for hashing folder paths into blob names, where NFC and NFD spellings
/// of the same folder must map to the same key.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use photocat::scanner::path_utils::path_key;
///
/// assert_eq!(
///     path_key(Path::new("/photos/café/")),
///     path_key(Path::new("/photos/cafe\u{0301}"))
/// );
/// ```
#[must_use]
pub fn path_key(path: &Path) -> String {
    normalize_folder_path(path).to_string_lossy().into_owned()
}

/// Whether a file or folder name is hidden (starts with `.`).
#[must_use]
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether the last component of `path` is hidden.
#[must_use]
pub fn is_hidden_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_hidden_name)
}
