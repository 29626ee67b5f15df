//! Command-line interface definitions for photocat.
//!
//! Global options (verbosity, config file, data directory, backend) apply
//! to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Catalog the configured roots, or the given folders
//! photocat scan ~/Pictures /mnt/camera
//!
//! # Second page of a folder listing as JSON
//! photocat list ~/Pictures/2023 --page 1 --json
//!
//! # Duplicate report from the SQLite catalog
//! photocat --backend sqlite duplicates
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::DeleteMode;
use crate::store::StorageBackend;

/// Photo catalog with persistent thumbnails and incremental scanning.
#[derive(Debug, Parser)]
#[command(name = "photocat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the catalog
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Blob store backend
    #[arg(long, value_enum, global = true)]
    pub backend: Option<StorageBackend>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bring the catalog up to date with the filesystem
    Scan(ScanArgs),
    /// List the assets of a folder, one page at a time
    List(ListArgs),
    /// List catalogued folders
    Folders(FoldersArgs),
    /// Report assets with identical content
    Duplicates(DuplicatesArgs),
    /// Remove an asset from the catalog, optionally deleting its file
    Delete(DeleteArgs),
    /// Move or copy an asset to another folder
    Move(MoveArgs),
    /// Show the saved import definitions
    Imports(ImportsArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Folders to scan (default: the configured root paths)
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Also scan hidden files and folders (starting with .)
    #[arg(long)]
    pub include_hidden: bool,

    /// Do not re-catalogue files whose size changed
    #[arg(long)]
    pub no_detect_modified: bool,

    /// Only scan the given folders, not other catalogued folders
    #[arg(long)]
    pub roots_only: bool,

    /// Number of threads building new assets
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Plain progress output for screen readers
    #[arg(long)]
    pub accessible: bool,
}

/// Arguments for the list subcommand.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Folder to list
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Assets per page (default: from configuration)
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the folders subcommand.
#[derive(Debug, Args)]
pub struct FoldersArgs {
    /// Only list the direct subfolders of this folder
    #[arg(value_name = "PARENT")]
    pub parent: Option<PathBuf>,

    /// Include hidden folders
    #[arg(long)]
    pub hidden: bool,
}

/// Arguments for the duplicates subcommand.
#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Print JSON instead of a report
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the delete subcommand.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Folder of the asset
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// File name of the asset
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Also delete the file: to the trash or permanently
    #[arg(long = "file", value_enum, value_name = "MODE")]
    pub mode: Option<DeleteMode>,

    /// Delete the file even if its size changed since it was catalogued
    #[arg(long)]
    pub no_verify: bool,
}

/// Arguments for the move subcommand.
#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Folder of the asset
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// File name of the asset
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Destination folder
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,

    /// Keep the original file
    #[arg(long)]
    pub copy: bool,
}

/// Arguments for the imports subcommand.
#[derive(Debug, Args)]
pub struct ImportsArgs {
    /// Print JSON instead of a list
    #[arg(long)]
    pub json: bool,
}
