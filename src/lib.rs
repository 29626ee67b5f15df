//! photocat - photo catalog with a persistent thumbnail cache
//!
//! photocat keeps an index of image folders and assets, plus a small JPEG
//! thumbnail per asset, so large collections can be browsed without
//! decoding full-resolution images. A scan reconciles the index with the
//! filesystem incrementally.
//!
//! The main entry points are:
//! - [`catalog::CatalogStore`]: the index and its thumbnails
//! - [`scanner::CatalogScanner`]: keeps the catalog in sync with disk
//! - [`actions::AssetActions`]: copy, move and delete assets
//! - [`duplicates::find_duplicated_assets`]: content-hash duplicate report

pub mod actions;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{AssetActions, DeleteConfig, DeleteMode};
use crate::catalog::CatalogStore;
use crate::cli::{
    Cli, Commands, DeleteArgs, DuplicatesArgs, FoldersArgs, ImportsArgs, ListArgs, MoveArgs,
    ScanArgs,
};
use crate::config::Config;
use crate::duplicates::{find_duplicated_assets, DuplicateStats};
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::scanner::CatalogScanner;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error if the configuration or catalog cannot be loaded or the
/// command fails. An interrupted scan surfaces as
/// [`scanner::ScanError::Interrupted`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let store = store::open_store(config.backend, &config.data_dir)
        .with_context(|| format!("cannot open catalog in {}", config.data_dir.display()))?;
    let catalog = Arc::new(CatalogStore::open(store, config.catalog_options())?);

    match cli.command {
        Commands::Scan(args) => run_scan(&catalog, config, args, cli.quiet),
        Commands::List(args) => run_list(&catalog, &config, &args),
        Commands::Folders(args) => run_folders(&catalog, &args),
        Commands::Duplicates(args) => run_duplicates(&catalog, &args),
        Commands::Delete(args) => run_delete(&catalog, &args),
        Commands::Move(args) => run_move(&catalog, &args),
        Commands::Imports(args) => run_imports(&catalog, &args),
    }
}

fn run_scan(
    catalog: &Arc<CatalogStore>,
    mut config: Config,
    args: ScanArgs,
    quiet: bool,
) -> Result<ExitCode> {
    if args.include_hidden {
        config.include_hidden = true;
    }
    if args.no_detect_modified {
        config.detect_modified = false;
    }
    if args.roots_only {
        config.rescan_catalogued_folders = false;
    }
    if let Some(threads) = args.io_threads {
        config.io_threads = threads;
    }

    let roots = if args.paths.is_empty() {
        config.root_paths.clone()
    } else {
        args.paths
    };
    if roots.is_empty() {
        anyhow::bail!("no folder to scan: pass a path or set root_paths in the configuration");
    }

    let handler = signal::install_handler()?;
    let progress = Arc::new(Progress::with_accessible(quiet, args.accessible));
    let scanner = CatalogScanner::with_defaults(catalog.clone(), config.scan_config())
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress);

    let summary = scanner.scan(&roots)?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "Scanned {} folder(s): {} created, {} updated, {} deleted",
        summary.folders_scanned, summary.created, summary.updated, summary.deleted
    )?;
    if summary.is_partial() {
        writeln!(out, "{} folder(s) or file(s) skipped, see the log", summary.errors)?;
        return Ok(ExitCode::PartialSuccess);
    }
    Ok(ExitCode::Success)
}

fn run_list(catalog: &CatalogStore, config: &Config, args: &ListArgs) -> Result<ExitCode> {
    let page_size = args.page_size.unwrap_or(config.page_size);
    let page = catalog.list_assets_paginated(&args.dir, args.page, page_size)?;
    // Listing may have catalogued the folder.
    catalog.save()?;

    let mut out = std::io::stdout().lock();
    if args.json {
        let assets: Vec<_> = page.items.iter().map(|item| &item.asset).collect();
        let json = serde_json::json!({
            "folder": args.dir,
            "page_index": page.page_index,
            "page_size": page.page_size,
            "page_count": page.page_count(),
            "total_count": page.total_count,
            "assets": assets,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
        return Ok(ExitCode::Success);
    }

    for item in &page.items {
        let asset = &item.asset;
        writeln!(
            out,
            "{:<40} {:>5}x{:<5} {:>10} {:>8}  thumbnail {}x{} ({})",
            asset.file_name,
            asset.pixel_width,
            asset.pixel_height,
            bytesize::ByteSize(asset.file_size).to_string(),
            asset.image_rotation.to_string(),
            asset.thumbnail_pixel_width,
            asset.thumbnail_pixel_height,
            bytesize::ByteSize(item.thumbnail.len() as u64)
        )?;
    }
    writeln!(
        out,
        "Page {} of {} ({} assets)",
        page.page_index + 1,
        page.page_count().max(1),
        page.total_count
    )?;
    Ok(ExitCode::Success)
}

fn run_folders(catalog: &CatalogStore, args: &FoldersArgs) -> Result<ExitCode> {
    let folders = match &args.parent {
        Some(parent) => catalog.list_subfolders(parent, args.hidden),
        None => catalog
            .list_folders()
            .into_iter()
            .filter(|folder| args.hidden || !folder.is_hidden())
            .collect(),
    };

    let mut out = std::io::stdout().lock();
    for folder in folders {
        let count = catalog.list_assets(&folder).len();
        writeln!(out, "{:>6}  {}", count, folder.path.display())?;
    }
    Ok(ExitCode::Success)
}

fn run_duplicates(catalog: &CatalogStore, args: &DuplicatesArgs) -> Result<ExitCode> {
    let groups = find_duplicated_assets(catalog);
    let mut out = std::io::stdout().lock();
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&groups)?)?;
        return Ok(ExitCode::Success);
    }

    for group in &groups {
        writeln!(
            out,
            "{} ({} copies of {})",
            short_hash(&group.hash),
            group.len(),
            bytesize::ByteSize(group.file_size())
        )?;
        for member in &group.members {
            writeln!(out, "    {}", member.path.display())?;
        }
    }
    writeln!(out, "{}", DuplicateStats::from_groups(&groups).summary())?;
    Ok(ExitCode::Success)
}

/// At most the first 16 characters of a content hash.
fn short_hash(hash: &str) -> &str {
    hash.char_indices().nth(16).map_or(hash, |(end, _)| &hash[..end])
}

fn run_delete(catalog: &Arc<CatalogStore>, args: &DeleteArgs) -> Result<ExitCode> {
    let asset = find_asset(catalog, &args.dir, &args.file)?;
    let config = DeleteConfig::new(args.mode.unwrap_or(DeleteMode::CatalogOnly))
        .with_verify_size(!args.no_verify);
    let result = AssetActions::new(catalog.clone()).delete_assets(&[asset], &config)?;
    if let Some((path, message)) = result.failures.first() {
        anyhow::bail!("cannot delete {}: {}", path.display(), message);
    }
    writeln!(std::io::stdout().lock(), "{}", result.summary())?;
    Ok(ExitCode::Success)
}

fn run_move(catalog: &Arc<CatalogStore>, args: &MoveArgs) -> Result<ExitCode> {
    let asset = find_asset(catalog, &args.dir, &args.file)?;
    let actions = AssetActions::new(catalog.clone());
    let copy = actions.move_asset(&asset, &args.dest, args.copy)?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{} {} to {}",
        if args.copy { "Copied" } else { "Moved" },
        args.file,
        args.dest.display()
    )?;
    if copy.is_none() {
        writeln!(out, "Destination folder is not catalogued yet; scan it to add the copy")?;
    }
    Ok(ExitCode::Success)
}

fn run_imports(catalog: &CatalogStore, args: &ImportsArgs) -> Result<ExitCode> {
    let definitions = catalog.import_definitions();
    let mut out = std::io::stdout().lock();
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&definitions)?)?;
        return Ok(ExitCode::Success);
    }
    for def in &definitions {
        writeln!(
            out,
            "{} -> {}{}{}",
            def.source_directory.display(),
            def.destination_directory.display(),
            if def.include_sub_folders { " [recursive]" } else { "" },
            if def.delete_assets_not_in_source { " [mirror]" } else { "" }
        )?;
    }
    if definitions.is_empty() {
        writeln!(out, "No import definitions")?;
    }
    Ok(ExitCode::Success)
}

fn find_asset(catalog: &CatalogStore, dir: &Path, file: &str) -> Result<catalog::Asset> {
    catalog
        .get_asset(dir, file)
        .with_context(|| format!("{} is not catalogued", dir.join(file).display()))
}
