//! Persisted layout of the catalog relations.
//!
//! Each relation is described once by a [`TableSchema`] and converted to and
//! from string rows here. Every backend stores exactly these rows.
//!
//! Decoders return a plain reason string; the catalog store wraps it into a
//! `CorruptCatalog` error together with the offending row.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use super::model::{thumbnail_dimensions, Asset, Folder, FolderId, ImportDefinition, Rotation};
use crate::store::{Row, TableSchema};

/// Current layout version written under [`STORAGE_VERSION_KEY`].
pub const STORAGE_VERSION: u32 = 2;

/// Blob key holding the layout version.
pub const STORAGE_VERSION_KEY: &str = "storage_version";

/// Folder relation.
pub const FOLDER_TABLE: TableSchema = TableSchema {
    name: "Folder",
    columns: &["folder_id", "path"],
};

/// Asset relation.
pub const ASSET_TABLE: TableSchema = TableSchema {
    name: "Asset",
    columns: &[
        "folder_id",
        "file_name",
        "file_size",
        "image_rotation",
        "pixel_width",
        "pixel_height",
        "thumbnail_pixel_width",
        "thumbnail_pixel_height",
        "thumbnail_creation_time",
        "hash",
    ],
};

/// Column count of asset rows written by layout version 1:
/// `folder_id, file_name, file_size, pixel_width, pixel_height,
/// thumbnail_creation_time, hash`.
pub const ASSET_V1_WIDTH: usize = 7;

/// Import definition relation.
pub const IMPORT_TABLE: TableSchema = TableSchema {
    name: "Import",
    columns: &[
        "source_directory",
        "destination_directory",
        "include_sub_folders",
        "delete_assets_not_in_source",
    ],
};

/// Recently used copy/move destinations.
pub const RECENT_TARGET_PATHS_TABLE: TableSchema = TableSchema {
    name: "RecentTargetPaths",
    columns: &["path"],
};

/// Result of decoding one row.
pub type DecodeResult<T> = Result<T, String>;

/// Thumbnail box used to recompute thumbnail sizes of migrated rows.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailBox {
    /// Maximum thumbnail width
    pub max_width: u32,
    /// Maximum thumbnail height
    pub max_height: u32,
}

/// Decoded asset row.
#[derive(Debug)]
pub struct DecodedAsset {
    /// The asset
    pub asset: Asset,
    /// Whether the row came from an older layout
    pub migrated: bool,
}

fn check_width(row: &Row, schema: &TableSchema) -> DecodeResult<()> {
    if row.len() == schema.width() {
        Ok(())
    } else {
        Err(format!(
            "expected {} columns, found {}",
            schema.width(),
            row.len()
        ))
    }
}

fn parse_folder_id(s: &str) -> DecodeResult<FolderId> {
    FolderId::parse(s).ok_or_else(|| format!("invalid folder id '{s}'"))
}

fn parse_num<T: std::str::FromStr>(s: &str, column: &str) -> DecodeResult<T> {
    s.parse()
        .map_err(|_| format!("invalid {column} '{s}'"))
}

fn parse_bool(s: &str, column: &str) -> DecodeResult<bool> {
    match s {
        "True" | "true" | "1" => Ok(true),
        "False" | "false" | "0" => Ok(false),
        other => Err(format!("invalid {column} '{other}'")),
    }
}

fn parse_time(s: &str) -> DecodeResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid thumbnail_creation_time '{s}': {e}"))
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn non_empty(s: &str, column: &str) -> DecodeResult<()> {
    if s.is_empty() {
        Err(format!("empty {column}"))
    } else {
        Ok(())
    }
}

/// Encode a folder row.
#[must_use]
pub fn encode_folder(folder: &Folder) -> Row {
    vec![
        folder.folder_id.to_string(),
        folder.path.to_string_lossy().into_owned(),
    ]
}

/// Decode a folder row.
pub fn decode_folder(row: &Row) -> DecodeResult<Folder> {
    check_width(row, &FOLDER_TABLE)?;
    non_empty(&row[1], "path")?;
    Ok(Folder::new(parse_folder_id(&row[0])?, PathBuf::from(&row[1])))
}

/// Encode an asset row in the current layout.
#[must_use]
pub fn encode_asset(asset: &Asset) -> Row {
    vec![
        asset.folder_id.to_string(),
        asset.file_name.clone(),
        asset.file_size.to_string(),
        asset.image_rotation.as_str().to_string(),
        asset.pixel_width.to_string(),
        asset.pixel_height.to_string(),
        asset.thumbnail_pixel_width.to_string(),
        asset.thumbnail_pixel_height.to_string(),
        format_time(&asset.thumbnail_creation_time),
        asset.content_hash.clone(),
    ]
}

/// Decode an asset row written by any supported layout.
///
/// The layout is recognized by row width, so a catalog whose version
/// marker lags behind its tables still loads.
pub fn decode_asset(row: &Row, thumbnail_box: ThumbnailBox) -> DecodeResult<DecodedAsset> {
    if row.len() == ASSET_V1_WIDTH {
        return decode_asset_v1(row, thumbnail_box).map(|asset| DecodedAsset {
            asset,
            migrated: true,
        });
    }
    check_width(row, &ASSET_TABLE)?;
    non_empty(&row[1], "file_name")?;
    let asset = Asset {
        folder_id: parse_folder_id(&row[0])?,
        file_name: row[1].clone(),
        file_size: parse_num(&row[2], "file_size")?,
        image_rotation: row[3].parse()?,
        pixel_width: parse_num(&row[4], "pixel_width")?,
        pixel_height: parse_num(&row[5], "pixel_height")?,
        thumbnail_pixel_width: parse_num(&row[6], "thumbnail_pixel_width")?,
        thumbnail_pixel_height: parse_num(&row[7], "thumbnail_pixel_height")?,
        thumbnail_creation_time: parse_time(&row[8])?,
        content_hash: row[9].clone(),
    };
    Ok(DecodedAsset {
        asset,
        migrated: false,
    })
}

fn decode_asset_v1(row: &Row, thumbnail_box: ThumbnailBox) -> DecodeResult<Asset> {
    non_empty(&row[1], "file_name")?;
    let pixel_width = parse_num(&row[3], "pixel_width")?;
    let pixel_height = parse_num(&row[4], "pixel_height")?;
    let (thumbnail_pixel_width, thumbnail_pixel_height) = thumbnail_dimensions(
        pixel_width,
        pixel_height,
        thumbnail_box.max_width,
        thumbnail_box.max_height,
    );
    Ok(Asset {
        folder_id: parse_folder_id(&row[0])?,
        file_name: row[1].clone(),
        file_size: parse_num(&row[2], "file_size")?,
        image_rotation: Rotation::Rotate0,
        pixel_width,
        pixel_height,
        thumbnail_pixel_width,
        thumbnail_pixel_height,
        thumbnail_creation_time: parse_time(&row[5])?,
        content_hash: row[6].clone(),
    })
}

/// Encode an import definition row.
#[must_use]
pub fn encode_import(definition: &ImportDefinition) -> Row {
    vec![
        definition.source_directory.to_string_lossy().into_owned(),
        definition.destination_directory.to_string_lossy().into_owned(),
        definition.include_sub_folders.to_string(),
        definition.delete_assets_not_in_source.to_string(),
    ]
}

/// Decode an import definition row.
pub fn decode_import(row: &Row) -> DecodeResult<ImportDefinition> {
    check_width(row, &IMPORT_TABLE)?;
    non_empty(&row[0], "source_directory")?;
    non_empty(&row[1], "destination_directory")?;
    Ok(ImportDefinition {
        source_directory: PathBuf::from(&row[0]),
        destination_directory: PathBuf::from(&row[1]),
        include_sub_folders: parse_bool(&row[2], "include_sub_folders")?,
        delete_assets_not_in_source: parse_bool(&row[3], "delete_assets_not_in_source")?,
    })
}

/// Encode a recent target path row.
#[must_use]
pub fn encode_recent_path(path: &std::path::Path) -> Row {
    vec![path.to_string_lossy().into_owned()]
}

/// Decode a recent target path row.
pub fn decode_recent_path(row: &Row) -> DecodeResult<PathBuf> {
    check_width(row, &RECENT_TARGET_PATHS_TABLE)?;
    non_empty(&row[0], "path")?;
    Ok(PathBuf::from(&row[0]))
}
