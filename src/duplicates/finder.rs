//! Duplicate finder over the catalog.
//!
//! # Example
//!
//! ```no_run
//! use photocat::catalog::{CatalogOptions, CatalogStore};
//! use photocat::duplicates::{find_duplicated_assets, DuplicateStats};
//! use photocat::store::{open_store, StorageBackend};
//! use std::path::Path;
//!
//! let store = open_store(StorageBackend::Sqlite, Path::new("/tmp/photocat"))?;
//! let catalog = CatalogStore::open(store, CatalogOptions::default())?;
//! let groups = find_duplicated_assets(&catalog);
//! println!("{}", DuplicateStats::from_groups(&groups).summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, HashMap};

use super::groups::{DuplicateGroup, DuplicateMember};
use crate::catalog::{CatalogStore, FolderId};

/// Group every catalogued asset by content hash.
///
/// Only hashes shared by two or more assets form a group. Groups are
/// ordered by hash and members by folder path, then file name. Assets
/// without a hash are ignored.
#[must_use]
pub fn find_duplicated_assets(catalog: &CatalogStore) -> Vec<DuplicateGroup> {
    let folder_paths: HashMap<FolderId, _> = catalog
        .list_folders()
        .into_iter()
        .map(|folder| (folder.folder_id, folder))
        .collect();

    let mut by_hash: BTreeMap<String, Vec<DuplicateMember>> = BTreeMap::new();
    for asset in catalog.list_all_assets() {
        if asset.content_hash.is_empty() {
            continue;
        }
        let Some(folder) = folder_paths.get(&asset.folder_id) else {
            continue;
        };
        by_hash
            .entry(asset.content_hash.clone())
            .or_default()
            .push(DuplicateMember {
                path: folder.file_path(&asset.file_name),
                asset,
            });
    }

    let groups: Vec<DuplicateGroup> = by_hash
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(hash, mut members)| {
            members.sort_by(|a, b| a.path.cmp(&b.path));
            DuplicateGroup { hash, members }
        })
        .collect();

    log::debug!("Found {} duplicate group(s)", groups.len());
    groups
}
