//! Duplicate groups of catalogued assets.

use std::path::PathBuf;

use bytesize::ByteSize;
use serde::Serialize;

use crate::catalog::Asset;

/// One asset of a duplicate group, with the full path of its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateMember {
    /// Full path of the file
    pub path: PathBuf,
    /// The catalog record
    pub asset: Asset,
}

/// Assets sharing the same content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Shared content hash (hex)
    pub hash: String,
    /// Members ordered by folder path, then file name
    pub members: Vec<DuplicateMember>,
}

impl DuplicateGroup {
    /// Number of assets in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Size of one copy in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.members.first().map_or(0, |m| m.asset.file_size)
    }

    /// Space taken by every copy but one.
    #[must_use]
    pub fn wasted_bytes(&self) -> u64 {
        self.file_size() * (self.members.len().saturating_sub(1) as u64)
    }

    /// Paths of all members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }
}

/// Totals over a set of duplicate groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateStats {
    /// Number of groups
    pub group_count: usize,
    /// Number of redundant copies (members beyond the first of each group)
    pub duplicate_count: usize,
    /// Total wasted bytes
    pub wasted_bytes: u64,
}

impl DuplicateStats {
    /// Compute totals for `groups`.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        groups.iter().fold(Self::default(), |mut stats, group| {
            stats.group_count += 1;
            stats.duplicate_count += group.len().saturating_sub(1);
            stats.wasted_bytes += group.wasted_bytes();
            stats
        })
    }

    /// Human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} duplicate group(s), {} redundant cop(ies), {} wasted",
            self.group_count,
            self.duplicate_count,
            ByteSize(self.wasted_bytes)
        )
    }
}
