//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Grouping catalogued assets by content hash
//! - Computing the space wasted by duplicate copies
//!
//! Detection relies entirely on the content hashes recorded by the
//! scanner; no file is read.

pub mod finder;
pub mod groups;

// Re-export main types
pub use finder::find_duplicated_assets;
pub use groups::{DuplicateGroup, DuplicateMember, DuplicateStats};
