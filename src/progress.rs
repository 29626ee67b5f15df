//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display scan progress in the terminal.
//!
//! # Accessible Mode
//!
//! When accessible mode is enabled, progress reporting uses simplified output:
//! - No spinner animation
//! - Plain text updates without cursor movement
//! - Reduced update frequency for screen reader compatibility

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::scanner::{CatalogChange, ScanSummary};

/// Progress callback for catalog scans.
///
/// Callbacks are invoked synchronously from the scanning thread.
pub trait ProgressCallback: Send + Sync {
    /// Called when the scanner starts reconciling a directory.
    fn on_folder_start(&self, path: &Path);

    /// Called for every asset created, updated or deleted.
    fn on_change(&self, change: &CatalogChange);

    /// Called with a human readable note, e.g. a skipped file.
    fn on_message(&self, _message: &str) {}

    /// Called once when the scan completes without being interrupted.
    fn on_scan_end(&self, _summary: &ScanSummary) {}
}

/// Progress reporter using indicatif.
///
/// Shows a spinner with the current folder and running change counts.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    counts: Mutex<ChangeCounts>,
    quiet: bool,
    accessible: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct ChangeCounts {
    folders: usize,
    created: usize,
    updated: usize,
    deleted: usize,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("quiet", &self.quiet)
            .field("accessible", &self.accessible)
            .finish_non_exhaustive()
    }
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use photocat::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self::with_accessible(quiet, false)
    }

    /// Create a new progress reporter with accessible mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use photocat::progress::Progress;
    ///
    /// let progress = Progress::with_accessible(false, true);
    /// assert!(progress.is_accessible());
    /// ```
    #[must_use]
    pub fn with_accessible(quiet: bool, accessible: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            counts: Mutex::new(ChangeCounts::default()),
            quiet,
            accessible,
        }
    }

    /// Check if accessible mode is enabled.
    #[must_use]
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    fn style(&self) -> ProgressStyle {
        if self.accessible {
            ProgressStyle::with_template("[{elapsed_precise}] {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
        } else {
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        }
    }

    /// Run `f` on the spinner, creating it on first use.
    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if self.quiet {
            return;
        }
        let mut bar = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        let pb = bar.get_or_insert_with(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(self.style());
            let tick_rate = if self.accessible { 500 } else { 100 };
            pb.enable_steady_tick(Duration::from_millis(tick_rate));
            pb
        });
        f(pb);
    }

    fn update_prefix(&self, pb: &ProgressBar) {
        let counts = *self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        pb.set_prefix(format!(
            "{} folders, +{} ~{} -{}",
            counts.folders, counts.created, counts.updated, counts.deleted
        ));
    }
}

impl ProgressCallback for Progress {
    fn on_folder_start(&self, path: &Path) {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .folders += 1;
        self.with_bar(|pb| {
            self.update_prefix(pb);
            pb.set_message(truncate_path(&path.to_string_lossy(), 50));
        });
    }

    fn on_change(&self, change: &CatalogChange) {
        {
            let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
            match change {
                CatalogChange::Created { .. } => counts.created += 1,
                CatalogChange::Updated { .. } => counts.updated += 1,
                CatalogChange::Deleted { .. } => counts.deleted += 1,
            }
        }
        self.with_bar(|pb| self.update_prefix(pb));
    }

    fn on_message(&self, message: &str) {
        self.with_bar(|pb| pb.println(message));
    }

    fn on_scan_end(&self, summary: &ScanSummary) {
        if let Some(pb) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_with_message(format!(
                "Scan complete: {} folders, {} created, {} updated, {} deleted",
                summary.folders_scanned, summary.created, summary.updated, summary.deleted
            ));
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
