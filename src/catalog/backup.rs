//! Periodic catalog backups, taken as a side effect of saving.

use chrono::{Days, NaiveDate};

use crate::store::{BlobStore, StoreResult};

/// When to snapshot the catalog tables and how many snapshots to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupPolicy {
    /// Minimum number of days between two backups; `0` disables backups.
    pub every_n_days: u32,
    /// Number of most recent backups kept after a new one is written.
    pub backups_to_keep: usize,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            every_n_days: 7,
            backups_to_keep: 2,
        }
    }
}

impl BackupPolicy {
    /// Policy that never writes backups.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            every_n_days: 0,
            backups_to_keep: 0,
        }
    }

    /// Whether a backup is due on `today` given the dates of existing ones.
    #[must_use]
    pub fn is_due(&self, today: NaiveDate, existing: &[NaiveDate]) -> bool {
        if self.every_n_days == 0 || existing.contains(&today) {
            return false;
        }
        match existing.iter().max() {
            Some(last) => last
                .checked_add_days(Days::new(u64::from(self.every_n_days)))
                .is_some_and(|next| today >= next),
            None => true,
        }
    }

    /// Backups to delete so that only the newest `backups_to_keep` remain.
    ///
    /// At least one backup is always kept.
    #[must_use]
    pub fn expired(&self, existing: &[NaiveDate]) -> Vec<NaiveDate> {
        let mut dates = existing.to_vec();
        dates.sort_unstable();
        let keep = self.backups_to_keep.max(1);
        let excess = dates.len().saturating_sub(keep);
        dates.truncate(excess);
        dates
    }

    /// Write today's backup if due, then prune old ones.
    ///
    /// Returns `true` if a backup was written.
    pub fn apply(&self, store: &dyn BlobStore, today: NaiveDate) -> StoreResult<bool> {
        let existing = store.backup_dates()?;
        if !self.is_due(today, &existing) {
            return Ok(false);
        }
        if !store.write_backup(today)? {
            return Ok(false);
        }
        log::debug!("Catalog backup taken for {today}");

        let dates = store.backup_dates()?;
        for date in self.expired(&dates) {
            log::debug!("Removing old catalog backup from {date}");
            store.delete_backup(date)?;
        }
        Ok(true)
    }
}
