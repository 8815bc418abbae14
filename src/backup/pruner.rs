//! Best-effort deletion of daily backups older than the retention horizon.

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use super::rotation::RetentionTier;
use crate::errors::RunWarning;
use crate::storage::ArtifactStore;

pub const DEFAULT_HORIZON_DAYS: u32 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    pub warnings: Vec<RunWarning>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionPruner {
    horizon_days: u32,
}

impl Default for RetentionPruner {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZON_DAYS)
    }
}

impl RetentionPruner {
    pub fn new(horizon_days: u32) -> Self {
        Self { horizon_days }
    }

    /// Oldest date that is kept. Anything strictly before it is deleted.
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.horizon_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Deletes daily objects whose embedded date is before [`RetentionPruner::cutoff`].
    ///
    /// Never fails: listing problems, malformed keys and failed deletes are
    /// reported as warnings and the remaining objects are still processed.
    pub async fn prune<S: ArtifactStore + ?Sized>(&self, store: &S, today: NaiveDate) -> PruneReport {
        let tier = RetentionTier::Daily;
        let cutoff = self.cutoff(today);
        let mut report = PruneReport::default();

        let objects = match store.list(tier.prefix()).await {
            Ok(objects) => objects,
            Err(e) => {
                warn!(error = %e, "failed to list daily backups for pruning");
                report.warnings.push(RunWarning::Prune {
                    key: tier.prefix().to_string(),
                    message: e.to_string(),
                });
                return report;
            }
        };

        for object in objects {
            // Folder placeholder objects created by some consoles.
            if object.key == tier.prefix() {
                continue;
            }

            let date = match tier.parse_key(&object.key) {
                Ok(date) => date,
                Err(message) => {
                    warn!(key = %object.key, %message, "failed to parse date from key");
                    report.warnings.push(RunWarning::MalformedKey {
                        key: object.key,
                        message,
                    });
                    continue;
                }
            };

            if date >= cutoff {
                continue;
            }

            match store.delete(&object.key).await {
                Ok(()) => {
                    info!(key = %object.key, "deleted old daily backup");
                    report.deleted.push(object.key);
                }
                Err(e) => {
                    warn!(key = %object.key, error = %e, "failed to delete old backup");
                    report.warnings.push(RunWarning::Prune {
                        key: object.key,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use chrono::Utc;
    use std::collections::HashMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed_august(store: &MemoryStore, days: std::ops::RangeInclusive<u32>) {
        for day in days {
            let key = RetentionTier::Daily.key_for(date(2025, 8, day));
            store.seed(&key, b"dump", HashMap::new(), Utc::now());
        }
    }

    #[tokio::test]
    async fn deletes_only_dailies_older_than_horizon() {
        let store = MemoryStore::new();
        seed_august(&store, 1..=10);

        let report = RetentionPruner::new(7).prune(&store, date(2025, 8, 10)).await;

        assert_eq!(
            report.deleted,
            vec!["daily/2025-08-01-backup.sql", "daily/2025-08-02-backup.sql"]
        );
        assert!(report.warnings.is_empty());
        assert!(store.object("daily/2025-08-03-backup.sql").is_some());
        assert!(store.object("daily/2025-08-10-backup.sql").is_some());
    }

    #[tokio::test]
    async fn periodic_tiers_are_never_pruned() {
        let store = MemoryStore::new();
        store.seed("monthly/2024-01-backup.sql", b"m", HashMap::new(), Utc::now());
        store.seed("yearly/2020-backup.sql", b"y", HashMap::new(), Utc::now());

        let report = RetentionPruner::default().prune(&store, date(2025, 8, 10)).await;
        assert!(report.deleted.is_empty());
        assert_eq!(store.keys().len(), 2);
    }

    #[tokio::test]
    async fn malformed_key_is_a_warning_not_an_error() {
        let store = MemoryStore::new();
        seed_august(&store, 1..=1);
        store.seed("daily/notes.txt", b"?", HashMap::new(), Utc::now());
        store.seed("daily/", b"", HashMap::new(), Utc::now());

        let report = RetentionPruner::new(7).prune(&store, date(2025, 8, 10)).await;

        assert_eq!(report.deleted, vec!["daily/2025-08-01-backup.sql"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(&report.warnings[0], RunWarning::MalformedKey { key, .. } if key == "daily/notes.txt"));
        assert!(store.object("daily/notes.txt").is_some());
    }

    #[tokio::test]
    async fn delete_failure_does_not_stop_pruning() {
        let store = MemoryStore::new();
        seed_august(&store, 1..=3);
        store.fail_delete("daily/2025-08-01-backup.sql");

        let report = RetentionPruner::new(7).prune(&store, date(2025, 8, 11)).await;

        assert_eq!(
            report.deleted,
            vec!["daily/2025-08-02-backup.sql", "daily/2025-08-03-backup.sql"]
        );
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(&report.warnings[0], RunWarning::Prune { key, .. } if key == "daily/2025-08-01-backup.sql"));
    }

    #[tokio::test]
    async fn listing_failure_is_reported() {
        let store = MemoryStore::new();
        store.fail_list();

        let report = RetentionPruner::default().prune(&store, date(2025, 8, 10)).await;
        assert!(report.deleted.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn cutoff_is_calendar_based() {
        let pruner = RetentionPruner::new(7);
        assert_eq!(pruner.cutoff(date(2025, 3, 3)), date(2025, 2, 24));
    }
}
