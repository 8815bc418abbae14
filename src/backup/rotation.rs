//! Retention tiers and the key layout they write to.
//!
//! Layout (must stay stable, existing buckets depend on it):
//! `daily/YYYY-MM-DD-backup.sql`, `monthly/YYYY-MM-backup.sql`, `yearly/YYYY-backup.sql`.

use chrono::NaiveDate;
use std::fmt;
use tracing::warn;

use crate::errors::{RunWarning, StoreError};
use crate::storage::ArtifactStore;

const KEY_SUFFIX: &str = "-backup.sql";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionTier {
    Daily,
    Monthly,
    Yearly,
}

/// When a tier gets written for a run whose content changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRule {
    /// Every changed run writes (and may overwrite today's key).
    Always,
    /// Only when nothing exists yet for the current period. First backup wins.
    FirstOfPeriod,
}

impl RetentionTier {
    pub const ALL: [RetentionTier; 3] = [
        RetentionTier::Daily,
        RetentionTier::Monthly,
        RetentionTier::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionTier::Daily => "daily",
            RetentionTier::Monthly => "monthly",
            RetentionTier::Yearly => "yearly",
        }
    }

    /// Listing prefix, including the trailing slash.
    pub fn prefix(&self) -> &'static str {
        match self {
            RetentionTier::Daily => "daily/",
            RetentionTier::Monthly => "monthly/",
            RetentionTier::Yearly => "yearly/",
        }
    }

    fn date_format(&self) -> &'static str {
        match self {
            RetentionTier::Daily => "%Y-%m-%d",
            RetentionTier::Monthly => "%Y-%m",
            RetentionTier::Yearly => "%Y",
        }
    }

    pub fn write_rule(&self) -> WriteRule {
        match self {
            RetentionTier::Daily => WriteRule::Always,
            RetentionTier::Monthly | RetentionTier::Yearly => WriteRule::FirstOfPeriod,
        }
    }

    /// Canonical key of the period containing `date`.
    pub fn key_for(&self, date: NaiveDate) -> String {
        format!(
            "{}{}{}",
            self.prefix(),
            date.format(self.date_format()),
            KEY_SUFFIX
        )
    }

    /// Recovers the first day of the period a key names.
    ///
    /// Only keys produced by [`RetentionTier::key_for`] parse; nested paths
    /// and foreign names are rejected.
    pub fn parse_key(&self, key: &str) -> Result<NaiveDate, String> {
        let stem = key
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_suffix(KEY_SUFFIX))
            .ok_or_else(|| format!("expected {}<date>{}", self.prefix(), KEY_SUFFIX))?;
        if stem.contains('/') {
            return Err("nested path under tier prefix".to_string());
        }
        let padded = match self {
            RetentionTier::Daily => stem.to_string(),
            RetentionTier::Monthly => format!("{stem}-01"),
            RetentionTier::Yearly => format!("{stem}-01-01"),
        };
        let date = NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
            .map_err(|e| format!("invalid date {stem:?}: {e}"))?;
        // Reject non-canonical spellings such as "2025-8-1".
        if self.key_for(date) != key {
            return Err(format!("non-canonical date {stem:?}"));
        }
        Ok(date)
    }
}

impl fmt::Display for RetentionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The key a tier targets for one run, and whether it has to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierDecision {
    pub tier: RetentionTier,
    pub key: String,
    pub write: bool,
    pub warning: Option<RunWarning>,
}

/// Decides per tier which key a run targets and whether it must be written.
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationPolicy;

impl RotationPolicy {
    pub fn required_key(&self, tier: RetentionTier, today: NaiveDate) -> String {
        tier.key_for(today)
    }

    /// Daily always writes. Periodic tiers write only when the period's key is absent.
    pub async fn needs_write<S: ArtifactStore + ?Sized>(
        &self,
        tier: RetentionTier,
        key: &str,
        store: &S,
    ) -> Result<bool, StoreError> {
        match tier.write_rule() {
            WriteRule::Always => Ok(true),
            WriteRule::FirstOfPeriod => Ok(!store.exists(key).await?),
        }
    }

    /// Like [`RotationPolicy::needs_write`], but a failed existence check
    /// degrades to a warning and the write proceeds.
    pub async fn decide<S: ArtifactStore + ?Sized>(
        &self,
        tier: RetentionTier,
        today: NaiveDate,
        store: &S,
    ) -> TierDecision {
        let key = self.required_key(tier, today);
        match self.needs_write(tier, &key, store).await {
            Ok(write) => TierDecision {
                tier,
                key,
                write,
                warning: None,
            },
            Err(e) => {
                warn!(%tier, key = %key, error = %e, "existence check failed, writing anyway");
                let warning = RunWarning::Lookup {
                    context: format!("existence check for {key}"),
                    message: e.to_string(),
                };
                TierDecision {
                    tier,
                    key,
                    write: true,
                    warning: Some(warning),
                }
            }
        }
    }
}
