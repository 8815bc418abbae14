//! Skip runs whose content equals the most recent daily backup.
//!
//! Lookback is bounded to the single most recently modified daily object.
//! A revert to older content that has since been pruned is stored again.

use tracing::{debug, info, warn};

use super::fingerprint::Fingerprint;
use super::rotation::RetentionTier;
use crate::errors::{RunWarning, StoreError};
use crate::storage::{ArtifactStore, CHECKSUM_METADATA_KEY, ObjectSummary};

/// Result of a dedup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupDecision {
    pub skip: bool,
    /// The daily object compared against, if any.
    pub compared_with: Option<String>,
    pub warnings: Vec<RunWarning>,
}

impl DedupDecision {
    fn proceed(compared_with: Option<String>, warnings: Vec<RunWarning>) -> Self {
        Self {
            skip: false,
            compared_with,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupGate;

impl DedupGate {
    /// Most recently written daily object by store modification time.
    /// Equal timestamps fall back to the greater key.
    pub async fn most_recent<S: ArtifactStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Option<ObjectSummary>, StoreError> {
        let objects = store.list(RetentionTier::Daily.prefix()).await?;
        Ok(objects
            .into_iter()
            .filter(|o| o.key != RetentionTier::Daily.prefix())
            .max_by(|a, b| {
                a.last_modified
                    .cmp(&b.last_modified)
                    .then_with(|| a.key.cmp(&b.key))
            }))
    }

    /// Fingerprint of a stored object: metadata first, re-hash of the body
    /// for objects written before fingerprints were recorded.
    pub async fn stored_fingerprint<S: ArtifactStore + ?Sized>(
        &self,
        store: &S,
        key: &str,
    ) -> Result<Fingerprint, StoreError> {
        let metadata = store.head_metadata(key).await?;
        if let Some(hex) = metadata.get(CHECKSUM_METADATA_KEY).filter(|h| !h.trim().is_empty()) {
            debug!(key, "fingerprint read from metadata");
            return Ok(Fingerprint::from_hex(hex));
        }

        debug!(key, "no fingerprint metadata, hashing stored payload");
        let body = store.get(key).await?;
        Ok(Fingerprint::of(&body))
    }

    /// Decides whether the run can be skipped. Lookup failures never skip.
    pub async fn should_skip<S: ArtifactStore + ?Sized>(
        &self,
        new_fingerprint: &Fingerprint,
        store: &S,
    ) -> DedupDecision {
        let latest = match self.most_recent(store).await {
            Ok(Some(latest)) => latest,
            Ok(None) => {
                info!("no previous daily backup, proceeding");
                return DedupDecision::proceed(None, Vec::new());
            }
            Err(e) => {
                warn!(error = %e, "could not list daily backups, assuming content changed");
                return DedupDecision::proceed(
                    None,
                    vec![RunWarning::Lookup {
                        context: "finding most recent daily backup".to_string(),
                        message: e.to_string(),
                    }],
                );
            }
        };

        match self.stored_fingerprint(store, &latest.key).await {
            Ok(existing) if existing == *new_fingerprint => {
                info!(key = %latest.key, fingerprint = %existing, "backup content unchanged");
                DedupDecision {
                    skip: true,
                    compared_with: Some(latest.key),
                    warnings: Vec::new(),
                }
            }
            Ok(existing) => {
                debug!(key = %latest.key, previous = %existing, current = %new_fingerprint, "backup content changed");
                DedupDecision::proceed(Some(latest.key), Vec::new())
            }
            Err(e) => {
                warn!(key = %latest.key, error = %e, "could not read previous fingerprint, assuming content changed");
                let warning = RunWarning::Lookup {
                    context: format!("fingerprint of {}", latest.key),
                    message: e.to_string(),
                };
                DedupDecision::proceed(Some(latest.key), vec![warning])
            }
        }
    }
}
