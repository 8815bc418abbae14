use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{info, warn};

use super::dedup::DedupGate;
use super::fingerprint::{Fingerprint, normalize};
use super::pruner::RetentionPruner;
use super::rotation::{RetentionTier, RotationPolicy};
use crate::config::RetentionConfig;
use crate::errors::{BackupError, Result, RunWarning};
use crate::storage::{ArtifactStore, CHECKSUM_METADATA_KEY};

/// One object written during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub tier: RetentionTier,
    pub key: String,
}

/// Aggregate result of one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub fingerprint: Fingerprint,
    /// Content matched the most recent daily backup; nothing was written.
    pub skipped: bool,
    pub written: Vec<WrittenArtifact>,
    /// Whether the pruning step ran at all.
    pub pruning_ran: bool,
    pub pruned: Vec<String>,
    pub warnings: Vec<RunWarning>,
}

impl RunOutcome {
    fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            skipped: false,
            written: Vec::new(),
            pruning_ran: false,
            pruned: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn wrote(&self, tier: RetentionTier) -> bool {
        self.written.iter().any(|w| w.tier == tier)
    }
}

/// Sequences fingerprint, dedup, tier writes and pruning for one dump.
pub struct BackupOrchestrator<'a, S: ArtifactStore + ?Sized> {
    store: &'a S,
    policy: RotationPolicy,
    gate: DedupGate,
    pruner: RetentionPruner,
    prune_on_skip: bool,
}

impl<'a, S: ArtifactStore + ?Sized> BackupOrchestrator<'a, S> {
    pub fn new(store: &'a S, retention: &RetentionConfig) -> Self {
        Self {
            store,
            policy: RotationPolicy,
            gate: DedupGate,
            pruner: RetentionPruner::new(retention.daily_horizon_days),
            prune_on_skip: retention.prune_on_skip,
        }
    }

    /// Runs the lifecycle for `dump` as produced on `today`.
    ///
    /// Only a failed daily write is fatal; every other store problem ends up
    /// in [`RunOutcome::warnings`].
    pub async fn run(&self, dump: &[u8], today: NaiveDate) -> Result<RunOutcome> {
        let payload = normalize(dump);
        let fingerprint = Fingerprint::of_normalized(&payload);
        info!(
            %fingerprint,
            raw_bytes = dump.len(),
            bytes = payload.len(),
            "dump fingerprinted"
        );

        let mut outcome = RunOutcome::new(fingerprint.clone());

        let dedup = self.gate.should_skip(&fingerprint, self.store).await;
        outcome.warnings.extend(dedup.warnings);
        if dedup.skip {
            outcome.skipped = true;
            info!(
                previous = dedup.compared_with.as_deref().unwrap_or_default(),
                "backup content unchanged, skipping all uploads"
            );
            if self.prune_on_skip {
                self.prune_into(&mut outcome, today).await;
            } else {
                info!("pruning disabled for skipped runs");
            }
            return Ok(outcome);
        }

        let metadata = HashMap::from([(
            CHECKSUM_METADATA_KEY.to_string(),
            fingerprint.to_string(),
        )]);

        let daily_key = self.policy.required_key(RetentionTier::Daily, today);
        self.store
            .put(&daily_key, &payload, &metadata)
            .await
            .map_err(|source| BackupError::DailyWrite {
                key: daily_key.clone(),
                source,
            })?;
        info!(key = %daily_key, "daily backup uploaded");
        outcome.written.push(WrittenArtifact {
            tier: RetentionTier::Daily,
            key: daily_key,
        });

        let (monthly, yearly) = tokio::join!(
            self.write_periodic(RetentionTier::Monthly, today, &payload, &metadata),
            self.write_periodic(RetentionTier::Yearly, today, &payload, &metadata),
        );
        for (written, warnings) in [monthly, yearly] {
            outcome.written.extend(written);
            outcome.warnings.extend(warnings);
        }

        self.prune_into(&mut outcome, today).await;
        Ok(outcome)
    }

    async fn write_periodic(
        &self,
        tier: RetentionTier,
        today: NaiveDate,
        payload: &[u8],
        metadata: &HashMap<String, String>,
    ) -> (Option<WrittenArtifact>, Vec<RunWarning>) {
        let decision = self.policy.decide(tier, today, self.store).await;
        let mut warnings: Vec<RunWarning> = decision.warning.into_iter().collect();
        if !decision.write {
            info!(%tier, key = %decision.key, "backup for this period already exists");
            return (None, warnings);
        }

        match self.store.put(&decision.key, payload, metadata).await {
            Ok(()) => {
                info!(%tier, key = %decision.key, "periodic backup created");
                (
                    Some(WrittenArtifact {
                        tier,
                        key: decision.key,
                    }),
                    warnings,
                )
            }
            Err(e) => {
                warn!(%tier, key = %decision.key, error = %e, "failed to upload periodic backup");
                warnings.push(RunWarning::TierWrite {
                    tier,
                    key: decision.key,
                    message: e.to_string(),
                });
                (None, warnings)
            }
        }
    }

    async fn prune_into(&self, outcome: &mut RunOutcome, today: NaiveDate) {
        let report = self.pruner.prune(self.store, today).await;
        outcome.pruning_ran = true;
        outcome.pruned.extend(report.deleted);
        outcome.warnings.extend(report.warnings);
    }
}
