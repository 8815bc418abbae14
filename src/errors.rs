use thiserror::Error;

use crate::backup::rotation::RetentionTier;

/// Fatal errors. Any of these aborts the run and fails the invocation.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Dump producer failed: {0}")]
    Producer(String),

    #[error("Failed to write daily backup {key}: {source}")]
    DailyWrite {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Run exceeded its deadline of {0} seconds")]
    TimedOut(u64),
}

/// Errors surfaced by an [`crate::storage::ArtifactStore`].
///
/// `NotFound` is a normal negative answer for lookups and must stay
/// distinguishable from request failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage {operation} failed for {key}: {message}")]
    Request {
        operation: &'static str,
        key: String,
        message: String,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Non-fatal problems collected during a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    #[error("Lookup failed ({context}): {message}")]
    Lookup { context: String, message: String },

    #[error("Failed to write {tier} backup {key}: {message}")]
    TierWrite {
        tier: RetentionTier,
        key: String,
        message: String,
    },

    #[error("Skipping malformed daily key {key}: {message}")]
    MalformedKey { key: String, message: String },

    #[error("Failed to prune {key}: {message}")]
    Prune { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, BackupError>;
