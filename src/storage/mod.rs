//! Blob storage boundary used by the backup core.
//!
//! The core only talks to [`ArtifactStore`]; `s3` provides the production
//! implementation and `memory` a fault-injectable one for tests.

pub(crate) mod s3;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::errors::StoreError;

/// User metadata key carrying the hex-encoded fingerprint of a stored dump.
pub const CHECKSUM_METADATA_KEY: &str = "sha256";

/// One entry returned by [`ArtifactStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Key/value blob store addressed by hierarchical string keys.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `body` at `key` with the given user metadata, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Reads the user metadata of `key` without fetching the body.
    async fn head_metadata(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Enumerates every object whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Single point lookup. "Not found" is `Ok(false)`, not an error.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.head_metadata(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
