// pgbackup-tiers/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use tracing::debug;

use super::{ArtifactStore, ObjectSummary};
use crate::config::S3StorageConfig;
use crate::errors::StoreError;

const SQL_CONTENT_TYPE: &str = "application/sql";

/// [`ArtifactStore`] backed by an S3-compatible bucket (AWS S3, DigitalOcean Spaces, MinIO).
pub struct S3ArtifactStore {
    client: s3::Client,
    bucket: String,
}

impl S3ArtifactStore {
    /// Builds a client from the storage configuration.
    ///
    /// Explicit credentials, region and endpoint win; anything left unset
    /// falls back to the default AWS provider chain.
    pub async fn connect(storage: &S3StorageConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if let Some(region) = &storage.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &storage.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(credentials) = &storage.credentials {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ));
        }
        let sdk_config = loader.load().await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(storage.force_path_style)
            .build();

        debug!(bucket = %storage.bucket_name, "S3 client configured");
        Self {
            client: s3::Client::from_conf(s3_config),
            bucket: storage.bucket_name.clone(),
        }
    }
}

fn request_error<E>(operation: &'static str, key: &str, err: E) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::Request {
        operation,
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        debug!(bucket = %self.bucket, key, bytes = body.len(), "put_object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(SQL_CONTENT_TYPE)
            .set_metadata(Some(metadata.clone()))
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map_err(|e| request_error("put", key, e))?;
        Ok(())
    }

    async fn head_metadata(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        debug!(bucket = %self.bucket, key, "head_object");
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(output.metadata().cloned().unwrap_or_default()),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(request_error("head", key, e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        debug!(bucket = %self.bucket, key, "get_object");
        let object = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(object) => object,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(request_error("get", key, e)),
        };

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| request_error("get", key, e))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StoreError> {
        debug!(bucket = %self.bucket, prefix, "list_objects_v2");
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| request_error("list", prefix, e))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    last_modified,
                });
            }
        }
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        debug!(bucket = %self.bucket, key, "delete_object");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| request_error("delete", key, e))?;
        Ok(())
    }
}
