//! Object storage for photo payloads.
//!
//! `ObjectStore` is the seam the photo service talks to; `R2ObjectStore`
//! implements it with the AWS S3 SDK pointed at an R2 (or any other
//! S3-compatible) endpoint.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client as S3Client, config::Builder as S3ConfigBuilder, config::Credentials,
    error::DisplayErrorContext, primitives::ByteStream,
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object storage request failed: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Custom metadata stored alongside each object.
#[derive(Clone, Debug)]
pub struct ObjectTags {
    pub event_id: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing anything already there.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        tags: &ObjectTags,
    ) -> StorageResult<()>;

    /// Read the full payload stored under `key`.
    ///
    /// Returns `NotFound` when the key does not exist or holds no payload.
    async fn get_object(&self, key: &str) -> StorageResult<Bytes>;
}

/// S3-compatible client bound to a single bucket.
pub struct R2ObjectStore {
    client: S3Client,
    bucket: String,
}

impl R2ObjectStore {
    /// Build a client for the configured endpoint with static credentials.
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "photo-relay-static",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = S3ConfigBuilder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            bucket = %config.bucket,
            endpoint = %config.endpoint_url(),
            "object store client initialized"
        );

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    #[instrument(skip(self, body, tags), fields(bucket = %self.bucket, size = body.len()))]
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        tags: &ObjectTags,
    ) -> StorageResult<()> {
        let size = body.len() as i64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .content_length(size)
            .metadata("event-id", metadata_value(&tags.event_id))
            .metadata("original-name", metadata_value(&tags.original_name))
            .metadata(
                "uploaded-at",
                tags.uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .send()
            .await
            .map_err(|err| StorageError::Backend(DisplayErrorContext(&err).to_string()))?;

        debug!(key, "object stored");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get_object(&self, key: &str) -> StorageResult<Bytes> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(err) => {
                return Err(StorageError::Backend(
                    DisplayErrorContext(&err).to_string(),
                ));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?
            .into_bytes();

        if body.is_empty() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        debug!(key, size = body.len(), "object fetched");
        Ok(body)
    }
}

/// S3 user metadata travels as HTTP headers; keep values printable ASCII.
fn metadata_value(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}
