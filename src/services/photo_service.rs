//! PhotoService — the upload and download flows.
//!
//! Upload writes the payload to object storage first and only then creates
//! the metadata document, so a failed storage write never leaves a record
//! behind. The reverse window is accepted: when the metadata write fails
//! the object stays in storage without a record (logged at `warn`).

use crate::{
    config::ServiceConfig,
    models::photo::{
        PhotoRecord, PhotoUpload, StoredPhoto, file_extension, public_url, storage_key,
    },
    services::{
        metadata_store::{FirestoreMetadataStore, MetadataError, MetadataStore},
        object_store::{ObjectStore, ObjectTags, R2ObjectStore, StorageError},
    },
};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("photo `{0}` not found")]
    PhotoNotFound(String),
    #[error("photo `{0}` has no storage key; it belongs to a different storage backend")]
    LegacyRecord(String),
    #[error("payload for photo `{0}` not found in storage")]
    ObjectMissing(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type PhotoResult<T> = Result<T, PhotoError>;

/// Shared, cheaply clonable handle over both backends.
#[derive(Clone)]
pub struct PhotoService {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    public_base_url: String,
}

impl PhotoService {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            metadata,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the R2 and Firestore clients from validated configuration.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let objects = R2ObjectStore::new(&config.storage).await;
        let metadata = FirestoreMetadataStore::new(&config.metadata)?;
        Ok(Self::new(
            Arc::new(objects),
            Arc::new(metadata),
            config.storage.public_base_url.clone(),
        ))
    }

    /// Store an already validated upload and record its metadata.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    pub async fn upload_photo(&self, event_id: &str, upload: PhotoUpload) -> PhotoResult<PhotoRecord> {
        let photo_id = Uuid::new_v4().to_string();
        let extension = file_extension(&upload.file_name, &upload.content_type);
        let key = storage_key(event_id, &photo_id, &extension);
        let uploaded_at = Utc::now();
        let size = upload.bytes.len() as u64;

        let tags = ObjectTags {
            event_id: event_id.to_string(),
            original_name: upload.file_name.clone(),
            uploaded_at,
        };
        self.objects
            .put_object(&key, upload.bytes, &upload.content_type, &tags)
            .await?;

        let record = PhotoRecord {
            id: photo_id,
            storage_key: Some(key.clone()),
            url: public_url(&self.public_base_url, &key),
            event_id: event_id.to_string(),
            file_name: upload.file_name,
            size,
            content_type: Some(upload.content_type),
            uploaded_at,
        };

        if let Err(err) = self.metadata.create_photo(&record).await {
            warn!(
                storage_key = %key,
                error = %err,
                "metadata write failed; stored object has no record"
            );
            return Err(err.into());
        }

        info!(photo_id = %record.id, storage_key = %key, size, "photo uploaded");
        Ok(record)
    }

    /// Resolve a photo id to its record and payload.
    #[instrument(skip(self))]
    pub async fn fetch_photo(&self, photo_id: &str) -> PhotoResult<StoredPhoto> {
        let record = self
            .metadata
            .get_photo(photo_id)
            .await?
            .ok_or_else(|| PhotoError::PhotoNotFound(photo_id.to_string()))?;

        let Some(key) = record.storage_key.as_deref() else {
            warn!("photo record has no storage key");
            return Err(PhotoError::LegacyRecord(photo_id.to_string()));
        };

        let body = match self.objects.get_object(key).await {
            Ok(body) => body,
            Err(StorageError::NotFound(_)) => {
                warn!(storage_key = %key, "record exists but object is missing");
                return Err(PhotoError::ObjectMissing(photo_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        info!(storage_key = %key, size = body.len(), "photo fetched");
        Ok(StoredPhoto { record, body })
    }
}
