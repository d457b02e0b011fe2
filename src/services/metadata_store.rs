//! Photo metadata persistence.
//!
//! `FirestoreMetadataStore` talks to the Firestore REST API (v1) using an
//! API key. Documents live in the `photos` collection keyed by photo id and
//! use Firestore's typed value encoding (`stringValue`, `integerValue`,
//! `timestampValue`).

use crate::{config::MetadataConfig, models::photo::PhotoRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

const PHOTOS_COLLECTION: &str = "photos";
/// Firestore's limit on a document id, in bytes.
const MAX_DOCUMENT_ID_BYTES: usize = 1500;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("metadata store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed photo document `{id}`: {reason}")]
    Malformed { id: String, reason: String },
    #[error("invalid metadata endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create the document for `record`; fails if the id already exists.
    async fn create_photo(&self, record: &PhotoRecord) -> MetadataResult<()>;

    /// Fetch a photo document; `Ok(None)` when no document has this id.
    async fn get_photo(&self, photo_id: &str) -> MetadataResult<Option<PhotoRecord>>;
}

pub struct FirestoreMetadataStore {
    http: reqwest::Client,
    collection_url: Url,
    api_key: String,
}

/// Document shape returned by Firestore.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreDocument {
    #[serde(default)]
    fields: HashMap<String, Value>,
    create_time: Option<String>,
}

impl FirestoreMetadataStore {
    pub fn new(config: &MetadataConfig) -> MetadataResult<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: &MetadataConfig) -> MetadataResult<Self> {
        let raw = format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            config.endpoint.trim_end_matches('/'),
            config.project_id,
            PHOTOS_COLLECTION
        );
        let collection_url =
            Url::parse(&raw).map_err(|err| MetadataError::InvalidEndpoint(format!("{raw}: {err}")))?;

        Ok(Self {
            http,
            collection_url,
            api_key: config.api_key.clone(),
        })
    }

    fn document_url(&self, photo_id: &str) -> MetadataResult<Url> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| MetadataError::InvalidEndpoint(self.collection_url.to_string()))?
            .push(photo_id);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl MetadataStore for FirestoreMetadataStore {
    #[instrument(skip(self, record), fields(photo_id = %record.id))]
    async fn create_photo(&self, record: &PhotoRecord) -> MetadataResult<()> {
        let mut url = self.collection_url.clone();
        url.query_pairs_mut()
            .append_pair("documentId", &record.id)
            .append_pair("key", &self.api_key);

        let response = self
            .http
            .post(url)
            .json(&encode_record(record))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("photo document created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_photo(&self, photo_id: &str) -> MetadataResult<Option<PhotoRecord>> {
        if !is_document_id(photo_id) {
            debug!("id cannot name a document");
            return Ok(None);
        }
        let response = self.http.get(self.document_url(photo_id)?).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document: FirestoreDocument = response.json().await?;
                decode_record(photo_id, document).map(Some)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MetadataError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

/// Whether `id` can name a single document. `.` and `..` would collapse out
/// of the URL path and turn the lookup into a collection listing.
fn is_document_id(id: &str) -> bool {
    let reserved = id.len() >= 4 && id.starts_with("__") && id.ends_with("__");
    !id.is_empty()
        && id != "."
        && id != ".."
        && !reserved
        && !id.contains('/')
        && id.len() <= MAX_DOCUMENT_ID_BYTES
}

/// Encode a record as a Firestore document body.
fn encode_record(record: &PhotoRecord) -> Value {
    let mut fields = Map::new();
    fields.insert("id".into(), string_value(&record.id));
    if let Some(key) = &record.storage_key {
        fields.insert("storageKey".into(), string_value(key));
    }
    fields.insert("url".into(), string_value(&record.url));
    fields.insert("eventId".into(), string_value(&record.event_id));
    fields.insert("fileName".into(), string_value(&record.file_name));
    fields.insert(
        "size".into(),
        json!({ "integerValue": record.size.to_string() }),
    );
    if let Some(content_type) = &record.content_type {
        fields.insert("contentType".into(), string_value(content_type));
    }
    fields.insert(
        "uploadedAt".into(),
        json!({
            "timestampValue": record.uploaded_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        }),
    );

    json!({ "fields": fields })
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

/// Decode a Firestore document into a record.
///
/// Only `eventId` is mandatory. Legacy documents may lack the storage key,
/// content type or timestamp; the latter falls back to the document's
/// creation time.
fn decode_record(photo_id: &str, document: FirestoreDocument) -> MetadataResult<PhotoRecord> {
    let fields = &document.fields;
    let malformed = |reason: &str| MetadataError::Malformed {
        id: photo_id.to_string(),
        reason: reason.to_string(),
    };

    let event_id = string_field(fields, "eventId").ok_or_else(|| malformed("missing eventId"))?;

    let uploaded_at = match timestamp_field(fields, "uploadedAt") {
        Some(ts) => ts,
        None => document
            .create_time
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| malformed("missing uploadedAt"))?,
    };

    Ok(PhotoRecord {
        id: string_field(fields, "id").unwrap_or_else(|| photo_id.to_string()),
        storage_key: string_field(fields, "storageKey").filter(|k| !k.is_empty()),
        url: string_field(fields, "url").unwrap_or_default(),
        event_id,
        file_name: string_field(fields, "fileName").unwrap_or_else(|| "photo".to_string()),
        size: integer_field(fields, "size").unwrap_or(0),
        content_type: string_field(fields, "contentType").filter(|c| !c.is_empty()),
        uploaded_at,
    })
}

fn string_field(fields: &HashMap<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)?
        .get("stringValue")?
        .as_str()
        .map(str::to_string)
}

/// Firestore sends 64-bit integers as strings; older writers stored sizes
/// as doubles.
fn integer_field(fields: &HashMap<String, Value>, name: &str) -> Option<u64> {
    let value = fields.get(name)?;
    if let Some(int) = value.get("integerValue") {
        return match int {
            Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        };
    }
    value
        .get("doubleValue")?
        .as_f64()
        .filter(|d| *d >= 0.0)
        .map(|d| d as u64)
}

fn timestamp_field(fields: &HashMap<String, Value>, name: &str) -> Option<DateTime<Utc>> {
    fields
        .get(name)?
        .get("timestampValue")?
        .as_str()
        .and_then(parse_timestamp)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
