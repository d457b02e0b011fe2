//! Photo metadata record and the helpers that derive storage keys from it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Largest accepted photo payload (10 MiB).
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

const MAX_EVENT_ID_LEN: usize = 256;

/// Everything outside RFC 3986's unreserved characters.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A photo as recorded in the `photos` collection.
///
/// Records are written once by the upload path and never modified. Older
/// records created against a different storage backend have no
/// `storage_key` and cannot be served by the download path.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    /// Document id; UUID v4 for records written by this service.
    pub id: String,

    /// Object key (`events/{eventId}/photos/{id}.{ext}`).
    pub storage_key: Option<String>,

    /// Public URL built from the configured base URL and the key.
    pub url: String,

    pub event_id: String,

    /// Original filename sent by the client.
    pub file_name: String,

    /// Size in bytes.
    pub size: u64,

    /// MIME type of the stored payload.
    pub content_type: Option<String>,

    pub uploaded_at: DateTime<Utc>,
}

/// A validated file taken from an upload form.
#[derive(Clone, Debug)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Record plus payload, as returned to the download handler.
#[derive(Clone, Debug)]
pub struct StoredPhoto {
    pub record: PhotoRecord,
    pub body: Bytes,
}

/// JSON body of a successful upload.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub photo_id: String,
    pub url: String,
    pub file_name: String,
    pub size: u64,
}

impl From<&PhotoRecord> for UploadResponse {
    fn from(record: &PhotoRecord) -> Self {
        Self {
            success: true,
            photo_id: record.id.clone(),
            url: record.url.clone(),
            file_name: record.file_name.clone(),
            size: record.size,
        }
    }
}

/// Object key for a photo within its event.
pub fn storage_key(event_id: &str, photo_id: &str, extension: &str) -> String {
    format!("events/{event_id}/photos/{photo_id}.{extension}")
}

/// Public URL of `key` under `base_url`, each key segment percent-encoded.
pub fn public_url(base_url: &str, key: &str) -> String {
    let path: Vec<String> = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), path.join("/"))
}

/// Extension used in the storage key: whatever follows the last `.` of the
/// filename. Names without one (or ending in `.`) fall back to the MIME
/// subtype, so `image/png` gives `png`.
pub fn file_extension(file_name: &str, content_type: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_string(),
        _ => content_type
            .split(';')
            .next()
            .and_then(|essence| essence.split_once('/'))
            .map(|(_, subtype)| subtype.trim())
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or("bin")
            .to_string(),
    }
}

/// Strip any client-side directory components from an uploaded filename.
pub fn base_file_name(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim()
}

/// True for `image/*` MIME types.
pub fn is_image(content_type: &str) -> bool {
    content_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Validate a caller-supplied event id before it is embedded in a key.
///
/// Rejects blank ids, path separators, `.`, `..` and control characters.
pub fn validate_event_id(raw: &str) -> Result<&str, &'static str> {
    let event_id = raw.trim();
    if event_id.is_empty() {
        return Err("Event ID is required");
    }
    if event_id.len() > MAX_EVENT_ID_LEN {
        return Err("Event ID is too long");
    }
    if event_id.contains(['/', '\\'])
        || event_id == "."
        || event_id.contains("..")
        || event_id.chars().any(char::is_control)
    {
        return Err("Event ID contains invalid characters");
    }
    Ok(event_id)
}
