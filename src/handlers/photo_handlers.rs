//! HTTP handlers for photo upload and download.
//! Form parsing and response shaping live here; the storage and metadata
//! calls are delegated to `PhotoService`.

use crate::{
    errors::AppError,
    models::photo::{
        MAX_PHOTO_BYTES, PhotoRecord, PhotoUpload, UploadResponse, base_file_name, is_image,
        validate_event_id,
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::Response,
};
use bytes::BytesMut;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::{debug, info, warn};

const PHOTO_FIELD: &str = "photo";
const EVENT_ID_FIELD: &str = "eventId";
const DEFAULT_FILE_NAME: &str = "photo";

/// RFC 5987 `attr-char`s pass through; everything else is escaped.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Query form of the download endpoint: `GET /download?photoId=...`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(rename = "photoId")]
    pub photo_id: Option<String>,
}

/// `POST /upload` — multipart form with a `photo` file and an `eventId`.
///
/// Configuration is checked before the body is touched, and every form
/// problem is rejected before anything is written.
pub async fn upload_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let photos = state.photos()?;

    let multipart = multipart.map_err(|rejection| {
        AppError::bad_request("Invalid multipart payload").with_details(rejection.body_text())
    })?;
    let (upload, event_id) = read_upload_form(multipart).await?;

    let upload = upload.ok_or_else(|| AppError::bad_request("No photo uploaded"))?;
    let event_id = event_id.unwrap_or_default();
    let event_id = validate_event_id(&event_id).map_err(AppError::bad_request)?;

    let record = photos
        .upload_photo(event_id, upload)
        .await
        .map_err(AppError::upload_failed)?;

    Ok(Json(UploadResponse::from(&record)))
}

/// `GET /download/{photo_id}`
///
/// Extraction failures (an id that is not valid UTF-8, say) are reported
/// as JSON once configuration has been checked.
pub async fn download_photo(
    State(state): State<AppState>,
    photo_id: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    state.photos()?;
    let Path(photo_id) = photo_id.map_err(|rejection| {
        AppError::bad_request("Invalid photo ID").with_details(rejection.body_text())
    })?;
    serve_photo(&state, &photo_id).await
}

/// `GET /download?photoId=...`, also mounted at `/download/`.
pub async fn download_photo_by_query(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    state.photos()?;
    let Query(query) = query.map_err(|rejection| {
        AppError::bad_request("Invalid query string").with_details(rejection.body_text())
    })?;
    serve_photo(&state, query.photo_id.as_deref().unwrap_or_default()).await
}

/// Fallback for any method a photo route does not serve.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    debug!(%method, path = %uri.path(), "method not allowed");
    AppError::method_not_allowed()
}

/// Fallback for paths no route matches.
pub async fn route_not_found(uri: Uri) -> AppError {
    debug!(path = %uri.path(), "no route");
    AppError::not_found("Not found")
}

async fn serve_photo(state: &AppState, photo_id: &str) -> Result<Response, AppError> {
    let photos = state.photos()?;

    let photo_id = photo_id.trim();
    if photo_id.is_empty() {
        return Err(AppError::bad_request("Photo ID is required"));
    }

    let photo = photos.fetch_photo(photo_id).await?;
    let length = photo.body.len();

    let mut response = Response::new(Body::from(photo.body));
    *response.status_mut() = StatusCode::OK;
    set_photo_headers(response.headers_mut(), &photo.record, length);

    info!(photo_id, size = length, "photo served");
    Ok(response)
}

/// Walk the form, keeping the photo and the event id. Unknown fields are
/// skipped.
async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(Option<PhotoUpload>, Option<String>), AppError> {
    let mut upload = None;
    let mut event_id = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(PHOTO_FIELD) => {
                if upload.is_some() {
                    return Err(AppError::bad_request("Only one photo may be uploaded"));
                }
                upload = Some(read_photo_field(field).await?);
            }
            Some(EVENT_ID_FIELD) => {
                event_id = Some(field.text().await.map_err(invalid_multipart)?);
            }
            other => debug!(field = ?other, "ignoring unexpected form field"),
        }
    }

    Ok((upload, event_id))
}

/// Validate the content type up front, then buffer the file while enforcing
/// the size cap.
async fn read_photo_field(mut field: Field<'_>) -> Result<PhotoUpload, AppError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !is_image(&content_type) {
        warn!(content_type = %content_type, "rejected non-image upload");
        return Err(AppError::bad_request("Only image files are allowed")
            .with_details(format!("unsupported content type `{content_type}`")));
    }

    let file_name = field
        .file_name()
        .map(base_file_name)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();

    // Past the cap the rest of the field is read and dropped so the client
    // gets the 400 instead of a reset connection. The route's body limit
    // bounds how much that can be.
    let mut buffer = BytesMut::new();
    let mut oversized = false;
    while let Some(chunk) = field.chunk().await.map_err(invalid_multipart)? {
        if oversized || buffer.len() + chunk.len() > MAX_PHOTO_BYTES {
            oversized = true;
            continue;
        }
        buffer.extend_from_slice(&chunk);
    }

    if oversized {
        warn!(file_name = %file_name, "rejected oversized upload");
        return Err(AppError::bad_request("File too large")
            .with_details(format!("maximum size is {MAX_PHOTO_BYTES} bytes")));
    }

    if buffer.is_empty() {
        return Err(AppError::bad_request("Uploaded file is empty"));
    }

    Ok(PhotoUpload {
        file_name,
        content_type,
        bytes: buffer.freeze(),
    })
}

fn invalid_multipart(err: MultipartError) -> AppError {
    AppError::bad_request("Invalid multipart payload").with_details(err.body_text())
}

fn set_photo_headers(headers: &mut HeaderMap, record: &PhotoRecord, length: usize) {
    let content_type = record
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_bytes(content_disposition(&record.file_name).as_bytes())
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}

/// `attachment; filename="..."` with quotes, backslashes and control
/// characters removed from the name. Non-ASCII names get an ASCII fallback
/// (`_` for each such character) plus an RFC 5987 `filename*`.
fn content_disposition(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.is_ascii() {
        return format!("attachment; filename=\"{cleaned}\"");
    }

    let fallback: String = cleaned
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        utf8_percent_encode(&cleaned, ATTR_CHAR)
    )
}
