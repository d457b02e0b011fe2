use crate::{config::ConfigError, services::photo_service::PhotoError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Error returned from every handler. Rendered as
/// `{"error": ..., "details": ..., "status": ...}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    /// Attach a human-readable cause.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    /// Backends were never configured.
    pub fn configuration(err: &ConfigError) -> Self {
        Self::internal("Server configuration error").with_details(err.to_string())
    }

    /// Any failure once an upload has passed validation.
    pub fn upload_failed(err: PhotoError) -> Self {
        Self::internal("Upload failed").with_details(err.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(details) = self.details {
            body["details"] = json!(details);
        }

        (self.status, Json(body)).into_response()
    }
}

/// Download-side mapping; upload goes through [`AppError::upload_failed`].
impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        match err {
            PhotoError::PhotoNotFound(_) => AppError::not_found("Photo not found"),
            PhotoError::LegacyRecord(_) => {
                AppError::bad_request("Photo is not stored in object storage").with_details(
                    "This photo was recorded by a different storage backend and has no storage key",
                )
            }
            PhotoError::ObjectMissing(_) => AppError::not_found("File not found in storage"),
            other => AppError::internal("Download failed").with_details(other.to_string()),
        }
    }
}
