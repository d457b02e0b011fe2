//! Defines routes for the photo relay.
//!
//! ## Structure
//! - **Health**
//!   - `GET  /healthz` — liveness
//!   - `GET  /readyz` — configuration readiness
//!
//! - **Photos**
//!   - `POST /upload` — multipart upload (`photo` file + `eventId`)
//!   - `GET  /download/{photo_id}` — download by path id
//!   - `GET  /download?photoId=` — download by query id (`/download/` too)
//!
//! Any other method on a photo route answers 405 with a JSON error. `HEAD`
//! is rejected explicitly because axum would otherwise serve it via `GET`.
//! Unknown paths answer a JSON 404.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        photo_handlers::{
            download_photo, download_photo_by_query, method_not_allowed, route_not_found,
            upload_photo,
        },
    },
    models::photo::MAX_PHOTO_BYTES,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Headroom over the file cap for multipart boundaries and the other fields,
/// so oversized files reach the handler's own size check.
const UPLOAD_BODY_LIMIT: usize = MAX_PHOTO_BYTES + 1024 * 1024;

/// Build and return the router for all photo routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // photo routes
        .route(
            "/upload",
            post(upload_photo)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/download",
            get(download_photo_by_query)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route(
            "/download/",
            get(download_photo_by_query)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route(
            "/download/{photo_id}",
            get(download_photo)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .fallback(route_not_found)
}
