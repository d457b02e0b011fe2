//! Event photo relay: multipart uploads go to S3-compatible object storage
//! with a metadata document per photo in Firestore; downloads resolve the
//! document and stream back the stored bytes.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use state::AppState;
use tower_http::trace::TraceLayer;

/// Full application router with request tracing.
pub fn app(state: AppState) -> Router {
    routes::routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
