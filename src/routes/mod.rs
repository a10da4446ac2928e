//! Route modules for Folio OCR

pub mod health;
pub mod jobs;
pub mod pages;
pub mod queue;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Headroom for the JSON envelope around a base64 document
const ENVELOPE_BYTES: usize = 64 * 1024;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    // Base64 inflates uploads by 4/3
    let body_limit = state.config().limits.max_upload_bytes / 3 * 4 + ENVELOPE_BYTES;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .nest("/api/v1/jobs", jobs::router())
        .nest("/api/v1/pages", pages::router())
        .nest("/api/v1/queue", queue::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
