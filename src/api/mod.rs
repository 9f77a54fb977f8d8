//! HTTP surface: webhook intake plus health and stats

pub mod stats;
pub mod webhook;

use axum::{Router, extract::DefaultBodyLimit, routing};
use tower_http::trace::TraceLayer;

use crate::SharedState;

pub use stats::{root, status};
pub use webhook::handle_webhook;

/// GitHub caps webhook payloads at 25 MB.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .route(
            "/webhook",
            routing::post(handle_webhook).layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
