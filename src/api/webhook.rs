//! Webhook handler for GitHub push events

use axum::{
    body::Bytes,
    extract::Query,
    extract::State as AxumState,
    http::HeaderMap,
    response::IntoResponse,
};
use std::collections::HashMap;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::SharedState;
use crate::webhook::WebhookEvent;

/// POST /webhook
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what GitHub sent.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let dry_run = params.get("dry_run").map(|v| v == "true").unwrap_or(false)
        || headers.get("X-Dry-Run").is_some();

    let event = WebhookEvent::new(body, headers);
    let span = info_span!(
        "webhook",
        request_id = %Uuid::now_v7(),
        delivery = event.delivery_id().unwrap_or("-"),
        event = event.event_type().unwrap_or("-"),
        dry_run,
    );

    state.notifier.handle(&event, dry_run).instrument(span).await
}
