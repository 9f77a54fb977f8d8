//! Health and stats endpoints

use axum::{
    Json,
    extract::{Query, State as AxumState},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::SharedState;
use crate::stats::StatsSnapshot;

const SERVICE_NAME: &str = "git_push_notify";

/// Server statistics
#[derive(Debug, Serialize)]
pub struct ServerStats {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub repository: String,
    pub environment: String,
}

/// Combined stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub server: ServerStats,
    pub webhooks: StatsSnapshot,
}

/// GET / - health check, `?format=json` for detail
pub async fn root(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("format").map(String::as_str) == Some("json") {
        let settings = state.notifier.settings();
        Json(json!({
            "name": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.start_time.elapsed().as_secs(),
            "repository": settings.repository,
            "subscribers": state.subscriber_count,
            "status": "healthy"
        }))
        .into_response()
    } else {
        format!("{} - healthy", SERVICE_NAME).into_response()
    }
}

/// GET /status - server info and webhook counters
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatsResponse> {
    let settings = state.notifier.settings();

    let server = ServerStats {
        name: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
        repository: settings.repository.clone(),
        environment: settings.environment.clone(),
    };

    Json(StatsResponse {
        server,
        webhooks: state.notifier.stats().snapshot(),
    })
}
