use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::context::build_record;
use crate::config::TrackingConfig;
use crate::storage::VisitBuffer;

pub struct TrackState {
    pub buffer: Arc<VisitBuffer>,
    pub config: TrackingConfig,
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    /// Visited path; defaults to "/" when the snippet omits it
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    "/".to_string()
}

/// Record one page visit
pub async fn track_visit(
    State(state): State<Arc<TrackState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<TrackQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().timestamp();
    let record = build_record(&headers, addr.ip(), &query.url, timestamp, &state.config);

    // Non-blocking hand-off; persistence happens in the flush task
    state.buffer.record(record);

    StatusCode::NO_CONTENT
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
