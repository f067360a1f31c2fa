use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{health_check, track_visit, TrackState};

pub fn create_track_router(state: Arc<TrackState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/track", get(track_visit))
        .with_state(state)
}
