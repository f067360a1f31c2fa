use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{get_stats, health_check, AppState};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
