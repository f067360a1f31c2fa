use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::stats::{compute_stats, Period, QueryError, StatsFilter, StatsResult};
use crate::storage::VisitStore;

pub struct AppState {
    pub store: Arc<dyn VisitStore>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Period selector; unknown values fall back to "overall"
    pub period: Option<String>,

    /// Drill-down dimension (language, url, browser)
    pub dimension: Option<String>,

    /// Value the dimension must equal exactly
    pub value: Option<String>,
}

/// Compute statistics over the stored record set
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResult>, (StatusCode, Json<ErrorResponse>)> {
    let period = Period::parse(query.period.as_deref().unwrap_or(""));

    let filter = parse_filter(&query).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let records = match state.store.load_all().await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Failed to load visit records: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to load visit records".to_string(),
                }),
            ));
        }
    };

    let now = Local::now();
    Ok(Json(compute_stats(&records, period, filter.as_ref(), &now)))
}

fn parse_filter(query: &StatsQuery) -> Result<Option<StatsFilter>, QueryError> {
    match (query.dimension.as_deref(), query.value.as_deref()) {
        (Some(dimension), Some(value)) => StatsFilter::parse(dimension, value).map(Some),
        (None, None) => Ok(None),
        _ => Err(QueryError::IncompleteFilter),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
