//! Stats API
//!
//! Thin presentation layer: loads the record snapshot, runs the aggregation
//! engine, and serializes the result for chart and table rendering.

mod handlers;
mod routes;

pub use handlers::AppState;
pub use routes::create_api_router;
