//! Visit capture
//!
//! The tracking server endpoint and the request context extractor that
//! turns an inbound request into an immutable `VisitRecord`. Records are
//! handed to the visit buffer and persisted in batches off the hot path.

pub mod context;

mod handlers;
mod routes;

pub use handlers::TrackState;
pub use routes::create_track_router;
