//! Visit statistics core
//!
//! The aggregation engine and its two leaf collaborators: header
//! classification and period/timeline resolution. Everything in this module
//! is pure and synchronous — records go in, a [`StatsResult`] comes out, and
//! the wall-clock time is injected by the caller so queries are deterministic
//! and trivially testable.

pub mod classifier;
pub mod engine;
pub mod models;
pub mod period;

pub use engine::compute_stats;
pub use models::{QueryError, StatsFilter, StatsResult, VisitRecord};
pub use period::{Period, Timeline};
