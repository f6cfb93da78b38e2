//! HTTP API handlers for moodpost-acquire
//!
//! POST/GET/DELETE /bundles, GET /health

pub mod bundles;
pub mod health;

pub use bundles::bundle_routes;
pub use health::health_routes;
