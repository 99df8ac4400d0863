//! API layer
//!
//! HTTP handlers for:
//! - Admin dashboard (per-admin controller)
//! - Privileged callable functions
//! - Metrics (Prometheus)

mod admin;
mod functions;
pub mod metrics;
mod streaming;

pub use admin::admin_router;
pub use functions::functions_router;
pub use metrics::metrics_router;
