//! API layer
//!
//! HTTP handlers for:
//! - Application pages (landing, secret, failure)
//! - Metrics (Prometheus)

pub mod metrics;
mod pages;

pub use metrics::metrics_router;
pub use pages::pages_router;
