//! HTTP middleware for the auth service.
//!
//! The authentication gate itself lives in `bearer_auth::middleware`.

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
