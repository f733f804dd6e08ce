//! Observability for the auth service.

pub mod metrics;

pub use metrics::init_metrics_recorder;
