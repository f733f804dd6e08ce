//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! Unauthenticated (excluded from the gate by default) so Prometheus can
//! scrape it. Labels are bounded and never carry subjects or tokens.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
#[tracing::instrument(skip_all, name = "auth.service.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
