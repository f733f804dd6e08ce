//! HTTP routes for the auth service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics_middleware;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use bearer_auth::middleware::authenticate;
use bearer_auth::{AuthGate, JwkSet, JwksClient, TokenIssuer, TokenValidator};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// `AUTH_ENABLED`.
    pub auth_enabled: bool,

    /// Authentication gate; `None` when authentication is disabled.
    pub gate: Option<Arc<AuthGate>>,

    /// Token validator; `None` when no key source is configured.
    pub validator: Option<Arc<TokenValidator>>,

    /// Token issuer; `None` without a private key.
    pub issuer: Option<Arc<TokenIssuer>>,

    /// Remote key-set client (remote mode only).
    pub jwks_client: Option<JwksClient>,

    /// This node's public key as a JWK set, if it holds one.
    pub published_keys: Option<JwkSet>,

    /// `Cache-Control: max-age` for the published key set.
    pub jwks_max_age: Duration,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health` - Health check (mode and key-set cache status)
/// - `/.well-known/jwks.json` - Published public key
/// - `/metrics` - Prometheus metrics endpoint
/// - `/v1/auth/validate` - Token validation
/// - `/v1/me` - Current principal (requires authentication)
/// - Authentication gate (when enabled)
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/.well-known/jwks.json", get(handlers::publish_jwks))
        .route("/v1/auth/validate", post(handlers::validate_token))
        .route("/v1/me", get(handlers::get_me))
        .with_state(Arc::clone(&state));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let mut app = api_routes.merge(metrics_routes);

    // The gate only attaches principals; handlers decide what needs one
    if let Some(gate) = &state.gate {
        app = app.layer(middleware::from_fn_with_state(
            Arc::clone(gate),
            authenticate,
        ));
    }

    // Layer order (bottom-to-top execution):
    // 1. Authentication gate (innermost)
    // 2. TraceLayer - Log request details
    // 3. TimeoutLayer - Timeout the request
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    app.layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
