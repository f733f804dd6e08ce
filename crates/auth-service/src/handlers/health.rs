//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Never calls the key-set endpoint; reports the cache state as it is.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "mode": "remote",
///   "jwks": "fresh"
/// }
/// ```
#[instrument(skip_all, name = "auth.service.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health_of(&state))
}

fn health_of(state: &AppState) -> HealthResponse {
    let mode = match (&state.validator, state.auth_enabled) {
        (Some(validator), true) => validator.mode().as_str(),
        _ => "disabled",
    };

    let jwks = state
        .jwks_client
        .as_ref()
        .map_or("n/a", |client| client.cache_status().as_str());

    HealthResponse {
        status: "healthy".to_string(),
        mode: mode.to_string(),
        jwks: jwks.to_string(),
    }
}
