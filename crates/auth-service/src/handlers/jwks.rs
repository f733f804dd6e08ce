//! Published key-set handler.

use crate::errors::ServiceError;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /.well-known/jwks.json
///
/// Publishes this node's public key so other nodes can validate its tokens
/// in remote mode. 404 when the node holds no local key.
///
/// ## Example Response
///
/// ```json
/// {
///   "keys": [
///     { "kty": "RSA", "kid": "primary", "use": "sig", "alg": "RS256", "n": "...", "e": "AQAB" }
///   ]
/// }
/// ```
#[instrument(skip_all, name = "auth.service.jwks")]
pub async fn publish_jwks(State(state): State<Arc<AppState>>) -> Result<Response, ServiceError> {
    let Some(keys) = state.published_keys.as_ref() else {
        return Err(ServiceError::NotFound(
            "This node does not publish a key set".to_string(),
        ));
    };

    let cache_control = HeaderValue::from_str(&format!(
        "public, max-age={}",
        state.jwks_max_age.as_secs()
    ))
    .map_err(|e| {
        tracing::error!(target: "auth.service.jwks", error = %e, "Invalid Cache-Control value");
        ServiceError::Internal
    })?;

    let mut response = Json(keys.clone()).into_response();
    response.headers_mut().insert(CACHE_CONTROL, cache_control);
    Ok(response)
}
