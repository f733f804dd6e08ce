//! Token validation handler.

use crate::errors::ServiceError;
use crate::models::ValidateResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::Json;
use bearer_auth::gate::extract_bearer_token;
use bearer_auth::ValidationOutcome;
use std::sync::Arc;
use tracing::instrument;

/// Reason reported when the request carries no bearer token.
pub const MISSING_TOKEN_REASON: &str = "missing_token";

/// Handler for POST /v1/auth/validate
///
/// Validates the token in `Authorization: Bearer <token>`. An absent or
/// invalid token is a normal `valid=false` answer, never an error status.
///
/// ```json
/// { "valid": false, "reason": "expired" }
/// ```
#[instrument(skip_all, name = "auth.service.validate")]
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ValidateResponse>, ServiceError> {
    let Some(validator) = state.validator.as_ref() else {
        return Err(ServiceError::ServiceUnavailable(
            "No verification key source configured".to_string(),
        ));
    };

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token);

    let Some(token) = token else {
        return Ok(Json(ValidateResponse {
            valid: false,
            reason: Some(MISSING_TOKEN_REASON.to_string()),
        }));
    };

    let response = match validator.validate(token).await {
        ValidationOutcome::Valid(_) => ValidateResponse {
            valid: true,
            reason: None,
        },
        ValidationOutcome::Invalid(reason) => ValidateResponse {
            valid: false,
            reason: Some(reason.as_str().to_string()),
        },
    };

    Ok(Json(response))
}
