//! Current principal handler.

use crate::extractors::RequirePrincipal;
use crate::models::MeResponse;
use axum::Json;
use tracing::instrument;

/// Handler for GET /v1/me
///
/// Echoes the authenticated principal. Requests the gate left
/// unauthenticated are rejected with 401 by [`RequirePrincipal`].
///
/// ```json
/// { "sub": "u1", "authorities": ["ROLE_user"] }
/// ```
#[instrument(skip_all, name = "auth.service.me")]
pub async fn get_me(RequirePrincipal(principal): RequirePrincipal) -> Json<MeResponse> {
    Json(MeResponse {
        sub: principal.subject().to_string(),
        authorities: principal.authorities().iter().cloned().collect(),
    })
}
