//! Authentication middleware.
//!
//! Runs the [`AuthGate`] for every request and, when a principal is
//! established, stores it in the request extensions for downstream
//! authorization. The middleware itself never rejects a request.

use crate::gate::{AuthGate, AuthState, AuthenticatedPrincipal};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware.
///
/// Reads only the request path and the `Authorization` header; the body is
/// never touched.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/v1/me", get(me))
///     .layer(axum::middleware::from_fn_with_state(gate, authenticate));
/// ```
#[instrument(skip_all, name = "auth.gate")]
pub async fn authenticate(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    if let AuthState::Authenticated(principal) =
        gate.authenticate(&path, authorization.as_deref()).await
    {
        req.extensions_mut().insert(principal);
    }

    next.run(req).await
}

/// Extension trait for reading the principal from a request.
pub trait PrincipalExt {
    /// The authenticated principal, or `None` if the gate left the request
    /// unauthenticated.
    fn principal(&self) -> Option<&AuthenticatedPrincipal>;
}

impl<B> PrincipalExt for axum::extract::Request<B> {
    fn principal(&self) -> Option<&AuthenticatedPrincipal> {
        self.extensions().get::<AuthenticatedPrincipal>()
    }
}

impl PrincipalExt for axum::http::request::Parts {
    fn principal(&self) -> Option<&AuthenticatedPrincipal> {
        self.extensions.get::<AuthenticatedPrincipal>()
    }
}
