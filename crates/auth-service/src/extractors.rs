//! Handler-side authorization.
//!
//! The gate never rejects; a handler that needs a caller takes a
//! [`RequirePrincipal`] argument and the request fails with 401 when the
//! gate left it unauthenticated.

use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bearer_auth::middleware::PrincipalExt;
use bearer_auth::AuthenticatedPrincipal;

/// Extracts the authenticated principal or rejects with 401.
#[derive(Debug, Clone)]
pub struct RequirePrincipal(pub AuthenticatedPrincipal);

#[async_trait]
impl<S> FromRequestParts<S> for RequirePrincipal
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.principal() {
            Some(principal) => Ok(RequirePrincipal(principal.clone())),
            None => {
                tracing::debug!(target: "auth.service.authz", path = %parts.uri.path(), "Rejecting unauthenticated request");
                Err(ServiceError::Unauthorized(
                    "Authentication required".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_rejects_without_principal() {
        let (mut parts, _) = Request::new(()).into_parts();

        let err = RequirePrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_extracts_principal() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts.extensions.insert(AuthenticatedPrincipal::new(
            "u1".to_string(),
            "token".to_string(),
            BTreeSet::from(["ROLE_user".to_string()]),
        ));

        let RequirePrincipal(principal) = RequirePrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(principal.subject(), "u1");
        assert!(principal.has_authority("ROLE_user"));
    }
}
