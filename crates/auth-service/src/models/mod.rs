//! Auth service response bodies.

use serde::{Deserialize, Serialize};

/// Health check response.
///
/// Returned by the `/v1/health` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: String,

    /// "local", "remote" or "disabled".
    pub mode: String,

    /// Remote key-set cache: "fresh", "stale", "empty", or "n/a" outside
    /// remote mode.
    pub jwks: String,
}

/// Response for `POST /v1/auth/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,

    /// Why the token was rejected; `null` when valid.
    pub reason: Option<String>,
}

/// Response for `GET /v1/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    /// Token subject.
    pub sub: String,

    /// Authorities derived from the token, sorted.
    pub authorities: Vec<String>,
}
