//! Stateless bearer-token authentication.
//!
//! Issues RS256-signed tokens, validates presented tokens against a local
//! public key or a remote JWK set, and turns valid tokens into a request
//! scoped [`AuthenticatedPrincipal`].
//!
//! # Components
//!
//! ```text
//! keys (KeyMaterial) ──┬──> issuer (TokenIssuer)
//!                      └──> validator (LocalKeyResolver) ──┐
//! jwks (JwksClient) ──────> validator (JwksKeyResolver) ───┴──> gate (AuthGate) ──> middleware::auth
//! ```
//!
//! # Modules
//!
//! - `config` - `AUTH_*` environment configuration
//! - `errors` - Key, fetch, signing errors and invalid-token reasons
//! - `keys` - RSA key loading
//! - `jwks` - Remote key-set client with single-flight caching
//! - `claims` - Claim model
//! - `issuer` - Token issuance
//! - `validator` - Token validation
//! - `path_match` - Exclusion patterns
//! - `gate` - Per-request authentication decision
//! - `middleware` - Axum integration
//! - `observability` - Metrics

pub mod claims;
pub mod config;
pub mod errors;
pub mod gate;
pub mod issuer;
pub mod jwks;
pub mod keys;
pub mod middleware;
pub mod observability;
pub mod path_match;
pub mod validator;

pub use claims::ClaimSet;
pub use config::{AuthConfig, ConfigError, SigningConfig, VerificationMode};
pub use errors::{FetchError, InvalidReason, KeyLoadError, SigningError};
pub use gate::{AuthGate, AuthState, AuthenticatedPrincipal};
pub use issuer::TokenIssuer;
pub use jwks::{CacheStatus, Jwk, JwkSet, JwksClient, RemoteKeySet};
pub use keys::KeyMaterial;
pub use path_match::PathMatcher;
pub use validator::{KeyResolver, TokenValidator, ValidationOutcome};
