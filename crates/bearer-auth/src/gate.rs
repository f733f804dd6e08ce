//! Authentication Gate.
//!
//! Per-request decision with two states, `Unauthenticated` (initial) and
//! `Authenticated` (terminal for the request):
//!
//! 1. Excluded path: skip verification, stay `Unauthenticated`
//! 2. No bearer token: stay `Unauthenticated`
//! 3. Token validates: derive authorities, become `Authenticated`
//! 4. Token is invalid: log the reason, stay `Unauthenticated`
//!
//! The gate never rejects a request. Whatever authorization runs next must
//! refuse requests that need a principal and do not have one.

use crate::claims::ClaimSet;
use crate::observability::metrics::record_gate_request;
use crate::path_match::PathMatcher;
use crate::validator::{TokenValidator, ValidationOutcome};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Claims consulted for authorities, in priority order.
pub const AUTHORITY_CLAIMS: [&str; 3] = ["roles", "authorities", "groups"];

/// Prefix applied to every derived authority.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// Identity attached to a request after successful validation.
///
/// Request-scoped; never persisted or shared across requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    subject: String,
    raw_token: String,
    authorities: BTreeSet<String>,
}

impl AuthenticatedPrincipal {
    pub fn new(subject: String, raw_token: String, authorities: BTreeSet<String>) -> Self {
        Self {
            subject,
            raw_token,
            authorities,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The bearer token as presented, for propagation to downstream calls.
    pub fn raw_token(&self) -> &str {
        &self.raw_token
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// Subject and token are redacted.
impl fmt::Debug for AuthenticatedPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedPrincipal")
            .field("subject", &"[REDACTED]")
            .field("raw_token", &"[REDACTED]")
            .field("authorities", &self.authorities)
            .finish()
    }
}

/// Gate decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(AuthenticatedPrincipal),
}

impl AuthState {
    pub fn principal(&self) -> Option<&AuthenticatedPrincipal> {
        match self {
            AuthState::Unauthenticated => None,
            AuthState::Authenticated(principal) => Some(principal),
        }
    }

    pub fn into_principal(self) -> Option<AuthenticatedPrincipal> {
        match self {
            AuthState::Unauthenticated => None,
            AuthState::Authenticated(principal) => Some(principal),
        }
    }
}

/// Extracts, validates and converts bearer tokens into principals.
pub struct AuthGate {
    validator: Arc<TokenValidator>,
    exclusions: PathMatcher,
}

impl AuthGate {
    pub fn new(validator: Arc<TokenValidator>, exclusions: PathMatcher) -> Self {
        Self {
            validator,
            exclusions,
        }
    }

    pub fn validator(&self) -> &Arc<TokenValidator> {
        &self.validator
    }

    pub fn exclusions(&self) -> &PathMatcher {
        &self.exclusions
    }

    /// Decide the authentication state for a request.
    ///
    /// `authorization` is the raw `Authorization` header value, if present.
    pub async fn authenticate(&self, path: &str, authorization: Option<&str>) -> AuthState {
        if let Some(pattern) = self.exclusions.find_match(path) {
            tracing::trace!(target: "auth.gate", path = %path, pattern = %pattern, "Path excluded from authentication");
            record_gate_request("excluded");
            return AuthState::Unauthenticated;
        }

        let Some(token) = authorization.and_then(extract_bearer_token) else {
            if authorization.is_some() {
                tracing::debug!(target: "auth.gate", "Authorization header is not a bearer token");
            }
            record_gate_request("anonymous");
            return AuthState::Unauthenticated;
        };

        match self.validator.validate(token).await {
            ValidationOutcome::Valid(claims) => {
                let authorities = derive_authorities(&claims);
                tracing::debug!(
                    target: "auth.gate",
                    authority_count = authorities.len(),
                    "Request authenticated"
                );
                record_gate_request("authenticated");
                AuthState::Authenticated(AuthenticatedPrincipal::new(
                    claims.subject,
                    token.to_string(),
                    authorities,
                ))
            }
            ValidationOutcome::Invalid(reason) => {
                tracing::debug!(
                    target: "auth.gate",
                    reason = reason.as_str(),
                    "Bearer token rejected, continuing unauthenticated"
                );
                record_gate_request("rejected");
                AuthState::Unauthenticated
            }
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for other
/// schemes or an empty token.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authorities from the first non-null of `roles`, `authorities`, `groups`.
///
/// Array entries are trimmed, blanks skipped, and each is prefixed with
/// `ROLE_` unless it already is. A bare string yields one authority; any
/// other JSON type yields none.
pub fn derive_authorities(claims: &ClaimSet) -> BTreeSet<String> {
    let Some(value) = AUTHORITY_CLAIMS
        .iter()
        .filter_map(|name| claims.claim(name))
        .find(|value| !value.is_null())
    else {
        return BTreeSet::new();
    };

    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize_authority)
            .collect(),
        Value::String(entry) => normalize_authority(entry).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

fn normalize_authority(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    if entry.starts_with(AUTHORITY_PREFIX) {
        Some(entry.to_string())
    } else {
        Some(format!("{AUTHORITY_PREFIX}{entry}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::claims::RawClaims;
    use crate::config::{SigningConfig, VerificationMode};
    use crate::errors::InvalidReason;
    use crate::issuer::TokenIssuer;
    use crate::keys::KeyMaterial;
    use crate::validator::{KeyResolver, LocalKeyResolver};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const PRIMARY_PUB: &str = include_str!("../../auth-test-utils/fixtures/primary.pub.pem");
    const PRIMARY_KEY: &str = include_str!("../../auth-test-utils/fixtures/primary.key.pem");

    fn claims_with(custom: Value) -> ClaimSet {
        let mut raw: RawClaims = serde_json::from_value(json!({"exp": 1})).unwrap();
        raw.custom = custom.as_object().unwrap().clone();
        ClaimSet::from_raw(raw, "u1".to_string(), 1)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    /// Counts how often the validator asks for a key.
    struct CountingResolver {
        inner: LocalKeyResolver,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl KeyResolver for CountingResolver {
        async fn resolve(&self, kid: Option<&str>) -> Result<Arc<KeyMaterial>, InvalidReason> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(kid).await
        }

        fn mode(&self) -> VerificationMode {
            VerificationMode::Local
        }
    }

    struct Fixture {
        gate: AuthGate,
        issuer: TokenIssuer,
        resolver_calls: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let signing = Arc::new(SigningConfig {
            issuer: "svc-a".to_string(),
            audience: "svc-b".to_string(),
            token_ttl: Duration::from_millis(3_600_000),
            key_id: "primary".to_string(),
            validate_issuer: true,
            validate_audience: true,
        });
        let key = Arc::new(
            KeyMaterial::from_pem("primary".to_string(), PRIMARY_PUB, Some(PRIMARY_KEY)).unwrap(),
        );
        let resolver_calls = Arc::new(AtomicUsize::new(0));
        let resolver = Arc::new(CountingResolver {
            inner: LocalKeyResolver::new(Arc::clone(&key)),
            calls: Arc::clone(&resolver_calls),
        });
        let validator = Arc::new(TokenValidator::new(
            resolver,
            Arc::clone(&signing),
            Duration::from_secs(60),
        ));

        Fixture {
            gate: AuthGate::new(validator, PathMatcher::new(["/health", "/.well-known/**"])),
            issuer: TokenIssuer::new(key, signing).unwrap(),
            resolver_calls,
        }
    }

    // =========================================================================
    // Authority derivation
    // =========================================================================

    #[test]
    fn test_roles_become_prefixed_authorities() {
        let claims = claims_with(json!({"roles": ["admin", "auditor"]}));
        assert_eq!(
            derive_authorities(&claims),
            set(&["ROLE_admin", "ROLE_auditor"])
        );
    }

    #[test]
    fn test_no_authority_claims_yields_empty_set() {
        let claims = claims_with(json!({"tenant": "acme"}));
        assert!(derive_authorities(&claims).is_empty());
    }

    #[test]
    fn test_authority_claim_priority() {
        let claims = claims_with(json!({
            "groups": ["g"],
            "authorities": ["a"],
            "roles": ["r"]
        }));
        assert_eq!(derive_authorities(&claims), set(&["ROLE_r"]));

        let claims = claims_with(json!({"groups": ["g"], "authorities": ["a"]}));
        assert_eq!(derive_authorities(&claims), set(&["ROLE_a"]));

        let claims = claims_with(json!({"groups": ["g"]}));
        assert_eq!(derive_authorities(&claims), set(&["ROLE_g"]));
    }

    #[test]
    fn test_null_claim_falls_through() {
        let claims = claims_with(json!({"roles": null, "groups": ["g"]}));
        assert_eq!(derive_authorities(&claims), set(&["ROLE_g"]));
    }

    #[test]
    fn test_authority_normalization() {
        let claims = claims_with(json!({"roles": [" admin ", "", "ROLE_user", 42, "  "]}));
        assert_eq!(derive_authorities(&claims), set(&["ROLE_admin", "ROLE_user"]));
    }

    #[test]
    fn test_bare_string_and_other_types() {
        let claims = claims_with(json!({"roles": "admin"}));
        assert_eq!(derive_authorities(&claims), set(&["ROLE_admin"]));

        // A non-null value of the wrong type still wins priority
        let claims = claims_with(json!({"roles": {"admin": true}, "groups": ["g"]}));
        assert!(derive_authorities(&claims).is_empty());

        let claims = claims_with(json!({"roles": 7}));
        assert!(derive_authorities(&claims).is_empty());
    }

    // =========================================================================
    // Bearer extraction
    // =========================================================================

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer   abc  "), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token(""), None);
    }

    // =========================================================================
    // Gate decisions
    // =========================================================================

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let f = fixture();
        let token = f
            .issuer
            .issue("u1", &json!({"roles": ["user"]}).as_object().unwrap().clone())
            .unwrap();
        let header = format!("Bearer {token}");

        let state = f.gate.authenticate("/v1/me", Some(&header)).await;
        let principal = state.into_principal().unwrap();

        assert_eq!(principal.subject(), "u1");
        assert_eq!(principal.raw_token(), token);
        assert_eq!(principal.authorities(), &set(&["ROLE_user"]));
        assert!(principal.has_authority("ROLE_user"));
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let f = fixture();
        assert_eq!(
            f.gate.authenticate("/v1/me", None).await,
            AuthState::Unauthenticated
        );
        assert_eq!(
            f.gate.authenticate("/v1/me", Some("Basic abc")).await,
            AuthState::Unauthenticated
        );
        assert_eq!(f.resolver_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthenticated_not_error() {
        let f = fixture();
        let state = f.gate.authenticate("/v1/me", Some("Bearer not.a.token")).await;
        assert_eq!(state, AuthState::Unauthenticated);
        assert!(state.principal().is_none());
    }

    #[tokio::test]
    async fn test_excluded_path_never_reaches_validator() {
        let f = fixture();
        let token = f.issuer.issue("u1", &Map::new()).unwrap();
        let header = format!("Bearer {token}");

        for path in ["/health", "/.well-known/jwks.json"] {
            assert_eq!(
                f.gate.authenticate(path, Some(&header)).await,
                AuthState::Unauthenticated
            );
            assert_eq!(
                f.gate.authenticate(path, Some("Bearer garbage")).await,
                AuthState::Unauthenticated
            );
        }
        assert_eq!(f.resolver_calls.load(Ordering::SeqCst), 0);

        // Same token on a protected path does reach it
        assert!(f
            .gate
            .authenticate("/v1/me", Some(&header))
            .await
            .principal()
            .is_some());
        assert_eq!(f.resolver_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_principal_debug_redacts_identity() {
        let principal = AuthenticatedPrincipal::new(
            "secret-user".to_string(),
            "secret.token.value".to_string(),
            set(&["ROLE_user"]),
        );
        let debug = format!("{principal:?}");
        assert!(!debug.contains("secret-user"));
        assert!(!debug.contains("secret.token.value"));
        assert!(debug.contains("ROLE_user"));
    }
}
