//! Token Validator.
//!
//! Verifies RS256 tokens against a pluggable key source, then checks the
//! time window, subject, issuer and audience.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; any other `alg` is a bad signature
//! - The signature is verified before any claim is used for a decision
//! - Every failure yields an [`InvalidReason`]; nothing is thrown to callers

use crate::claims::{ClaimSet, RawClaims};
use crate::config::{SigningConfig, VerificationMode};
use crate::errors::InvalidReason;
use crate::jwks::JwksClient;
use crate::keys::KeyMaterial;
use crate::observability::metrics::record_token_validation;
use async_trait::async_trait;
use common::jwt::{check_time_window_at, CompactToken, TimeWindowError};
use jsonwebtoken::{crypto, Algorithm};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Result of validating a token.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(ClaimSet),
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            ValidationOutcome::Valid(_) => None,
            ValidationOutcome::Invalid(reason) => Some(*reason),
        }
    }

    /// Convert into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<ClaimSet, InvalidReason> {
        match self {
            ValidationOutcome::Valid(claims) => Ok(claims),
            ValidationOutcome::Invalid(reason) => Err(reason),
        }
    }
}

/// Resolves the verification key for a token's `kid` header.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Return the key to verify with, or why none is available.
    async fn resolve(&self, kid: Option<&str>) -> Result<Arc<KeyMaterial>, InvalidReason>;

    fn mode(&self) -> VerificationMode;
}

/// Single locally held public key (closed deployments).
pub struct LocalKeyResolver {
    key: Arc<KeyMaterial>,
}

impl LocalKeyResolver {
    pub fn new(key: Arc<KeyMaterial>) -> Self {
        Self { key }
    }
}

#[async_trait]
impl KeyResolver for LocalKeyResolver {
    async fn resolve(&self, kid: Option<&str>) -> Result<Arc<KeyMaterial>, InvalidReason> {
        match kid {
            Some(kid) if kid != self.key.key_id() => {
                tracing::debug!(target: "auth.validator", kid = %kid, "Token kid does not match local key");
                Err(InvalidReason::UnknownKey)
            }
            _ => Ok(Arc::clone(&self.key)),
        }
    }

    fn mode(&self) -> VerificationMode {
        VerificationMode::Local
    }
}

/// Keys from a remote key set, matched by `kid` (federated deployments).
///
/// An unknown `kid` triggers one refresh and one retry before it is
/// rejected, so keys rotated in at the provider are picked up. No refresh is
/// forced when the set was fetched during the same lookup, or when it is
/// younger than the configured minimum refresh interval.
pub struct JwksKeyResolver {
    client: JwksClient,
    min_refresh_interval: Duration,
}

impl JwksKeyResolver {
    pub fn new(client: JwksClient) -> Self {
        Self::with_min_refresh_interval(client, Duration::ZERO)
    }

    pub fn with_min_refresh_interval(client: JwksClient, min_refresh_interval: Duration) -> Self {
        Self {
            client,
            min_refresh_interval,
        }
    }

    pub fn client(&self) -> &JwksClient {
        &self.client
    }
}

#[async_trait]
impl KeyResolver for JwksKeyResolver {
    async fn resolve(&self, kid: Option<&str>) -> Result<Arc<KeyMaterial>, InvalidReason> {
        let Some(kid) = kid else {
            tracing::debug!(target: "auth.validator", "Token has no kid header");
            return Err(InvalidReason::UnknownKey);
        };

        let unavailable = |e: crate::errors::FetchError| {
            tracing::warn!(target: "auth.validator", error = %e, "Key set unavailable, rejecting token");
            InvalidReason::KeySourceUnavailable
        };

        let started = Instant::now();
        let key_set = self.client.get_key_set().await.map_err(unavailable)?;
        if let Some(key) = key_set.find(kid) {
            return Ok(Arc::clone(key));
        }

        if key_set.fetched_at() >= started {
            tracing::debug!(target: "auth.validator", kid = %kid, "Key not in freshly fetched key set");
            return Err(InvalidReason::UnknownKey);
        }
        if key_set.fetched_at().elapsed() < self.min_refresh_interval {
            tracing::debug!(target: "auth.validator", kid = %kid, "Key not in key set, refetch suppressed by minimum interval");
            return Err(InvalidReason::UnknownKey);
        }

        tracing::debug!(target: "auth.validator", kid = %kid, "Key not in cached key set, refreshing once");
        self.client.refresh_if_current(&key_set);

        let key_set = self.client.get_key_set().await.map_err(unavailable)?;
        key_set.find(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "auth.validator", kid = %kid, "Key not found in key set after refresh");
            InvalidReason::UnknownKey
        })
    }

    fn mode(&self) -> VerificationMode {
        VerificationMode::Remote
    }
}

/// Header fields the validator reads.
#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Validates bearer tokens.
///
/// Holds no mutable state of its own; safe to share across request tasks.
pub struct TokenValidator {
    resolver: Arc<dyn KeyResolver>,
    signing: Arc<SigningConfig>,
    clock_skew: Duration,
}

impl TokenValidator {
    pub fn new(
        resolver: Arc<dyn KeyResolver>,
        signing: Arc<SigningConfig>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            resolver,
            signing,
            clock_skew,
        }
    }

    /// Validator backed by a single local public key.
    pub fn local(key: Arc<KeyMaterial>, signing: Arc<SigningConfig>, clock_skew: Duration) -> Self {
        Self::new(Arc::new(LocalKeyResolver::new(key)), signing, clock_skew)
    }

    /// Validator backed by a remote key set.
    pub fn remote(client: JwksClient, signing: Arc<SigningConfig>, clock_skew: Duration) -> Self {
        Self::new(Arc::new(JwksKeyResolver::new(client)), signing, clock_skew)
    }

    pub fn mode(&self) -> VerificationMode {
        self.resolver.mode()
    }

    /// Validate a token against the current time.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> ValidationOutcome {
        self.validate_at(token, chrono::Utc::now().timestamp()).await
    }

    /// Validate a token against an explicit `now` (Unix seconds).
    pub async fn validate_at(&self, token: &str, now: i64) -> ValidationOutcome {
        let outcome = match self.check(token, now).await {
            Ok(claims) => ValidationOutcome::Valid(claims),
            Err(reason) => ValidationOutcome::Invalid(reason),
        };

        match outcome.reason() {
            None => tracing::debug!(target: "auth.validator", "Token validated successfully"),
            Some(reason) => {
                tracing::debug!(target: "auth.validator", reason = reason.as_str(), "Token rejected");
            }
        }
        record_token_validation(outcome.reason());

        outcome
    }

    async fn check(&self, token: &str, now: i64) -> Result<ClaimSet, InvalidReason> {
        // 1. Structure
        let compact = CompactToken::parse(token).map_err(|_| InvalidReason::Malformed)?;
        let header: TokenHeader = compact
            .decode_header()
            .map_err(|_| InvalidReason::Malformed)?;
        let mut raw: RawClaims = compact
            .decode_claims()
            .map_err(|_| InvalidReason::Malformed)?;

        // 2. Key
        let key = self.resolver.resolve(header.kid.as_deref()).await?;

        // 3. Signature; the algorithm is fixed
        if header.alg != "RS256" {
            tracing::debug!(target: "auth.validator", alg = %header.alg, "Unexpected token algorithm");
            return Err(InvalidReason::BadSignature);
        }
        let verified = crypto::verify(
            compact.signature,
            compact.signing_input().as_bytes(),
            key.decoding_key(),
            Algorithm::RS256,
        )
        .unwrap_or_else(|e| {
            tracing::debug!(target: "auth.validator", error = %e, "Signature could not be verified");
            false
        });
        if !verified {
            return Err(InvalidReason::BadSignature);
        }

        // 4. Time window
        check_time_window_at(raw.exp, raw.nbf, self.clock_skew, now).map_err(|e| match e {
            TimeWindowError::Expired => InvalidReason::Expired,
            TimeWindowError::NotYetValid => InvalidReason::NotYetValid,
        })?;
        let expires_at = raw.exp.ok_or(InvalidReason::Expired)?;

        // 5. Subject
        let subject = raw
            .sub
            .take()
            .filter(|s| !s.trim().is_empty())
            .ok_or(InvalidReason::MissingSubject)?;

        // 6. Issuer
        if self.signing.validate_issuer {
            let expected = self.signing.issuer.as_str();
            if expected.trim().is_empty() || raw.iss.as_deref() != Some(expected) {
                return Err(InvalidReason::IssuerMismatch);
            }
        }

        let claims = ClaimSet::from_raw(raw, subject, expires_at);

        // 7. Audience
        if self.signing.validate_audience {
            let expected = self.signing.audience.as_str();
            if expected.trim().is_empty() || !claims.has_audience(expected) {
                return Err(InvalidReason::AudienceMismatch);
            }
        }

        Ok(claims)
    }
}
