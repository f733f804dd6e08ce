//! Token Issuer.
//!
//! Builds and RS256-signs a token for a subject. Registered claims come from
//! [`SigningConfig`] and the clock; caller claims are merged afterwards and
//! may not use a reserved name, so a caller cannot forge issuer, audience or
//! lifetime.

use crate::claims::RESERVED_CLAIMS;
use crate::config::SigningConfig;
use crate::errors::SigningError;
use crate::keys::KeyMaterial;
use crate::observability::metrics::record_token_issued;
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

/// Issues signed tokens.
///
/// Stateless apart from the immutable key and config; safe for concurrent use.
#[derive(Debug)]
pub struct TokenIssuer {
    key: Arc<KeyMaterial>,
    signing: Arc<SigningConfig>,
}

impl TokenIssuer {
    /// Create an issuer.
    ///
    /// # Errors
    ///
    /// `NoPrivateKey` if `key` cannot sign.
    pub fn new(key: Arc<KeyMaterial>, signing: Arc<SigningConfig>) -> Result<Self, SigningError> {
        if !key.can_sign() {
            return Err(SigningError::NoPrivateKey);
        }
        Ok(Self { key, signing })
    }

    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    /// Issue a token for `subject` with custom `claims`, valid from now.
    ///
    /// # Errors
    ///
    /// - `EmptySubject` if `subject` is blank
    /// - `ReservedClaim` if `claims` contains a registered claim name
    /// - `Encoding` if signing fails
    #[instrument(skip_all)]
    pub fn issue(&self, subject: &str, claims: &Map<String, Value>) -> Result<String, SigningError> {
        self.issue_at(subject, claims, chrono::Utc::now().timestamp())
    }

    /// Deterministic variant of [`Self::issue`] with an explicit `now`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::issue`].
    pub fn issue_at(
        &self,
        subject: &str,
        claims: &Map<String, Value>,
        now: i64,
    ) -> Result<String, SigningError> {
        let result = self.sign(subject, claims, now);
        match &result {
            Ok(_) => {
                record_token_issued("success");
                tracing::debug!(target: "auth.issuer", kid = %self.key.key_id(), "Token issued");
            }
            Err(e) => {
                record_token_issued("error");
                tracing::debug!(target: "auth.issuer", error = %e, "Token issuance failed");
            }
        }
        result
    }

    fn sign(
        &self,
        subject: &str,
        claims: &Map<String, Value>,
        now: i64,
    ) -> Result<String, SigningError> {
        if subject.trim().is_empty() {
            return Err(SigningError::EmptySubject);
        }
        if let Some(reserved) = claims.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(SigningError::ReservedClaim(reserved.clone()));
        }

        let encoding_key = self.key.encoding_key().ok_or(SigningError::NoPrivateKey)?;

        let ttl = i64::try_from(self.signing.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let mut body = Map::with_capacity(claims.len() + 5);
        body.insert("iss".to_string(), Value::from(self.signing.issuer.as_str()));
        body.insert("aud".to_string(), Value::from(self.signing.audience.as_str()));
        body.insert("sub".to_string(), Value::from(subject));
        body.insert("iat".to_string(), Value::from(now));
        body.insert("exp".to_string(), Value::from(now.saturating_add(ttl)));
        body.extend(claims.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.key.key_id().to_string());

        encode(&header, &body, encoding_key).map_err(|e| SigningError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::validator::TokenValidator;
    use serde_json::json;
    use std::time::Duration;

    const PRIMARY_PUB: &str = include_str!("../../auth-test-utils/fixtures/primary.pub.pem");
    const PRIMARY_KEY: &str = include_str!("../../auth-test-utils/fixtures/primary.key.pem");

    fn signing_config() -> Arc<SigningConfig> {
        Arc::new(SigningConfig {
            issuer: "svc-a".to_string(),
            audience: "svc-b".to_string(),
            token_ttl: Duration::from_millis(3_600_000),
            key_id: "primary".to_string(),
            validate_issuer: true,
            validate_audience: true,
        })
    }

    fn key() -> Arc<KeyMaterial> {
        Arc::new(KeyMaterial::from_pem("primary".to_string(), PRIMARY_PUB, Some(PRIMARY_KEY)).unwrap())
    }

    fn custom(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn decode_segment(token: &str, index: usize) -> Value {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let segment = token.split('.').nth(index).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn test_new_requires_private_key() {
        let public_only =
            Arc::new(KeyMaterial::from_pem("primary".to_string(), PRIMARY_PUB, None).unwrap());
        assert!(matches!(
            TokenIssuer::new(public_only, signing_config()),
            Err(SigningError::NoPrivateKey)
        ));
    }

    #[test]
    fn test_issue_sets_registered_claims() {
        let issuer = TokenIssuer::new(key(), signing_config()).unwrap();
        let token = issuer
            .issue_at("u1", &custom(json!({"roles": ["user"]})), 1_700_000_000)
            .unwrap();

        let header = decode_segment(&token, 0);
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["typ"], "JWT");
        assert_eq!(header["kid"], "primary");

        let claims = decode_segment(&token, 1);
        assert_eq!(claims["iss"], "svc-a");
        assert_eq!(claims["aud"], "svc-b");
        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["iat"], 1_700_000_000);
        assert_eq!(claims["exp"], 1_700_003_600);
        assert_eq!(claims["roles"], json!(["user"]));
    }

    #[test]
    fn test_issue_rejects_empty_subject() {
        let issuer = TokenIssuer::new(key(), signing_config()).unwrap();
        assert!(matches!(
            issuer.issue("", &Map::new()),
            Err(SigningError::EmptySubject)
        ));
        assert!(matches!(
            issuer.issue("   ", &Map::new()),
            Err(SigningError::EmptySubject)
        ));
    }

    #[test]
    fn test_issue_rejects_reserved_claims() {
        let issuer = TokenIssuer::new(key(), signing_config()).unwrap();

        for name in ["iss", "aud", "sub", "iat", "exp", "nbf"] {
            let claims = custom(json!({ name: "forged" }));
            let err = issuer.issue("u1", &claims).unwrap_err();
            assert!(
                matches!(&err, SigningError::ReservedClaim(n) if n == name),
                "expected ReservedClaim({name}), got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_issue_then_validate_round_trip() {
        let key = key();
        let issuer = TokenIssuer::new(Arc::clone(&key), signing_config()).unwrap();
        let validator = TokenValidator::local(key, signing_config(), Duration::from_secs(60));

        let custom_claims = custom(json!({
            "roles": ["user", "auditor"],
            "tenant": {"id": 7, "name": "acme"},
            "flag": true
        }));
        let token = issuer.issue("u1", &custom_claims).unwrap();

        let claims = validator.validate(&token).await.into_result().unwrap();
        assert_eq!(claims.subject, "u1");
        assert_eq!(claims.custom, custom_claims);
    }

    #[tokio::test]
    async fn test_issued_token_expires_after_ttl() {
        let key = key();
        let issuer = TokenIssuer::new(Arc::clone(&key), signing_config()).unwrap();
        let validator = TokenValidator::local(key, signing_config(), Duration::from_secs(60));

        let token = issuer.issue_at("u1", &Map::new(), 1_700_000_000).unwrap();

        assert!(validator.validate_at(&token, 1_700_003_600 + 60).await.is_valid());
        assert_eq!(
            validator.validate_at(&token, 1_700_003_600 + 61).await.reason(),
            Some(crate::errors::InvalidReason::Expired)
        );
    }
}
