//! Builder for test token claim sets.
//!
//! Defaults describe a valid service-to-service token: issuer `svc-a`,
//! audience `svc-b`, subject `u1`, issued now, expiring in one hour.

use crate::crypto_fixtures::TestKeypair;
use jsonwebtoken::{Algorithm, Header};
use serde_json::{Map, Value};

pub const DEFAULT_ISSUER: &str = "svc-a";
pub const DEFAULT_AUDIENCE: &str = "svc-b";
pub const DEFAULT_SUBJECT: &str = "u1";

/// Builder for signed test tokens.
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid: KidChoice,
}

#[derive(Debug, Clone)]
enum KidChoice {
    FromKeypair,
    Override(String),
    Omit,
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTokenBuilder {
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::from(DEFAULT_ISSUER));
        claims.insert("aud".to_string(), Value::from(DEFAULT_AUDIENCE));
        claims.insert("sub".to_string(), Value::from(DEFAULT_SUBJECT));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + 3600));
        Self {
            claims,
            kid: KidChoice::FromKeypair,
        }
    }

    pub fn for_subject(self, subject: &str) -> Self {
        self.with_claim("sub", subject)
    }

    pub fn issued_by(self, issuer: &str) -> Self {
        self.with_claim("iss", issuer)
    }

    pub fn for_audience(self, audience: &str) -> Self {
        self.with_claim("aud", audience)
    }

    /// Multi-valued `aud` claim.
    pub fn for_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", audiences.to_vec())
    }

    pub fn issued_at(self, iat: i64) -> Self {
        self.with_claim("iat", iat)
    }

    /// Expiry relative to now; negative values produce an expired token.
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = chrono::Utc::now().timestamp() + seconds;
        self.with_claim("exp", exp)
    }

    pub fn expires_at(self, exp: i64) -> Self {
        self.with_claim("exp", exp)
    }

    pub fn not_before(self, nbf: i64) -> Self {
        self.with_claim("nbf", nbf)
    }

    /// Set the `roles` claim.
    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.with_claim("roles", roles.to_vec())
    }

    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Put `kid` in the header instead of the signing keypair's id.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = KidChoice::Override(kid.to_string());
        self
    }

    /// Leave `kid` out of the header.
    pub fn without_kid(mut self) -> Self {
        self.kid = KidChoice::Omit;
        self
    }

    /// The claim set as JSON.
    pub fn build(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign the claim set with `keypair` (RS256).
    pub fn sign(&self, keypair: &TestKeypair) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = match &self.kid {
            KidChoice::FromKeypair => Some(keypair.kid.clone()),
            KidChoice::Override(kid) => Some(kid.clone()),
            KidChoice::Omit => None,
        };
        keypair.sign_with_header(&header, &self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn header_of(token: &str) -> Value {
        let segment = token.split('.').next().unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let claims = TestTokenBuilder::new().build();
        assert_eq!(claims["iss"], DEFAULT_ISSUER);
        assert_eq!(claims["aud"], DEFAULT_AUDIENCE);
        assert_eq!(claims["sub"], DEFAULT_SUBJECT);
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            3600
        );
    }

    #[test]
    fn test_overrides_and_removal() {
        let claims = TestTokenBuilder::new()
            .for_subject("alice")
            .with_roles(&["admin", "user"])
            .without_claim("iss")
            .build();
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["roles"], serde_json::json!(["admin", "user"]));
        assert!(claims.get("iss").is_none());
    }

    #[test]
    fn test_kid_choices() {
        let keypair = TestKeypair::primary();

        let token = TestTokenBuilder::new().sign(&keypair);
        assert_eq!(header_of(&token)["kid"], "primary");

        let token = TestTokenBuilder::new().with_kid("other").sign(&keypair);
        assert_eq!(header_of(&token)["kid"], "other");

        let token = TestTokenBuilder::new().without_kid().sign(&keypair);
        assert!(header_of(&token).get("kid").is_none());
    }
}
