//! Deterministic cryptographic fixtures for testing
//!
//! RSA key generation is slow and non-deterministic, so the fixtures are
//! fixed RSA-2048 PEM files checked in under `fixtures/`:
//!
//! | Name | Private key | Public key |
//! |---|---|---|
//! | `primary` | PKCS#8 (`primary.key.pem`), PKCS#1 (`primary.pkcs1.key.pem`) | SPKI (`primary.pub.pem`) |
//! | `rotated` | PKCS#8 (`rotated.key.pem`) | SPKI (`rotated.pub.pem`) |
//! | `weak-1024` | - | SPKI (`weak-1024.pub.pem`), below the accepted minimum |

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::PathBuf;
use thiserror::Error;

pub const PRIMARY_PUBLIC_PEM: &str = include_str!("../fixtures/primary.pub.pem");
pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../fixtures/primary.key.pem");
pub const PRIMARY_PKCS1_PRIVATE_PEM: &str = include_str!("../fixtures/primary.pkcs1.key.pem");
pub const ROTATED_PUBLIC_PEM: &str = include_str!("../fixtures/rotated.pub.pem");
pub const ROTATED_PRIVATE_PEM: &str = include_str!("../fixtures/rotated.key.pem");
pub const WEAK_PUBLIC_PEM: &str = include_str!("../fixtures/weak-1024.pub.pem");

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Absolute path of a file in `fixtures/`, for configs that take key paths.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// An RSA key pair with a key id, able to sign test tokens.
pub struct TestKeypair {
    pub kid: String,
    pub public_pem: &'static str,
    pub private_pem: &'static str,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
}

impl TestKeypair {
    /// Build a keypair from PKCS#8 / SPKI PEM documents.
    pub fn from_pem(
        kid: &str,
        public_pem: &'static str,
        private_pem: &'static str,
    ) -> Result<Self, FixtureError> {
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| FixtureError::Crypto(format!("public key: {e}")))?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| FixtureError::Crypto(format!("private key: {e}")))?;
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| FixtureError::Crypto(format!("pkcs1 encoding: {e}")))?;

        Ok(Self {
            kid: kid.to_string(),
            public_pem,
            private_pem,
            public_key,
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
        })
    }

    /// The `primary` fixture with key id `primary`.
    pub fn primary() -> Self {
        Self::primary_with_kid("primary")
    }

    /// The `primary` fixture under a custom key id.
    pub fn primary_with_kid(kid: &str) -> Self {
        Self::from_pem(kid, PRIMARY_PUBLIC_PEM, PRIMARY_PRIVATE_PEM)
            .expect("primary fixture must load")
    }

    /// The `rotated` fixture with key id `rotated`.
    pub fn rotated() -> Self {
        Self::rotated_with_kid("rotated")
    }

    /// The `rotated` fixture under a custom key id.
    pub fn rotated_with_kid(kid: &str) -> Self {
        Self::from_pem(kid, ROTATED_PUBLIC_PEM, ROTATED_PRIVATE_PEM)
            .expect("rotated fixture must load")
    }

    /// Base64url modulus.
    pub fn modulus_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be())
    }

    /// Base64url public exponent.
    pub fn exponent_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be())
    }

    /// JWK entry for this key, as a key-set endpoint would publish it.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus_b64(),
            "e": self.exponent_b64()
        })
    }

    /// Sign `claims` with RS256 and this key's `kid`.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign `claims` with an arbitrary header (e.g. missing or foreign `kid`).
    pub fn sign_with_header(&self, header: &Header, claims: &serde_json::Value) -> String {
        encode(header, claims, &self.encoding_key).expect("Failed to sign token")
    }
}

/// A JWK set document containing `keypairs`.
pub fn jwks_json(keypairs: &[&TestKeypair]) -> serde_json::Value {
    serde_json::json!({
        "keys": keypairs.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}
