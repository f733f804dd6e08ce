//! Key Material Provider.
//!
//! Loads the RSA key pair (or public key only) used to sign and verify
//! tokens. Keys are read once at startup; any decode or import failure is
//! fatal so the service never runs half-initialized.
//!
//! Accepted encodings:
//! - Public: `PUBLIC KEY` (SPKI) or `RSA PUBLIC KEY` (PKCS#1)
//! - Private: `PRIVATE KEY` (PKCS#8) or `RSA PRIVATE KEY` (PKCS#1)

use crate::config::AuthConfig;
use crate::errors::KeyLoadError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::pem::decode_pem;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::path::Path;

/// Smallest RSA modulus accepted for signing or verification.
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// An RSA public key, optionally paired with its private half.
///
/// Immutable after construction and freely shared behind an `Arc`.
pub struct KeyMaterial {
    key_id: String,
    public_key: RsaPublicKey,
    decoding_key: DecodingKey,
    encoding_key: Option<EncodingKey>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("bits", &self.bits())
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl KeyMaterial {
    /// Load the configured key files.
    ///
    /// The public key is required. The private key is loaded only when
    /// `AUTH_PRIVATE_KEY_PATH` is set, and must match the public key.
    ///
    /// # Errors
    ///
    /// Any read, decode, import or consistency failure.
    pub fn load(config: &AuthConfig) -> Result<Self, KeyLoadError> {
        let public_path = config.public_key_path.as_deref().ok_or_else(|| {
            KeyLoadError::MissingKey("AUTH_PUBLIC_KEY_PATH is not set".to_string())
        })?;

        let public_pem = read_pem_file(public_path)?;
        let private_pem = config
            .private_key_path
            .as_deref()
            .map(read_pem_file)
            .transpose()?;

        let material = Self::from_pem(
            config.signing.key_id.clone(),
            &public_pem,
            private_pem.as_deref(),
        )?;

        tracing::info!(
            target: "auth.keys",
            kid = %material.key_id,
            bits = material.bits(),
            can_sign = material.can_sign(),
            "Key material loaded"
        );

        Ok(material)
    }

    /// Build key material from PEM documents.
    ///
    /// # Errors
    ///
    /// - `Pem` / `UnsupportedLabel` for undecodable documents
    /// - `InvalidPublicKey` / `InvalidPrivateKey` for DER import failures
    /// - `KeyTooSmall` below [`MIN_RSA_KEY_BITS`]
    /// - `KeyMismatch` when the private key does not belong to the public key
    pub fn from_pem(
        key_id: String,
        public_pem: &str,
        private_pem: Option<&str>,
    ) -> Result<Self, KeyLoadError> {
        let public_key = parse_public_key(public_pem)?;
        let mut material = Self::from_public_key(key_id, public_key)?;

        if let Some(private_pem) = private_pem {
            let private_key = parse_private_key(private_pem)?;
            if private_key.to_public_key() != material.public_key {
                tracing::error!(
                    target: "auth.keys",
                    kid = %material.key_id,
                    "Private key does not match public key"
                );
                return Err(KeyLoadError::KeyMismatch);
            }

            let der = private_key
                .to_pkcs1_der()
                .map_err(|e| KeyLoadError::InvalidPrivateKey(e.to_string()))?;
            material.encoding_key = Some(EncodingKey::from_rsa_der(der.as_bytes()));
        }

        Ok(material)
    }

    /// Build verification-only key material from an imported public key.
    ///
    /// # Errors
    ///
    /// `KeyTooSmall` below [`MIN_RSA_KEY_BITS`].
    pub fn from_public_key(key_id: String, public_key: RsaPublicKey) -> Result<Self, KeyLoadError> {
        let bits = public_key.size() * 8;
        if bits < MIN_RSA_KEY_BITS {
            return Err(KeyLoadError::KeyTooSmall {
                bits,
                min_bits: MIN_RSA_KEY_BITS,
            });
        }

        let modulus = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let exponent = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&modulus, &exponent)
            .map_err(|e| KeyLoadError::InvalidPublicKey(e.to_string()))?;

        Ok(Self {
            key_id,
            public_key,
            decoding_key,
            encoding_key: None,
        })
    }

    /// Build verification-only key material from base64url JWK components.
    ///
    /// # Errors
    ///
    /// `InvalidPublicKey` for bad encodings or an invalid modulus/exponent.
    pub fn from_components(
        key_id: String,
        modulus_b64: &str,
        exponent_b64: &str,
    ) -> Result<Self, KeyLoadError> {
        let n = URL_SAFE_NO_PAD
            .decode(modulus_b64)
            .map_err(|e| KeyLoadError::InvalidPublicKey(format!("modulus: {e}")))?;
        let e = URL_SAFE_NO_PAD
            .decode(exponent_b64)
            .map_err(|e| KeyLoadError::InvalidPublicKey(format!("exponent: {e}")))?;

        let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|e| KeyLoadError::InvalidPublicKey(e.to_string()))?;

        Self::from_public_key(key_id, public_key)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public_key.size() * 8
    }

    /// Base64url (unpadded) big-endian modulus, as published in a JWK.
    pub fn modulus_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be())
    }

    /// Base64url (unpadded) big-endian public exponent, as published in a JWK.
    pub fn exponent_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be())
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Signing key, present only on issuance-capable nodes.
    pub fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding_key.as_ref()
    }

    pub fn can_sign(&self) -> bool {
        self.encoding_key.is_some()
    }
}

fn read_pem_file(path: &Path) -> Result<String, KeyLoadError> {
    std::fs::read_to_string(path).map_err(|e| {
        tracing::error!(target: "auth.keys", path = %path.display(), error = %e, "Failed to read key file");
        KeyLoadError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    })
}

fn parse_public_key(pem: &str) -> Result<RsaPublicKey, KeyLoadError> {
    let block = decode_pem(pem)?;
    let invalid = |e: &dyn fmt::Display| KeyLoadError::InvalidPublicKey(e.to_string());

    match block.label.as_deref() {
        Some("PUBLIC KEY") => RsaPublicKey::from_public_key_der(&block.der).map_err(|e| invalid(&e)),
        Some("RSA PUBLIC KEY") => RsaPublicKey::from_pkcs1_der(&block.der).map_err(|e| invalid(&e)),
        None => RsaPublicKey::from_public_key_der(&block.der)
            .or_else(|_| RsaPublicKey::from_pkcs1_der(&block.der))
            .map_err(|e| invalid(&e)),
        Some(other) => Err(KeyLoadError::UnsupportedLabel(other.to_string())),
    }
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, KeyLoadError> {
    let block = decode_pem(pem)?;
    let invalid = |e: &dyn fmt::Display| KeyLoadError::InvalidPrivateKey(e.to_string());

    match block.label.as_deref() {
        Some("PRIVATE KEY") => RsaPrivateKey::from_pkcs8_der(&block.der).map_err(|e| invalid(&e)),
        Some("RSA PRIVATE KEY") => RsaPrivateKey::from_pkcs1_der(&block.der).map_err(|e| invalid(&e)),
        None => RsaPrivateKey::from_pkcs8_der(&block.der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(&block.der))
            .map_err(|e| invalid(&e)),
        Some(other) => Err(KeyLoadError::UnsupportedLabel(other.to_string())),
    }
}
