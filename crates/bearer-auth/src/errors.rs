//! Error taxonomy for key loading, remote key-set fetching, issuance and
//! validation.
//!
//! - [`KeyLoadError`] is fatal at startup.
//! - [`FetchError`] is recoverable; the next call retries. It is `Clone` so a
//!   single in-flight fetch can hand the same failure to every waiter.
//! - [`SigningError`] is surfaced to the caller of issuance.
//! - [`InvalidReason`] is the machine-distinguishable reason carried by an
//!   invalid validation outcome. It never reaches an HTTP response directly.

use common::pem::PemError;
use thiserror::Error;

/// Failure loading or importing key material.
#[derive(Debug, Error)]
pub enum KeyLoadError {
    #[error("Failed to read key file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid PEM document: {0}")]
    Pem(#[from] PemError),

    #[error("Unsupported PEM label: {0}")]
    UnsupportedLabel(String),

    #[error("Invalid RSA public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid RSA private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RSA key is too small: {bits} bits (minimum {min_bits})")]
    KeyTooSmall { bits: usize, min_bits: usize },

    #[error("Private key does not match the configured public key")]
    KeyMismatch,

    #[error("Missing key configuration: {0}")]
    MissingKey(String),
}

/// Failure fetching or parsing the remote key set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Key-set request failed: {0}")]
    Request(String),

    #[error("Key-set request timed out")]
    Timeout,

    #[error("Key-set endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Key-set response is not a valid JWK set: {0}")]
    InvalidBody(String),

    #[error("Key-set response contains no usable signing keys")]
    EmptyKeySet,
}

/// Failure issuing a token.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Token issuance is not enabled on this node (no private key)")]
    NoPrivateKey,

    #[error("Subject must not be empty")]
    EmptySubject,

    #[error("Claim '{0}' is reserved and set by the issuer")]
    ReservedClaim(String),

    #[error("Failed to sign token: {0}")]
    Encoding(String),
}

/// Why a presented token was rejected.
///
/// The string labels are stable; they appear in logs, in the
/// `auth_token_validations_total` metric and in the validation endpoint body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InvalidReason {
    #[error("token is malformed")]
    Malformed,

    #[error("token signing key is unknown")]
    UnknownKey,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token has no subject")]
    MissingSubject,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("token key source is unavailable")]
    KeySourceUnavailable,
}

impl InvalidReason {
    /// Stable snake_case label.
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidReason::Malformed => "malformed",
            InvalidReason::UnknownKey => "unknown_key",
            InvalidReason::BadSignature => "bad_signature",
            InvalidReason::Expired => "expired",
            InvalidReason::NotYetValid => "not_yet_valid",
            InvalidReason::MissingSubject => "missing_subject",
            InvalidReason::IssuerMismatch => "issuer_mismatch",
            InvalidReason::AudienceMismatch => "audience_mismatch",
            InvalidReason::KeySourceUnavailable => "key_source_unavailable",
        }
    }
}
