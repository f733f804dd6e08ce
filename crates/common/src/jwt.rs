//! Compact-token utilities shared across the bearer-auth crates.
//!
//! This module provides the wire-level pieces every token consumer needs
//! before any key material is involved:
//! - Size limits for DoS prevention
//! - Clock skew constants
//! - Splitting a compact token into its three base64url segments
//! - Decoding the header and claims segments
//! - Expiry / not-before checks with clock skew tolerance
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE splitting or decoding
//! - Nothing in this module verifies a signature; callers must verify the
//!   signature over [`CompactToken::signing_input`] before trusting claims
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{CompactToken, check_time_window, DEFAULT_CLOCK_SKEW};
//!
//! let compact = CompactToken::parse(token)?;
//! let claims: serde_json::Value = compact.decode_claims()?;
//! // ... verify compact.signature over compact.signing_input() ...
//! check_time_window(Some(exp), nbf, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed token size in bytes (8KB).
///
/// Tokens larger than this are rejected BEFORE any base64 or JSON work.
/// A typical RS256 token with a handful of custom claims is well under 1KB;
/// the 2048-bit signature alone accounts for 342 base64url characters.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance applied to `exp` and `nbf` (60 seconds).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Prevents a misconfiguration from turning expiry into a suggestion.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Structural errors in a compact token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompactTokenError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("token exceeds maximum size")]
    TokenTooLarge,

    /// Not three non-empty dot-separated segments.
    #[error("token is not a compact serialization")]
    MalformedToken,

    /// A segment is not valid base64url.
    #[error("token segment is not valid base64url")]
    InvalidEncoding,

    /// The claims segment is not a JSON object of the expected shape.
    #[error("token claims are not valid JSON: {0}")]
    InvalidClaims(String),

    /// The header segment is not a JSON object of the expected shape.
    #[error("token header is not valid JSON: {0}")]
    InvalidHeader(String),
}

/// Time-window violations, checked after signature verification.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindowError {
    /// `exp` is missing, or earlier than `now - skew`.
    #[error("token expired")]
    Expired,

    /// `nbf` is later than `now + skew`.
    #[error("token not yet valid")]
    NotYetValid,
}

// =============================================================================
// Compact token
// =============================================================================

/// A compact token split into its three segments.
///
/// Borrowing view; no decoding has happened yet beyond the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactToken<'a> {
    /// base64url header segment.
    pub header: &'a str,
    /// base64url claims segment.
    pub claims: &'a str,
    /// base64url signature segment.
    pub signature: &'a str,
    signing_input: &'a str,
}

impl<'a> CompactToken<'a> {
    /// Split `token` into header, claims and signature segments.
    ///
    /// # Errors
    ///
    /// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
    /// - `MalformedToken` unless there are exactly three non-empty segments
    pub fn parse(token: &'a str) -> Result<Self, CompactTokenError> {
        // Check token size first (DoS prevention)
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "common.jwt",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(CompactTokenError::TokenTooLarge);
        }

        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid compact format");
            return Err(CompactTokenError::MalformedToken);
        };

        if header.is_empty() || claims.is_empty() || signature.is_empty() {
            tracing::debug!(target: "common.jwt", "Token rejected: empty segment");
            return Err(CompactTokenError::MalformedToken);
        }

        // header.claims without the trailing dot; both segments are ASCII
        let signing_input = token
            .get(..header.len() + 1 + claims.len())
            .ok_or(CompactTokenError::MalformedToken)?;

        Ok(Self {
            header,
            claims,
            signature,
            signing_input,
        })
    }

    /// The bytes covered by the signature: `header.claims`.
    #[must_use]
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// Decode the header segment into `T`.
    ///
    /// # Errors
    ///
    /// - `InvalidEncoding` if the segment is not base64url
    /// - `InvalidHeader` if the JSON does not deserialize into `T`
    pub fn decode_header<T: DeserializeOwned>(&self) -> Result<T, CompactTokenError> {
        let bytes = URL_SAFE_NO_PAD.decode(self.header).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to decode header base64");
            CompactTokenError::InvalidEncoding
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse header JSON");
            CompactTokenError::InvalidHeader(e.to_string())
        })
    }

    /// Decode the claims segment into `T`.
    ///
    /// This does NOT verify anything. The result must not be used for
    /// decisions until the signature has been checked.
    ///
    /// # Errors
    ///
    /// - `InvalidEncoding` if the segment is not base64url
    /// - `InvalidClaims` if the JSON does not deserialize into `T`
    pub fn decode_claims<T: DeserializeOwned>(&self) -> Result<T, CompactTokenError> {
        let bytes = URL_SAFE_NO_PAD.decode(self.claims).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to decode claims base64");
            CompactTokenError::InvalidEncoding
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse claims JSON");
            CompactTokenError::InvalidClaims(e.to_string())
        })
    }
}

// =============================================================================
// Time window
// =============================================================================

/// Check `exp` / `nbf` against the current time with `clock_skew` tolerance.
///
/// # Errors
///
/// - `Expired` if `exp` is missing or `exp < now - skew`
/// - `NotYetValid` if `nbf` is present and `nbf > now + skew`
pub fn check_time_window(
    exp: Option<i64>,
    nbf: Option<i64>,
    clock_skew: Duration,
) -> Result<(), TimeWindowError> {
    let now = chrono::Utc::now().timestamp();
    check_time_window_at(exp, nbf, clock_skew, now)
}

/// Deterministic variant of [`check_time_window`] against an explicit `now`.
///
/// # Errors
///
/// Same as [`check_time_window`].
pub fn check_time_window_at(
    exp: Option<i64>,
    nbf: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), TimeWindowError> {
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let earliest_exp = now.saturating_sub(skew);
    let latest_nbf = now.saturating_add(skew);

    let Some(exp) = exp else {
        tracing::debug!(target: "common.jwt", "Token rejected: missing exp");
        return Err(TimeWindowError::Expired);
    };

    if exp < earliest_exp {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            clock_skew_secs = skew,
            "Token rejected: expired"
        );
        return Err(TimeWindowError::Expired);
    }

    if let Some(nbf) = nbf {
        if nbf > latest_nbf {
            tracing::debug!(
                target: "common.jwt",
                nbf = nbf,
                now = now,
                clock_skew_secs = skew,
                "Token rejected: not yet valid"
            );
            return Err(TimeWindowError::NotYetValid);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
