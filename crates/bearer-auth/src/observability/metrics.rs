//! Metrics definitions for the authentication core.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 2 values (valid, invalid)
//! - `reason`: bounded by `InvalidReason` variants plus `none`
//! - `status`: 2 values (success, error)
//! - `result`: cache hit/miss, or one of 4 gate decisions
//!
//! Subjects, key ids and token contents are never used as labels.

use crate::errors::InvalidReason;
use metrics::counter;

// ============================================================================
// Validation
// ============================================================================

/// Record a validation outcome.
///
/// Metric: `auth_token_validations_total`
/// Labels: `outcome`, `reason`
pub fn record_token_validation(reason: Option<InvalidReason>) {
    let (outcome, reason) = match reason {
        None => ("valid", "none"),
        Some(reason) => ("invalid", reason.as_str()),
    };

    counter!("auth_token_validations_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

// ============================================================================
// Remote key set
// ============================================================================

/// Record a key-set network fetch.
///
/// Metric: `auth_jwks_fetch_total`
/// Labels: `status` (success, error)
pub fn record_jwks_fetch(status: &'static str) {
    counter!("auth_jwks_fetch_total", "status" => status).increment(1);
}

/// Record a key-set cache lookup.
///
/// Metric: `auth_jwks_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_cache(result: &'static str) {
    counter!("auth_jwks_cache_total", "result" => result).increment(1);
}

// ============================================================================
// Issuance and gate
// ============================================================================

/// Record a token issuance attempt.
///
/// Metric: `auth_tokens_issued_total`
/// Labels: `status` (success, error)
pub fn record_token_issued(status: &'static str) {
    counter!("auth_tokens_issued_total", "status" => status).increment(1);
}

/// Record an authentication gate decision.
///
/// Metric: `auth_gate_requests_total`
/// Labels: `result` (excluded, anonymous, authenticated, rejected)
pub fn record_gate_request(result: &'static str) {
    counter!("auth_gate_requests_total", "result" => result).increment(1);
}
