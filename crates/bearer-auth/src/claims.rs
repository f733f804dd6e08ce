//! Claim model.
//!
//! [`RawClaims`] mirrors the wire JSON leniently so structural problems and
//! business-rule problems can be told apart. [`ClaimSet`] is what a caller
//! gets back from a successful validation. The subject is redacted in Debug
//! output of both.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claim names set by the issuer. Callers may not supply them.
pub const RESERVED_CLAIMS: [&str; 6] = ["iss", "aud", "sub", "iat", "exp", "nbf"];

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        }
    }
}

/// Claims exactly as decoded from the token, before any checks.
#[derive(Clone, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub aud: Option<Audience>,

    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,

    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,

    #[serde(default, deserialize_with = "numeric_date")]
    pub nbf: Option<i64>,

    /// Everything that is not a registered claim.
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// NumericDate in whole seconds. Fractional values are floored.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(secs) = number.as_i64() {
        return Ok(Some(secs));
    }
    match number.as_f64() {
        Some(secs) if secs.is_finite() && secs >= i64::MIN as f64 && secs < i64::MAX as f64 => {
            Ok(Some(secs.floor() as i64))
        }
        _ => Err(D::Error::custom(format!("NumericDate out of range: {number}"))),
    }
}

impl fmt::Debug for RawClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("custom_keys", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Verified claims of a valid token.
///
/// Only produced by the validator after the signature, time window, subject,
/// issuer and audience checks have passed.
#[derive(Clone, PartialEq)]
pub struct ClaimSet {
    /// `iss`, if the token carried one.
    pub issuer: Option<String>,

    /// `aud`, normalized to a list.
    pub audience: Vec<String>,

    /// `sub` - never empty. Redacted in Debug output.
    pub subject: String,

    /// `iat` (Unix epoch seconds).
    pub issued_at: Option<i64>,

    /// `exp` (Unix epoch seconds).
    pub expires_at: i64,

    /// `nbf` (Unix epoch seconds).
    pub not_before: Option<i64>,

    /// Non-registered claims.
    pub custom: Map<String, Value>,
}

impl ClaimSet {
    /// Build from raw claims whose subject and expiry are already checked.
    pub(crate) fn from_raw(raw: RawClaims, subject: String, expires_at: i64) -> Self {
        Self {
            issuer: raw.iss,
            audience: raw.aud.map(Audience::into_vec).unwrap_or_default(),
            subject,
            issued_at: raw.iat,
            expires_at,
            not_before: raw.nbf,
            custom: raw.custom,
        }
    }

    /// Look up a custom claim.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.custom.get(name)
    }

    /// Whether `aud` contains `audience`.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.audience.iter().any(|a| a == audience)
    }
}

/// Custom Debug implementation that redacts the `subject` field.
impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("subject", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("not_before", &self.not_before)
            .field("custom_keys", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_claims_separates_custom() {
        let raw: RawClaims = serde_json::from_value(json!({
            "iss": "svc-a",
            "aud": "svc-b",
            "sub": "u1",
            "iat": 100,
            "exp": 200,
            "roles": ["user"],
            "tenant": "acme"
        }))
        .unwrap();

        assert_eq!(raw.iss.as_deref(), Some("svc-a"));
        assert_eq!(raw.aud, Some(Audience::One("svc-b".to_string())));
        assert_eq!(raw.exp, Some(200));
        assert!(raw.nbf.is_none());
        assert_eq!(raw.custom.len(), 2);
        assert_eq!(raw.custom.get("roles"), Some(&json!(["user"])));
        assert!(!raw.custom.contains_key("sub"));
    }

    #[test]
    fn test_raw_claims_audience_array() {
        let raw: RawClaims =
            serde_json::from_value(json!({"aud": ["svc-b", "svc-c"], "exp": 1})).unwrap();
        let claims = ClaimSet::from_raw(raw, "u1".to_string(), 1);

        assert_eq!(claims.audience, vec!["svc-b", "svc-c"]);
        assert!(claims.has_audience("svc-c"));
        assert!(!claims.has_audience("svc-d"));
    }

    #[test]
    fn test_raw_claims_all_optional() {
        let raw: RawClaims = serde_json::from_value(json!({})).unwrap();
        assert!(raw.sub.is_none());
        assert!(raw.exp.is_none());
        assert!(raw.custom.is_empty());
    }

    #[test]
    fn test_fractional_numeric_dates() {
        let raw: RawClaims = serde_json::from_value(
            json!({"iat": 1_699_999_999.25, "exp": 1_700_000_000.5, "nbf": -0.5}),
        )
        .unwrap();
        assert_eq!(raw.iat, Some(1_699_999_999));
        assert_eq!(raw.exp, Some(1_700_000_000));
        assert_eq!(raw.nbf, Some(-1));

        let raw: RawClaims = serde_json::from_value(json!({"exp": null})).unwrap();
        assert!(raw.exp.is_none());

        assert!(serde_json::from_value::<RawClaims>(json!({"exp": 1e300})).is_err());
        assert!(serde_json::from_value::<RawClaims>(json!({"exp": u64::MAX})).is_err());
    }

    #[test]
    fn test_raw_claims_wrong_types_rejected() {
        assert!(serde_json::from_value::<RawClaims>(json!({"exp": "tomorrow"})).is_err());
        assert!(serde_json::from_value::<RawClaims>(json!({"aud": 42})).is_err());
        assert!(serde_json::from_value::<RawClaims>(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_claim_set_debug_redacts_subject() {
        let raw: RawClaims = serde_json::from_value(json!({"exp": 1})).unwrap();
        let claims = ClaimSet::from_raw(raw, "secret-user-id".to_string(), 1);

        let debug_str = format!("{:?}", claims);
        assert!(!debug_str.contains("secret-user-id"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_raw_claims_debug_redacts_subject() {
        let raw: RawClaims =
            serde_json::from_value(json!({"sub": "secret-user-id", "exp": 1})).unwrap();
        let debug_str = format!("{:?}", raw);
        assert!(!debug_str.contains("secret-user-id"));
    }

    #[test]
    fn test_reserved_claims() {
        for name in ["iss", "aud", "sub", "iat", "exp"] {
            assert!(RESERVED_CLAIMS.contains(&name));
        }
        assert!(!RESERVED_CLAIMS.contains(&"roles"));
    }
}
