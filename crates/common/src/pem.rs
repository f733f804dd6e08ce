//! PEM document decoding.
//!
//! Strips the `-----BEGIN <LABEL>-----` / `-----END <LABEL>-----` lines and
//! all whitespace, then base64-decodes the body. The label is returned so
//! callers can pick the matching DER parser (SPKI, PKCS#8, PKCS#1).

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Errors from [`decode_pem`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PemError {
    /// No base64 body between the armor lines.
    #[error("PEM document is empty")]
    Empty,

    /// Body is not valid standard base64.
    #[error("PEM body is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A decoded PEM block.
#[derive(Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// Label from the BEGIN line (e.g. `PUBLIC KEY`), `None` for bare base64.
    pub label: Option<String>,
    /// Decoded DER bytes.
    pub der: Vec<u8>,
}

impl std::fmt::Debug for PemBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemBlock")
            .field("label", &self.label)
            .field("der", &format_args!("[{} bytes]", self.der.len()))
            .finish()
    }
}

/// Decode a PEM document (or bare base64 body) into its label and DER bytes.
///
/// # Errors
///
/// - `Empty` if nothing remains after stripping armor and whitespace
/// - `InvalidBase64` if the body does not decode
pub fn decode_pem(pem: &str) -> Result<PemBlock, PemError> {
    let label = pem.lines().map(str::trim).find_map(|line| {
        line.strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
            .map(ToString::to_string)
    });

    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect();

    if body.is_empty() {
        return Err(PemError::Empty);
    }

    let der = STANDARD
        .decode(body)
        .map_err(|e| PemError::InvalidBase64(e.to_string()))?;

    Ok(PemBlock { label, der })
}
