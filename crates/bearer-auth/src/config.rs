//! Authentication configuration.
//!
//! Loaded from `AUTH_*` environment variables. [`SigningConfig`] is the
//! immutable part shared by the issuer and the validator; the rest of
//! [`AuthConfig`] selects where keys come from and how the gate behaves.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default issued token lifetime (1 hour).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_millis(3_600_000);

/// Default remote key-set cache TTL (1 hour).
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_millis(3_600_000);

/// Default connect timeout for the key-set endpoint.
pub const DEFAULT_JWKS_CONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default read timeout for the key-set endpoint.
pub const DEFAULT_JWKS_READ_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default floor between refetches forced by an unknown `kid` (none).
pub const DEFAULT_JWKS_MIN_REFRESH_INTERVAL: Duration = Duration::ZERO;

/// Default delay before the one-shot key-set preload.
pub const DEFAULT_JWKS_PRELOAD_DELAY: Duration = Duration::from_millis(2_000);

/// Paths that skip authentication unless overridden.
pub const DEFAULT_EXCLUDED_PATHS: &str = "/actuator/**,/health,/v1/health,/metrics,/.well-known/**";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Where verification keys come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// Single locally held public key.
    Local,
    /// Remote key set matched by key id.
    Remote,
}

impl VerificationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationMode::Local => "local",
            VerificationMode::Remote => "remote",
        }
    }
}

/// Issuer/audience/lifetime settings shared by issuance and validation.
///
/// Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// Value of the `iss` claim, and the expected issuer when validating.
    pub issuer: String,

    /// Value of the `aud` claim, and the expected audience when validating.
    pub audience: String,

    /// Lifetime of issued tokens.
    pub token_ttl: Duration,

    /// Key identifier embedded in the header of every issued token.
    pub key_id: String,

    /// Whether validation compares `iss` against [`Self::issuer`].
    pub validate_issuer: bool,

    /// Whether validation requires [`Self::audience`] in `aud`.
    pub validate_audience: bool,
}

/// Full authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// When `false` the authentication gate is not installed.
    pub enabled: bool,

    /// Issuer/audience/TTL/key id.
    pub signing: SigningConfig,

    /// Clock skew tolerance for `exp` / `nbf`.
    pub clock_skew: Duration,

    /// PEM public key (SPKI or PKCS#1).
    pub public_key_path: Option<PathBuf>,

    /// PEM private key (PKCS#8 or PKCS#1). Enables issuance.
    pub private_key_path: Option<PathBuf>,

    /// Remote key-set URI. When set, validation runs in remote mode.
    pub jwks_uri: Option<String>,

    /// Remote key-set cache TTL.
    pub jwks_cache_ttl: Duration,

    pub jwks_connect_timeout: Duration,

    pub jwks_read_timeout: Duration,

    /// Minimum age of the cached key set before an unknown `kid` may force
    /// a refetch. Zero refetches on every miss.
    pub jwks_min_refresh_interval: Duration,

    /// Delay of the background key-set preload after startup.
    pub jwks_preload_delay: Duration,

    /// Ordered path patterns that bypass authentication.
    pub excluded_paths: Vec<String>,
}

/// Custom Debug implementation; key paths and URIs are shown, nothing
/// secret is held in this struct.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("signing", &self.signing)
            .field("clock_skew", &self.clock_skew)
            .field("public_key_path", &self.public_key_path)
            .field("private_key_path", &self.private_key_path)
            .field("jwks_uri", &self.jwks_uri)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_connect_timeout", &self.jwks_connect_timeout)
            .field("jwks_read_timeout", &self.jwks_read_timeout)
            .field("jwks_min_refresh_interval", &self.jwks_min_refresh_interval)
            .field("jwks_preload_delay", &self.jwks_preload_delay)
            .field("excluded_paths", &self.excluded_paths)
            .finish()
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let enabled = parse_bool(vars, "AUTH_ENABLED", true)?;
        let validate_issuer = parse_bool(vars, "AUTH_VALIDATE_ISSUER", true)?;
        let validate_audience = parse_bool(vars, "AUTH_VALIDATE_AUDIENCE", true)?;

        let issuer = non_blank(vars, "AUTH_ISSUER");
        let audience = non_blank(vars, "AUTH_AUDIENCE");
        let public_key_path = non_blank(vars, "AUTH_PUBLIC_KEY_PATH").map(PathBuf::from);
        let private_key_path = non_blank(vars, "AUTH_PRIVATE_KEY_PATH").map(PathBuf::from);
        let jwks_uri = non_blank(vars, "AUTH_JWKS_URI");

        if let Some(uri) = &jwks_uri {
            if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "AUTH_JWKS_URI must be an http(s) URL, got '{}'",
                    uri
                )));
            }
        }

        let key_id = match vars.get("AUTH_KEY_ID") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(
                    "AUTH_KEY_ID must not be blank".to_string(),
                ));
            }
            Some(value) => value.trim().to_string(),
            // A verify-only node cannot learn the issuer's kid, so it has to be told
            None if jwks_uri.is_none()
                && public_key_path.is_some()
                && private_key_path.is_none() =>
            {
                return Err(ConfigError::MissingEnvVar(
                    "AUTH_KEY_ID (required to verify with a public key only)".to_string(),
                ));
            }
            // Every key generation must be traceable, so mint one per process
            None => uuid::Uuid::new_v4().to_string(),
        };

        let token_ttl = parse_positive_millis(vars, "AUTH_TOKEN_TTL_MS", DEFAULT_TOKEN_TTL)?;
        let jwks_cache_ttl =
            parse_positive_millis(vars, "AUTH_JWKS_CACHE_TTL_MS", DEFAULT_JWKS_CACHE_TTL)?;
        let jwks_connect_timeout = parse_positive_millis(
            vars,
            "AUTH_JWKS_CONNECT_TIMEOUT_MS",
            DEFAULT_JWKS_CONNECT_TIMEOUT,
        )?;
        let jwks_read_timeout =
            parse_positive_millis(vars, "AUTH_JWKS_READ_TIMEOUT_MS", DEFAULT_JWKS_READ_TIMEOUT)?;
        let jwks_min_refresh_interval = match vars.get("AUTH_JWKS_MIN_REFRESH_INTERVAL_MS") {
            Some(value_str) => Duration::from_millis(value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "AUTH_JWKS_MIN_REFRESH_INTERVAL_MS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?),
            None => DEFAULT_JWKS_MIN_REFRESH_INTERVAL,
        };
        let jwks_preload_delay = match vars.get("AUTH_JWKS_PRELOAD_DELAY_MS") {
            Some(value_str) => Duration::from_millis(value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "AUTH_JWKS_PRELOAD_DELAY_MS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?),
            None => DEFAULT_JWKS_PRELOAD_DELAY,
        };

        // Parse clock skew tolerance with validation
        let clock_skew = if let Some(value_str) = vars.get("AUTH_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "AUTH_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidValue(format!(
                    "AUTH_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let excluded_paths = parse_excluded_paths(
            vars.get("AUTH_EXCLUDED_PATHS")
                .map_or(DEFAULT_EXCLUDED_PATHS, String::as_str),
        )?;

        if enabled {
            if jwks_uri.is_none() && public_key_path.is_none() {
                return Err(ConfigError::MissingEnvVar(
                    "AUTH_PUBLIC_KEY_PATH (or AUTH_JWKS_URI)".to_string(),
                ));
            }
            if validate_issuer && issuer.is_none() {
                return Err(ConfigError::MissingEnvVar("AUTH_ISSUER".to_string()));
            }
            if validate_audience && audience.is_none() {
                return Err(ConfigError::MissingEnvVar("AUTH_AUDIENCE".to_string()));
            }
        }

        if private_key_path.is_some() {
            if public_key_path.is_none() {
                return Err(ConfigError::MissingEnvVar(
                    "AUTH_PUBLIC_KEY_PATH".to_string(),
                ));
            }
            if issuer.is_none() {
                return Err(ConfigError::MissingEnvVar("AUTH_ISSUER".to_string()));
            }
            if audience.is_none() {
                return Err(ConfigError::MissingEnvVar("AUTH_AUDIENCE".to_string()));
            }
        }

        Ok(Self {
            enabled,
            signing: SigningConfig {
                issuer: issuer.unwrap_or_default(),
                audience: audience.unwrap_or_default(),
                token_ttl,
                key_id,
                validate_issuer,
                validate_audience,
            },
            clock_skew,
            public_key_path,
            private_key_path,
            jwks_uri,
            jwks_cache_ttl,
            jwks_connect_timeout,
            jwks_read_timeout,
            jwks_min_refresh_interval,
            jwks_preload_delay,
            excluded_paths,
        })
    }

    /// Remote when a key-set URI is configured, local otherwise.
    pub fn verification_mode(&self) -> VerificationMode {
        if self.jwks_uri.is_some() {
            VerificationMode::Remote
        } else {
            VerificationMode::Local
        }
    }

    /// Whether this node can issue tokens.
    pub fn issuance_enabled(&self) -> bool {
        self.private_key_path.is_some()
    }
}

fn non_blank(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} must be true or false, got '{}'",
            name, value
        ))),
    }
}

fn parse_positive_millis(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_millis(value))
}

fn parse_excluded_paths(value: &str) -> Result<Vec<String>, ConfigError> {
    let patterns: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect();

    if let Some(bad) = patterns.iter().find(|p| !p.starts_with('/')) {
        return Err(ConfigError::InvalidValue(format!(
            "AUTH_EXCLUDED_PATHS entries must start with '/', got '{}'",
            bad
        )));
    }

    Ok(patterns)
}
