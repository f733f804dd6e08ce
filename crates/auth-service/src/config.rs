//! Auth service configuration.

use bearer_auth::{AuthConfig, ConfigError};
use std::collections::HashMap;
use std::env;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default graceful-shutdown drain period. The service holds no per-request
/// state, so there is nothing to drain by default.
pub const DEFAULT_DRAIN_SECONDS: u64 = 0;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Server bind address.
    pub bind_address: String,

    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,

    /// Authentication core configuration.
    pub auth: AuthConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Self {
            bind_address,
            drain_seconds,
            auth: AuthConfig::from_vars(vars)?,
        })
    }
}
