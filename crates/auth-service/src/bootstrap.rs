//! Composition root.
//!
//! Turns an [`AuthConfig`] into the shared [`AppState`]: loads key material,
//! picks local or remote verification, enables issuance when a private key is
//! present, and builds the gate when authentication is enabled.

use crate::errors::StartupError;
use crate::routes::AppState;
use bearer_auth::validator::JwksKeyResolver;
use bearer_auth::{
    AuthConfig, AuthGate, JwkSet, JwksClient, Jwk, KeyMaterial, PathMatcher, TokenIssuer,
    TokenValidator, VerificationMode,
};
use std::sync::Arc;

/// Build application state from configuration.
///
/// # Errors
///
/// Key files that cannot be loaded, or a private key the issuer rejects.
pub fn build_state(config: &AuthConfig) -> Result<AppState, StartupError> {
    let local_key = match config.public_key_path {
        Some(_) => Some(Arc::new(KeyMaterial::load(config)?)),
        None => None,
    };

    let signing = Arc::new(config.signing.clone());

    let issuer = match &local_key {
        Some(key) if key.can_sign() => Some(Arc::new(TokenIssuer::new(
            Arc::clone(key),
            Arc::clone(&signing),
        )?)),
        _ => None,
    };

    let jwks_client = config.jwks_uri.as_ref().map(|uri| {
        JwksClient::with_settings(
            uri.clone(),
            config.jwks_cache_ttl,
            config.jwks_connect_timeout,
            config.jwks_read_timeout,
        )
    });

    let validator = match (config.verification_mode(), &jwks_client, &local_key) {
        (VerificationMode::Remote, Some(client), _) => Some(Arc::new(TokenValidator::new(
            Arc::new(JwksKeyResolver::with_min_refresh_interval(
                client.clone(),
                config.jwks_min_refresh_interval,
            )),
            Arc::clone(&signing),
            config.clock_skew,
        ))),
        (VerificationMode::Local, _, Some(key)) => Some(Arc::new(TokenValidator::local(
            Arc::clone(key),
            Arc::clone(&signing),
            config.clock_skew,
        ))),
        _ => None,
    };

    let gate = match (&validator, config.enabled) {
        (Some(validator), true) => Some(Arc::new(AuthGate::new(
            Arc::clone(validator),
            PathMatcher::new(config.excluded_paths.iter().cloned()),
        ))),
        _ => None,
    };

    let published_keys = local_key.as_ref().map(|key| JwkSet {
        keys: vec![Jwk::from_key_material(key)],
    });

    tracing::info!(
        target: "auth.service.bootstrap",
        enabled = config.enabled,
        mode = validator.as_ref().map_or("none", |v| v.mode().as_str()),
        issuance = issuer.is_some(),
        publishes_keys = published_keys.is_some(),
        "Authentication components initialized"
    );

    Ok(AppState {
        auth_enabled: config.enabled,
        gate,
        validator,
        issuer,
        jwks_client,
        published_keys,
        jwks_max_age: config.jwks_cache_ttl,
    })
}
