//! Remote Key-Set Client.
//!
//! Fetches a published JWK set and caches it with a configurable TTL.
//!
//! # Concurrency
//!
//! - The cached [`RemoteKeySet`] lives in an [`ArcSwapOption`]; readers never
//!   lock and always observe a complete set (replace-on-write).
//! - Cache misses are single-flight: the first caller starts the fetch and
//!   stores it as a shared future; concurrent callers await that same future
//!   and observe the same success or failure.
//! - A failed fetch is never cached and never turns into an empty key set.

use crate::errors::FetchError;
use crate::keys::KeyMaterial;
use crate::observability::metrics::{record_jwks_cache, record_jwks_fetch};
use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Default cache TTL (1 hour).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default connect and read timeouts.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON Web Key as published or consumed at a key-set endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Jwk {
    /// Key type (`RSA` for every key this crate uses).
    pub kty: String,

    /// Key ID - selects the verification key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key use (`sig`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm (`RS256`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Publishable JWK for local key material.
    pub fn from_key_material(material: &KeyMaterial) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: Some(material.key_id().to_string()),
            key_use: Some("sig".to_string()),
            alg: Some("RS256".to_string()),
            n: Some(material.modulus_b64()),
            e: Some(material.exponent_b64()),
        }
    }
}

/// JWK set document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A fetched key set. Never mutated; a refresh swaps in a new one.
#[derive(Debug)]
pub struct RemoteKeySet {
    source_uri: String,
    keys: Vec<Arc<KeyMaterial>>,
    fetched_at: Instant,
    ttl: Duration,
}

impl RemoteKeySet {
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Keys in the order the endpoint listed them.
    pub fn keys(&self) -> &[Arc<KeyMaterial>] {
        &self.keys
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// First key whose id equals `kid`.
    pub fn find(&self, kid: &str) -> Option<&Arc<KeyMaterial>> {
        self.keys.iter().find(|k| k.key_id() == kid)
    }

    pub fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// Cache state, reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Stale,
    Empty,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::Empty => "empty",
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<RemoteKeySet>, FetchError>>>;

struct Inner {
    source_uri: String,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    cache: ArcSwapOption<RemoteKeySet>,
    in_flight: Mutex<Option<SharedFetch>>,
}

/// Client for one key-set URI. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct JwksClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksClient")
            .field("source_uri", &self.inner.source_uri)
            .field("cache_ttl", &self.inner.cache_ttl)
            .field("cache_status", &self.cache_status())
            .finish()
    }
}

impl JwksClient {
    /// Create a client with default TTL and timeouts.
    pub fn new(source_uri: String) -> Self {
        Self::with_settings(source_uri, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom cache TTL.
    pub fn with_ttl(source_uri: String, cache_ttl: Duration) -> Self {
        Self::with_settings(source_uri, cache_ttl, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT)
    }

    /// Create a client with explicit TTL and network timeouts.
    ///
    /// The read timeout bounds the remainder of the exchange after connecting,
    /// so the overall request budget is `connect_timeout + read_timeout`.
    pub fn with_settings(
        source_uri: String,
        cache_ttl: Duration,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout.saturating_add(read_timeout))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            inner: Arc::new(Inner {
                source_uri,
                http_client,
                cache_ttl,
                cache: ArcSwapOption::empty(),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn source_uri(&self) -> &str {
        &self.inner.source_uri
    }

    /// Current key set, fetched if the cache is empty or expired.
    ///
    /// # Errors
    ///
    /// The [`FetchError`] of the (possibly shared) fetch.
    #[instrument(skip_all, fields(uri = %self.inner.source_uri))]
    pub async fn get_key_set(&self) -> Result<Arc<RemoteKeySet>, FetchError> {
        if let Some(cached) = self.fresh_cached() {
            record_jwks_cache("hit");
            return Ok(cached);
        }
        record_jwks_cache("miss");

        let fetch = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.as_ref().filter(|f| f.peek().is_none()) {
                Some(pending) => {
                    tracing::debug!(target: "auth.jwks", "Joining in-flight key-set fetch");
                    pending.clone()
                }
                None => {
                    // Another caller may have completed a fetch while we waited
                    if let Some(cached) = self.fresh_cached() {
                        return Ok(cached);
                    }
                    let inner = Arc::clone(&self.inner);
                    let fetch = async move { inner.fetch().await }.boxed().shared();
                    *in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight.as_ref().is_some_and(|f| f.ptr_eq(&fetch)) {
            *in_flight = None;
        }

        result
    }

    /// Drop the cached key set so the next [`Self::get_key_set`] fetches.
    pub fn refresh(&self) {
        tracing::debug!(target: "auth.jwks", uri = %self.inner.source_uri, "Key-set cache invalidated");
        self.inner.cache.store(None);
    }

    /// Drop the cached key set only if it is still `seen`.
    ///
    /// Lets many callers that missed a key in the same set trigger a single
    /// refetch instead of each wiping whatever the previous one fetched.
    pub fn refresh_if_current(&self, seen: &Arc<RemoteKeySet>) {
        let expected = Some(Arc::clone(seen));
        let previous = self
            .inner
            .cache
            .compare_and_swap(&expected, None::<Arc<RemoteKeySet>>);
        let swapped = match &*previous {
            Some(p) => Arc::ptr_eq(p, seen),
            None => false,
        };
        if swapped {
            tracing::debug!(target: "auth.jwks", uri = %self.inner.source_uri, "Key-set cache invalidated");
        }
    }

    /// Fresh, stale or empty.
    pub fn cache_status(&self) -> CacheStatus {
        match self.inner.cache.load_full() {
            Some(set) if set.is_fresh() => CacheStatus::Fresh,
            Some(_) => CacheStatus::Stale,
            None => CacheStatus::Empty,
        }
    }

    /// Fetch the key set once in the background after `delay`.
    ///
    /// The first real request does not depend on this completing; it goes
    /// through the same single-flight path.
    pub fn spawn_preload(&self, delay: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match client.get_key_set().await {
                Ok(set) => tracing::info!(
                    target: "auth.jwks",
                    key_count = set.keys().len(),
                    "Key set preloaded"
                ),
                Err(e) => tracing::warn!(
                    target: "auth.jwks",
                    error = %e,
                    "Key-set preload failed; will retry on first use"
                ),
            }
        })
    }

    fn fresh_cached(&self) -> Option<Arc<RemoteKeySet>> {
        self.inner.cache.load_full().filter(|set| set.is_fresh())
    }
}

impl Inner {
    /// Perform one network fetch and, on success, swap the result into the cache.
    async fn fetch(&self) -> Result<Arc<RemoteKeySet>, FetchError> {
        let result = self.fetch_uncached().await;
        match &result {
            Ok(set) => {
                record_jwks_fetch("success");
                self.cache.store(Some(Arc::clone(set)));
                tracing::info!(
                    target: "auth.jwks",
                    key_count = set.keys().len(),
                    "Key-set cache refreshed"
                );
            }
            Err(e) => {
                record_jwks_fetch("error");
                tracing::error!(target: "auth.jwks", error = %e, "Failed to fetch key set");
            }
        }
        result
    }

    async fn fetch_uncached(&self) -> Result<Arc<RemoteKeySet>, FetchError> {
        tracing::debug!(target: "auth.jwks", uri = %self.source_uri, "Fetching key set");

        let response = self
            .http_client
            .get(&self.source_uri)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let jwks: JwkSet =
            serde_json::from_slice(&body).map_err(|e| FetchError::InvalidBody(e.to_string()))?;

        let keys: Vec<Arc<KeyMaterial>> = jwks
            .keys
            .iter()
            .filter_map(usable_key)
            .map(Arc::new)
            .collect();

        if keys.is_empty() {
            return Err(FetchError::EmptyKeySet);
        }

        Ok(Arc::new(RemoteKeySet {
            source_uri: self.source_uri.clone(),
            keys,
            fetched_at: Instant::now(),
            ttl: self.cache_ttl,
        }))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e.to_string())
    }
}

/// Convert a JWK into verification key material, skipping keys this crate
/// cannot use for RS256 signature verification.
fn usable_key(jwk: &Jwk) -> Option<KeyMaterial> {
    let Some(kid) = jwk.kid.as_deref() else {
        tracing::warn!(target: "auth.jwks", "Skipping JWK without kid");
        return None;
    };

    if jwk.kty != "RSA" {
        tracing::warn!(target: "auth.jwks", kid = %kid, kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }
    if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
        tracing::warn!(target: "auth.jwks", kid = %kid, "Skipping JWK not intended for signatures");
        return None;
    }
    if jwk.alg.as_deref().is_some_and(|a| a != "RS256") {
        tracing::warn!(target: "auth.jwks", kid = %kid, "Skipping JWK with unexpected algorithm");
        return None;
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::warn!(target: "auth.jwks", kid = %kid, "Skipping JWK missing modulus or exponent");
        return None;
    };

    KeyMaterial::from_components(kid.to_string(), n, e)
        .map_err(|err| {
            tracing::warn!(target: "auth.jwks", kid = %kid, error = %err, "Skipping unusable JWK");
        })
        .ok()
}
