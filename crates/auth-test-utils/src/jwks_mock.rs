//! Mock remote key-set endpoint backed by wiremock.
//!
//! # Example
//!
//! ```rust,ignore
//! let jwks = MockJwksServer::start().await;
//! jwks.serve_keys(&[&TestKeypair::primary()]).await;
//! let client = JwksClient::new(jwks.jwks_uri())?;
//! ```

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Wiremock server publishing a key set at [`JWKS_PATH`].
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server with nothing mounted (every request gets 404).
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Full key-set URL.
    pub fn jwks_uri(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve a key set containing `keypairs`.
    pub async fn serve_keys(&self, keypairs: &[&TestKeypair]) {
        self.mount(ResponseTemplate::new(200).set_body_json(jwks_json(keypairs)), None)
            .await;
    }

    /// Serve `keypairs` and verify on drop that exactly `times` fetches happened.
    pub async fn serve_keys_expecting(&self, keypairs: &[&TestKeypair], times: u64) {
        self.mount(
            ResponseTemplate::new(200).set_body_json(jwks_json(keypairs)),
            Some(times),
        )
        .await;
    }

    /// Serve `keypairs` after `delay`, to keep a fetch in flight.
    pub async fn serve_keys_with_delay(
        &self,
        keypairs: &[&TestKeypair],
        delay: Duration,
        expected_fetches: Option<u64>,
    ) {
        self.mount(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json(keypairs))
                .set_delay(delay),
            expected_fetches,
        )
        .await;
    }

    /// Answer every fetch with `status` and an empty body.
    pub async fn serve_status(&self, status: u16) {
        self.mount(ResponseTemplate::new(status), None).await;
    }

    /// Answer every fetch with `status` after `delay`.
    pub async fn serve_status_with_delay(&self, status: u16, delay: Duration) {
        self.mount(ResponseTemplate::new(status).set_delay(delay), None)
            .await;
    }

    /// Answer with a raw 200 body, for malformed-document tests.
    pub async fn serve_body(&self, body: &str) {
        self.mount(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(body),
            None,
        )
        .await;
    }

    /// Serve an arbitrary JSON document.
    pub async fn serve_json(&self, document: serde_json::Value) {
        self.mount(ResponseTemplate::new(200).set_body_json(document), None)
            .await;
    }

    /// Remove all mounted responses and forget recorded requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of key-set requests received so far.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }

    async fn mount(&self, response: ResponseTemplate, expected: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response);
        let mock = match expected {
            Some(times) => mock.expect(times),
            None => mock,
        };
        mock.mount(&self.server).await;
    }
}
