//! Auth service end-to-end tests.
//!
//! Spawns the full router on a random port and drives it over HTTP, in
//! local mode, in remote mode against a mocked key-set endpoint, and in a
//! two-node federation where one node validates tokens issued by another.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use auth_service::bootstrap::build_state;
use auth_service::observability::init_metrics_recorder;
use auth_service::routes::{self, AppState};
use auth_test_utils::{fixture_path, MockJwksServer, TestKeypair, TestTokenBuilder};
use bearer_auth::AuthConfig;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
    OnceLock::new();

fn get_test_metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// A running auth service on 127.0.0.1.
struct TestAuthServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _server_handle: JoinHandle<()>,
}

impl TestAuthServer {
    async fn spawn(vars: HashMap<String, String>) -> Result<Self> {
        let config = AuthConfig::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let state = Arc::new(
            build_state(&config).map_err(|e| anyhow::anyhow!("Failed to build state: {}", e))?,
        );

        let app = routes::build_routes(Arc::clone(&state), get_test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let server_handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _server_handle: server_handle,
        })
    }

    /// Issuing node: primary key pair, local verification.
    async fn spawn_local() -> Result<Self> {
        Self::spawn(local_vars()).await
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn issue(&self, subject: &str, claims: Value) -> String {
        let claims: Map<String, Value> = claims.as_object().cloned().unwrap_or_default();
        self.state
            .issuer
            .as_ref()
            .expect("server has no issuer")
            .issue(subject, &claims)
            .unwrap()
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        self._server_handle.abort();
    }
}

fn base_vars() -> HashMap<String, String> {
    HashMap::from([
        ("AUTH_ISSUER".to_string(), "svc-a".to_string()),
        ("AUTH_AUDIENCE".to_string(), "svc-b".to_string()),
        ("AUTH_KEY_ID".to_string(), "primary".to_string()),
    ])
}

fn local_vars() -> HashMap<String, String> {
    let mut vars = base_vars();
    vars.insert(
        "AUTH_PUBLIC_KEY_PATH".to_string(),
        fixture_path("primary.pub.pem").display().to_string(),
    );
    vars.insert(
        "AUTH_PRIVATE_KEY_PATH".to_string(),
        fixture_path("primary.key.pem").display().to_string(),
    );
    vars
}

fn remote_vars(jwks_uri: String) -> HashMap<String, String> {
    let mut vars = base_vars();
    vars.insert("AUTH_JWKS_URI".to_string(), jwks_uri);
    vars.insert("AUTH_JWKS_CONNECT_TIMEOUT_MS".to_string(), "500".to_string());
    vars.insert("AUTH_JWKS_READ_TIMEOUT_MS".to_string(), "500".to_string());
    vars
}

async fn get_me(server: &TestAuthServer, token: Option<&str>) -> Result<reqwest::Response> {
    let mut request = reqwest::Client::new().get(format!("{}/v1/me", server.url()));
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }
    Ok(request.send().await?)
}

async fn validate(server: &TestAuthServer, token: Option<&str>) -> Result<Value> {
    let mut request = reqwest::Client::new().post(format!("{}/v1/auth/validate", server.url()));
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }
    let response = request.send().await?;
    assert_eq!(response.status(), 200);
    Ok(response.json().await?)
}

// =============================================================================
// Local mode
// =============================================================================

#[tokio::test]
async fn test_health_reports_local_mode() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;

    let response = reqwest::get(format!("{}/v1/health", server.url())).await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(
        body,
        json!({"status": "healthy", "mode": "local", "jwks": "n/a"})
    );

    Ok(())
}

#[tokio::test]
async fn test_publishes_local_key() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;
    let keypair = TestKeypair::primary();

    let response = reqwest::get(format!("{}/.well-known/jwks.json", server.url())).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("public, max-age=3600")
    );

    let body: Value = response.json().await?;
    assert_eq!(body, json!({"keys": [keypair.jwk_json()]}));

    Ok(())
}

#[tokio::test]
async fn test_me_requires_authentication() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;

    let response = get_me(&server, None).await?;

    assert_eq!(response.status(), 401);
    let www_auth = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(www_auth.starts_with("Bearer realm="), "got {www_auth:?}");

    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    Ok(())
}

#[tokio::test]
async fn test_me_with_issued_token() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;
    let token = server.issue("u1", json!({"roles": ["user"]}));

    let response = get_me(&server, Some(&token)).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"sub": "u1", "authorities": ["ROLE_user"]}));

    Ok(())
}

#[tokio::test]
async fn test_me_rejects_invalid_tokens() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;
    let keypair = TestKeypair::primary();

    let tokens = [
        TestTokenBuilder::new().expires_in(-3600).sign(&keypair),
        TestTokenBuilder::new().for_audience("svc-z").sign(&keypair),
        TestTokenBuilder::new().sign(&TestKeypair::rotated_with_kid("primary")),
        TestTokenBuilder::new().without_claim("sub").sign(&keypair),
        "a".repeat(9000),
    ];

    for token in &tokens {
        let response = get_me(&server, Some(token)).await?;
        assert_eq!(response.status(), 401);
    }

    Ok(())
}

#[tokio::test]
async fn test_validate_endpoint() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;
    let keypair = TestKeypair::primary();

    let valid = server.issue("u1", json!({}));
    assert_eq!(
        validate(&server, Some(&valid)).await?,
        json!({"valid": true, "reason": null})
    );

    let expired = TestTokenBuilder::new().expires_in(-3600).sign(&keypair);
    assert_eq!(
        validate(&server, Some(&expired)).await?,
        json!({"valid": false, "reason": "expired"})
    );

    let unknown = TestTokenBuilder::new().sign(&TestKeypair::rotated());
    assert_eq!(
        validate(&server, Some(&unknown)).await?,
        json!({"valid": false, "reason": "unknown_key"})
    );

    assert_eq!(
        validate(&server, None).await?,
        json!({"valid": false, "reason": "missing_token"})
    );

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let server = TestAuthServer::spawn_local().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

// =============================================================================
// Remote mode
// =============================================================================

#[tokio::test]
async fn test_remote_mode_against_mock_key_set() -> Result<()> {
    let keypair = TestKeypair::primary();
    let jwks = MockJwksServer::start().await;
    jwks.serve_keys(&[&keypair]).await;

    let server = TestAuthServer::spawn(remote_vars(jwks.jwks_uri())).await?;

    let health: Value = reqwest::get(format!("{}/v1/health", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(health["mode"], "remote");
    assert_eq!(health["jwks"], "empty");

    let token = TestTokenBuilder::new()
        .for_subject("alice")
        .with_roles(&["admin"])
        .sign(&keypair);
    let response = get_me(&server, Some(&token)).await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"sub": "alice", "authorities": ["ROLE_admin"]}));

    let health: Value = reqwest::get(format!("{}/v1/health", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(health["jwks"], "fresh");

    // Remote-only node holds no key to publish
    let response = reqwest::get(format!("{}/.well-known/jwks.json", server.url())).await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

#[tokio::test]
async fn test_remote_mode_key_source_outage_fails_closed() -> Result<()> {
    let jwks = MockJwksServer::start().await;
    jwks.serve_status(503).await;

    let server = TestAuthServer::spawn(remote_vars(jwks.jwks_uri())).await?;
    let token = TestTokenBuilder::new().sign(&TestKeypair::primary());

    assert_eq!(get_me(&server, Some(&token)).await?.status(), 401);
    assert_eq!(
        validate(&server, Some(&token)).await?,
        json!({"valid": false, "reason": "key_source_unavailable"})
    );

    Ok(())
}

#[tokio::test]
async fn test_federation_between_two_nodes() -> Result<()> {
    // Node A issues tokens and publishes its key
    let issuer_node = TestAuthServer::spawn_local().await?;

    // Node B validates against node A's published key set
    let verifier_node = TestAuthServer::spawn(remote_vars(format!(
        "{}/.well-known/jwks.json",
        issuer_node.url()
    )))
    .await?;

    let token = issuer_node.issue("u1", json!({"roles": ["user"], "tenant": "acme"}));

    let response = get_me(&verifier_node, Some(&token)).await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["sub"], "u1");
    assert_eq!(body["authorities"], json!(["ROLE_user"]));

    Ok(())
}

// =============================================================================
// Disabled
// =============================================================================

#[tokio::test]
async fn test_disabled_authentication() -> Result<()> {
    let mut vars = base_vars();
    vars.insert("AUTH_ENABLED".to_string(), "false".to_string());
    let server = TestAuthServer::spawn(vars).await?;

    let health: Value = reqwest::get(format!("{}/v1/health", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(health["mode"], "disabled");

    // No gate, so no principal is ever attached
    let token = TestTokenBuilder::new().sign(&TestKeypair::primary());
    assert_eq!(get_me(&server, Some(&token)).await?.status(), 401);

    // Nothing to validate against
    let response = reqwest::Client::new()
        .post(format!("{}/v1/auth/validate", server.url()))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await?;
    assert_eq!(response.status(), 503);

    Ok(())
}
