//! Token Minting Tool
//!
//! Issues a signed token with the same `AUTH_*` configuration the service
//! uses, for manual testing and service bootstrap.
//!
//! Usage:
//!   AUTH_PUBLIC_KEY_PATH=pub.pem AUTH_PRIVATE_KEY_PATH=key.pem \
//!   AUTH_ISSUER=svc-a AUTH_AUDIENCE=svc-b AUTH_KEY_ID=k1 \
//!     mint-token --subject u1 --claims '{"roles":["user"]}'

use anyhow::{bail, Context, Result};
use bearer_auth::{AuthConfig, KeyMaterial, TokenIssuer};
use clap::Parser;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Issue a signed bearer token
#[derive(Parser, Debug)]
#[command(name = "mint-token")]
#[command(about = "Issue an RS256 bearer token using the AUTH_* environment")]
struct Cli {
    /// Subject (`sub`) of the token
    #[arg(short, long)]
    subject: String,

    /// Custom claims as a JSON object, e.g. '{"roles":["user"]}'
    #[arg(short, long)]
    claims: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AuthConfig::from_env().context("Failed to load AUTH_* configuration")?;
    if !config.issuance_enabled() {
        bail!("AUTH_PRIVATE_KEY_PATH must be set to issue tokens");
    }

    let claims = parse_claims(cli.claims.as_deref())?;

    let key = Arc::new(KeyMaterial::load(&config).context("Failed to load key material")?);
    let issuer = TokenIssuer::new(key, Arc::new(config.signing.clone()))
        .context("Failed to initialize issuer")?;

    let token = issuer
        .issue(&cli.subject, &claims)
        .context("Failed to issue token")?;

    println!("{token}");
    Ok(())
}

fn parse_claims(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw).context("--claims is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("--claims must be a JSON object, got {}", json_type(&other)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
