//! Auth Service Library
//!
//! HTTP surface and composition root for the `bearer-auth` core:
//!
//! - Publishes the node's public key as a JWK set
//! - Validates presented tokens on request
//! - Runs the authentication gate in front of every route
//!
//! # Architecture
//!
//! ```text
//! main.rs -> config -> bootstrap (keys, validator, issuer, gate) -> routes -> handlers
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `bootstrap` - Builds the shared state from configuration
//! - `extractors` - Handler-side authorization
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
