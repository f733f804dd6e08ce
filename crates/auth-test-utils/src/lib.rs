//! # Auth Test Utilities
//!
//! Shared test utilities for the bearer-auth crates.
//!
//! This crate provides:
//! - Fixed RSA-2048 key fixtures (two key generations: `primary`, `rotated`)
//! - `TestTokenBuilder` for signing arbitrary, including invalid, tokens
//! - `MockJwksServer`, a wiremock-backed key-set endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::primary();
//!     let jwks = MockJwksServer::start().await;
//!     jwks.serve_keys(&[&keypair]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_subject("alice")
//!         .with_roles(&["admin"])
//!         .sign(&keypair);
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use token_builders::*;
