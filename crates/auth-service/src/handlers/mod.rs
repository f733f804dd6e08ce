//! HTTP request handlers for the auth service.

pub mod health;
pub mod jwks;
pub mod me;
pub mod metrics;
pub mod validate;

pub use health::health_check;
pub use jwks::publish_jwks;
pub use me::get_me;
pub use metrics::metrics_handler;
pub use validate::validate_token;
