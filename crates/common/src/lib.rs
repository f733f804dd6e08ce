//! Common utilities shared by the bearer-auth crates.

#![warn(clippy::pedantic)]

/// Module for compact-token wire helpers (splitting, size limits, time windows)
pub mod jwt;

/// Module for PEM document decoding
pub mod pem;
