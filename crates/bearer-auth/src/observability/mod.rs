//! Observability for the authentication core.
//!
//! Metrics are recorded through the `metrics` facade; the host service
//! decides which recorder (if any) is installed.

pub mod metrics;
