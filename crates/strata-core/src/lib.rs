#![forbid(unsafe_code)]
//! strata-core: shared vocabulary for the storage tiering advisor.
//!
//! This crate holds the data model (objects, encodings, metrics, analysis runs,
//! recommendations, execution records), the `DatabasePort` trait every other
//! crate talks to the database through, configuration, errors, and stable
//! hashing for audit digests.
//!
//! **No I/O and no async** here. Concrete ports and stores live downstream.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod metrics;
pub mod model;
pub mod port;
pub mod prelude;
pub mod types;

/// Advisor version string recorded on every analysis run.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Milliseconds since Unix epoch (UTC).
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
