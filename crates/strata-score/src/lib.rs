#![forbid(unsafe_code)]
//! strata-score: turns raw engine facts into comparable signals.
//!
//! - `collector`: fetch metrics + counters for one object, never failing the
//!   object because a counter lookup failed
//! - `scoring`: logarithmic 0..100 hotness/access scores
//! - `estimator`: per-encoding ratio probes with a `1.0` fallback
//!
//! Everything here is synchronous; the exec crate decides how many objects
//! are in flight.

pub mod collector;
pub mod estimator;
pub mod scoring;

pub use collector::{Collector, ObjectSignals};
pub use estimator::{EstimateReport, Estimator};
pub use scoring::{access_label, hotness_label, log_score, Score, ScoreSource, Scorer};
