#![forbid(unsafe_code)]
//! strata-exec: the advisor runtime.
//!
//! - `analysis`: per-object scoring, estimation, and rule evaluation, run on a
//!   bounded worker pool with a per-object timeout
//! - `pipeline`: PENDING → PRECHECK → DRY_RUN | APPLYING → terminal, with
//!   rollback on failure or timeout
//! - `lease`: closes an execution record if its task goes away mid-flight
//! - `batch`: priority-ordered execution of many recommendations
//! - `stats`: estate-wide and per-object reports
//! - `runtime`: the `Advisor` facade every caller operation goes through

pub mod analysis;
pub mod batch;
pub mod error;
pub mod lease;
pub mod pipeline;
pub mod runtime;
pub mod stats;

pub use analysis::{RunSummary, StrategyComparison};
pub use batch::{BatchItem, BatchOptions, BatchSummary};
pub use error::{AdvisorError, Result};
pub use pipeline::ExecuteOptions;
pub use runtime::Advisor;
pub use stats::TableStatistics;
