//! Abstract interface to the database engine.
//!
//! Concrete adapters live outside this crate (`strata-store` ships an
//! in-memory `MemoryCatalog`). We keep only the trait here so every crate can
//! depend on the API without pulling a driver.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{ObjectMetrics, RatioEstimate, WriteCounters};
use crate::model::Scope;
use crate::types::{Encoding, ObjectRef};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PortError {
    #[error("feature not supported: {0}")]
    Unsupported(String),

    #[error("insufficient privilege: {0}")]
    Privilege(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("statement failed: {0}")]
    Statement(String),

    /// The engine cannot be reached at all. Aborts the current run.
    #[error("database unreachable: {0}")]
    Unreachable(String),
}

impl PortError {
    pub fn is_systemic(&self) -> bool {
        matches!(self, PortError::Unreachable(_))
    }
}

/// A generated storage-change statement, as handed to the engine.
///
/// Real adapters only need `text`; the structured fields let simulated
/// engines apply the change without parsing DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub text: String,
    pub target: ObjectRef,
    pub encoding: Encoding,
}

/// The database engine as seen by the advisor.
///
/// Implementations must be usable from several worker threads at once.
pub trait DatabasePort: Send + Sync + 'static {
    /// Candidate objects for a scope (size filtering happens in the analyzer).
    fn list_objects(&self, scope: &Scope) -> Result<Vec<ObjectRef>, PortError>;

    /// `getObjectMetrics`. `Ok(None)` means the object does not exist.
    fn object_metrics(&self, object: &ObjectRef) -> Result<Option<ObjectMetrics>, PortError>;

    /// `listModificationCounters` over the trailing `window`.
    /// `Ok(None)` means monitoring has no data for the object yet.
    fn modification_counters(
        &self,
        object: &ObjectRef,
        window: Duration,
    ) -> Result<Option<WriteCounters>, PortError>;

    /// `estimateCompressionRatio` on a bounded sample. May fail per encoding.
    fn estimate_ratio(
        &self,
        object: &ObjectRef,
        encoding: Encoding,
        sample_rows: u64,
    ) -> Result<RatioEstimate, PortError>;

    /// `executeStatement`; transactional at the statement level.
    fn execute_statement(&self, statement: &Statement) -> Result<(), PortError>;

    /// Discard whatever `statement` left behind. Must be safe to call when
    /// nothing is pending and while the statement is still running.
    fn rollback(&self, statement: &Statement) -> Result<(), PortError>;

    /// Session holding a lock that would block a storage change, if any.
    fn conflicting_lock(&self, object: &ObjectRef) -> Result<Option<String>, PortError>;

    /// Free bytes left in a storage area (tablespace).
    fn free_space_bytes(&self, storage_area: &str) -> Result<u64, PortError>;
}
