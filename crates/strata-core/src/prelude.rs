//! Convenient re-exports for downstream crates.

pub use crate::config::AdvisorConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{ExecutionId, RecommendationId, RunId};
pub use crate::metrics::{ObjectMetrics, RatioEstimate, ReadCounters, WriteCounters};
pub use crate::model::{
    AnalysisOutcome, AnalysisRun, CandidateRatio, ExecState, ExecutionDraft, ExecutionOutcome,
    ExecutionRecord, PriorityTier, Recommendation, RecommendationDraft, RunCompletion, RunStatus,
    Scope,
};
pub use crate::port::{DatabasePort, PortError, Statement};
pub use crate::types::{Encoding, ObjectRef, ObjectType};
