//! Persisted entities: analysis runs, recommendations, execution records.
//!
//! Rows are append-mostly. A recommendation is never mutated after creation;
//! an execution record is written once when it opens and once when it closes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::{ExecutionId, RecommendationId, RunId};
use crate::types::{Encoding, ObjectRef, ObjectType};

// ---------------------------------------------------------------------------
// Scope & analysis runs
// ---------------------------------------------------------------------------

/// Which objects an analysis run looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    /// Schema owner; `None` means every owner the port exposes.
    pub owner: Option<String>,
    /// Empty means all object types.
    pub object_types: Vec<ObjectType>,
    /// Objects smaller than this are skipped.
    pub min_size_bytes: u64,
    pub name_prefix: Option<String>,
}

impl Scope {
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    /// Name/type filter; size is checked separately once metrics are known.
    pub fn admits(&self, object: &ObjectRef) -> bool {
        if let Some(owner) = &self.owner {
            if !owner.eq_ignore_ascii_case(&object.owner) {
                return false;
            }
        }
        if !self.object_types.is_empty() && !self.object_types.contains(&object.object_type) {
            return false;
        }
        match &self.name_prefix {
            Some(prefix) => object
                .name
                .to_ascii_uppercase()
                .starts_with(&prefix.to_ascii_uppercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: RunId,
    /// Globally unique handle, stable across journal replays.
    pub token: Uuid,
    pub strategy: String,
    /// blake3 digest of the strategy definition the run evaluated.
    pub strategy_digest: String,
    pub scope: Scope,
    pub status: RunStatus,
    pub advisor_version: String,
    pub started_ms: u64,
    pub finished_ms: Option<u64>,
    pub objects_analyzed: u64,
    pub objects_failed: u64,
    pub error: Option<String>,
}

/// How a run ended, handed to the store when finalizing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub objects_analyzed: u64,
    pub objects_failed: u64,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Estimator result for one candidate encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRatio {
    pub encoding: Encoding,
    /// `1.0` when the candidate could not be tested.
    pub ratio: f64,
    pub estimated_size_bytes: u64,
    pub tested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Complete,
    /// Analysis timed out or hit an unrecoverable lookup; the row carries the
    /// safe fallbacks (score 0, ratio 1.0, encoding NONE).
    FailedToAnalyze { reason: String },
}

/// Everything the analyzer decided about one object; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDraft {
    pub run_id: RunId,
    pub strategy: String,
    pub object: ObjectRef,
    pub size_bytes: u64,
    pub current_encoding: Encoding,
    pub hotness: f64,
    pub access: f64,
    pub write_ratio: f64,
    pub candidates: Vec<CandidateRatio>,
    pub best_encoding: Encoding,
    pub best_ratio: f64,
    pub encoding: Encoding,
    /// Priority of the strategy rule that fired; `None` for the default table.
    pub matched_rule: Option<u32>,
    pub rationale: String,
    pub projected_size_bytes: u64,
    pub outcome: AnalysisOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub run_id: RunId,
    pub strategy: String,
    pub object: ObjectRef,
    pub size_bytes: u64,
    pub current_encoding: Encoding,
    pub hotness: f64,
    pub access: f64,
    pub write_ratio: f64,
    pub candidates: Vec<CandidateRatio>,
    pub best_encoding: Encoding,
    pub best_ratio: f64,
    pub encoding: Encoding,
    pub matched_rule: Option<u32>,
    pub rationale: String,
    pub projected_size_bytes: u64,
    pub projected_savings_bytes: u64,
    pub savings_pct: f64,
    pub outcome: AnalysisOutcome,
    pub created_ms: u64,
}

/// Coarse execution priority derived from projected savings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl Recommendation {
    pub fn from_draft(id: RecommendationId, draft: RecommendationDraft, created_ms: u64) -> Self {
        let projected = draft.projected_size_bytes.min(draft.size_bytes);
        let savings = draft.size_bytes - projected;
        let savings_pct = if draft.size_bytes == 0 {
            0.0
        } else {
            savings as f64 / draft.size_bytes as f64 * 100.0
        };
        Self {
            id,
            run_id: draft.run_id,
            strategy: draft.strategy,
            object: draft.object,
            size_bytes: draft.size_bytes,
            current_encoding: draft.current_encoding,
            hotness: draft.hotness,
            access: draft.access,
            write_ratio: draft.write_ratio,
            candidates: draft.candidates,
            best_encoding: draft.best_encoding,
            best_ratio: draft.best_ratio,
            encoding: draft.encoding,
            matched_rule: draft.matched_rule,
            rationale: draft.rationale,
            projected_size_bytes: projected,
            projected_savings_bytes: savings,
            savings_pct,
            outcome: draft.outcome,
            created_ms,
        }
    }

    /// Something an operator could actually apply.
    pub fn is_actionable(&self) -> bool {
        !self.encoding.is_none()
            && self.encoding != self.current_encoding
            && self.projected_savings_bytes > 0
            && matches!(self.outcome, AnalysisOutcome::Complete)
    }

    pub fn priority(&self) -> PriorityTier {
        if self.savings_pct >= 50.0 {
            PriorityTier::High
        } else if self.savings_pct >= 25.0 {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// Execution state machine:
/// `PENDING → PRECHECK → (DRY_RUN | APPLYING) → SUCCEEDED | FAILED → (ROLLED_BACK)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecState {
    Pending,
    Precheck,
    DryRun,
    Applying,
    Succeeded,
    Failed,
    RolledBack,
}

impl ExecState {
    pub fn can_transition_to(self, next: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (self, next),
            (Pending, Precheck)
                | (Pending, Failed)
                | (Precheck, DryRun)
                | (Precheck, Applying)
                | (Precheck, Failed)
                | (DryRun, Succeeded)
                | (DryRun, Failed)
                | (Applying, Succeeded)
                | (Applying, Failed)
                | (Failed, RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecState::Succeeded | ExecState::Failed | ExecState::RolledBack
        )
    }
}

impl std::fmt::Display for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecState::Pending => "PENDING",
            ExecState::Precheck => "PRECHECK",
            ExecState::DryRun => "DRY_RUN",
            ExecState::Applying => "APPLYING",
            ExecState::Succeeded => "SUCCEEDED",
            ExecState::Failed => "FAILED",
            ExecState::RolledBack => "ROLLED_BACK",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ExecState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PENDING" => Ok(ExecState::Pending),
            "PRECHECK" => Ok(ExecState::Precheck),
            "DRY_RUN" => Ok(ExecState::DryRun),
            "APPLYING" => Ok(ExecState::Applying),
            "SUCCEEDED" => Ok(ExecState::Succeeded),
            "FAILED" => Ok(ExecState::Failed),
            "ROLLED_BACK" => Ok(ExecState::RolledBack),
            other => Err(crate::error::Error::Config(format!(
                "unknown execution status '{other}'"
            ))),
        }
    }
}

/// What the pipeline knows when it opens an execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDraft {
    pub recommendation_id: RecommendationId,
    pub object: ObjectRef,
    pub statement: String,
    pub statement_digest: String,
    pub dry_run: bool,
    pub online: bool,
    pub encoding_before: Encoding,
    pub encoding_target: Encoding,
    pub size_before_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub recommendation_id: RecommendationId,
    pub object: ObjectRef,
    pub statement: String,
    pub statement_digest: String,
    pub dry_run: bool,
    pub online: bool,
    pub status: ExecState,
    /// Every state the attempt passed through, in order.
    pub path: Vec<ExecState>,
    pub encoding_before: Encoding,
    pub encoding_target: Encoding,
    pub size_before_bytes: u64,
    pub size_after_bytes: Option<u64>,
    pub started_ms: u64,
    pub finished_ms: Option<u64>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Open = not yet finalized. At most one open record per object.
    pub fn is_open(&self) -> bool {
        self.finished_ms.is_none()
    }

    pub fn savings_bytes(&self) -> u64 {
        match (self.status, self.size_after_bytes) {
            (ExecState::Succeeded, Some(after)) => self.size_before_bytes.saturating_sub(after),
            _ => 0,
        }
    }
}

/// Closing facts for an execution record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub status: ExecState,
    pub size_after_bytes: Option<u64>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(size_after_bytes: Option<u64>) -> Self {
        Self {
            status: ExecState::Succeeded,
            size_after_bytes,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ExecState::Failed,
            size_after_bytes: None,
            error: Some(error.into()),
        }
    }

    pub fn rolled_back(error: impl Into<String>) -> Self {
        Self {
            status: ExecState::RolledBack,
            size_after_bytes: None,
            error: Some(error.into()),
        }
    }
}
