//! Storage seams. Everything the advisor persists goes through these.

use strata_core::id::{ExecutionId, RecommendationId, RunId};
use strata_core::model::{
    AnalysisRun, ExecState, ExecutionDraft, ExecutionOutcome, ExecutionRecord, Recommendation,
    RecommendationDraft, RunCompletion, Scope,
};
use strata_core::types::ObjectRef;

use crate::error::Result;
use crate::filter::{
    compression_statistics, savings_by_strategy, CompressionStatistics, HistoryFilter, RecommendationFilter,
    StrategySavings,
};

pub trait RunStore: Send + Sync {
    fn create_run(&self, strategy: &str, strategy_digest: &str, scope: &Scope) -> Result<AnalysisRun>;
    fn finish_run(&self, id: RunId, completion: RunCompletion) -> Result<AnalysisRun>;
    fn run(&self, id: RunId) -> Result<AnalysisRun>;
    /// Most recently started run, finished or not.
    fn latest_run(&self) -> Result<Option<AnalysisRun>>;
    fn runs(&self) -> Result<Vec<AnalysisRun>>;
}

/// Append-only: recommendations are never updated or deleted.
pub trait RecommendationStore: Send + Sync {
    fn insert_recommendation(&self, draft: RecommendationDraft) -> Result<Recommendation>;
    fn recommendation(&self, id: RecommendationId) -> Result<Recommendation>;
    /// Filtered and ordered by projected savings, then savings percentage.
    fn query(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>>;

    /// Sum of projected savings over a filtered listing.
    fn total_projected_savings(&self, filter: &RecommendationFilter) -> Result<u64> {
        Ok(self
            .query(filter)?
            .iter()
            .map(|r| r.projected_savings_bytes)
            .fold(0u64, u64::saturating_add))
    }

    /// Per-strategy statistics over the latest actionable recommendations.
    fn savings_by_strategy(&self) -> Result<Vec<StrategySavings>> {
        let rows = self.query(&RecommendationFilter {
            limit: None,
            ..RecommendationFilter::default()
        })?;
        Ok(savings_by_strategy(&rows))
    }

    /// Estate-wide totals over every object's newest recommendation.
    fn compression_statistics(&self) -> Result<CompressionStatistics> {
        let rows = self.query(&RecommendationFilter::all())?;
        Ok(compression_statistics(&rows))
    }
}

pub trait ExecutionStore: Send + Sync {
    /// Open a record in `PENDING`.
    ///
    /// If the object already has an open record, the new attempt is recorded
    /// as an immediately closed `FAILED` record instead. The check and the
    /// insert are one atomic step.
    fn begin(&self, draft: ExecutionDraft) -> Result<ExecutionRecord>;
    /// Move an open record along the state machine.
    fn advance(&self, id: ExecutionId, next: ExecState) -> Result<ExecutionRecord>;
    /// Close a record. Closing twice is an error.
    fn finalize(&self, id: ExecutionId, outcome: ExecutionOutcome) -> Result<ExecutionRecord>;
    fn execution(&self, id: ExecutionId) -> Result<ExecutionRecord>;
    fn open_execution_for(&self, object: &ObjectRef) -> Result<Option<ExecutionRecord>>;
    /// Newest first.
    fn history(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionRecord>>;
}

/// Everything the advisor persists, behind one handle.
pub trait Store: RunStore + RecommendationStore + ExecutionStore {}

impl<T: RunStore + RecommendationStore + ExecutionStore> Store for T {}
