//! RAII guard over an open execution record.
//!
//! The pipeline must close every record it opens. If its task is cancelled or
//! bails out with `?` before reaching a terminal state, dropping the lease
//! closes the record as FAILED so no object stays "busy" forever.

use std::sync::Arc;

use tracing::{error, warn};

use strata_core::id::ExecutionId;
use strata_core::model::{ExecState, ExecutionOutcome, ExecutionRecord};
use strata_store::{Store, StoreError};

pub struct ExecutionLease {
    store: Arc<dyn Store>,
    id: ExecutionId,
    closed: bool,
}

impl ExecutionLease {
    pub fn new(store: Arc<dyn Store>, id: ExecutionId) -> Self {
        Self {
            store,
            id,
            closed: false,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn advance(&self, next: ExecState) -> Result<ExecutionRecord, StoreError> {
        self.store.advance(self.id, next)
    }

    /// Close the record; consumes the lease.
    pub fn finish(mut self, outcome: ExecutionOutcome) -> Result<ExecutionRecord, StoreError> {
        self.closed = true;
        self.store.finalize(self.id, outcome)
    }
}

impl Drop for ExecutionLease {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(execution = %self.id, "execution abandoned before completion");
        if let Err(e) = self
            .store
            .finalize(self.id, ExecutionOutcome::failed("execution abandoned"))
        {
            error!(execution = %self.id, error = %e, "could not close abandoned execution");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::id::RecommendationId;
    use strata_core::model::ExecutionDraft;
    use strata_core::types::{Encoding, ObjectRef};
    use strata_store::Ledger;

    fn open(store: &Arc<dyn Store>) -> ExecutionId {
        store
            .begin(ExecutionDraft {
                recommendation_id: RecommendationId::new(1),
                object: ObjectRef::table("APP", "T"),
                statement: "ALTER".into(),
                statement_digest: "d".into(),
                dry_run: false,
                online: false,
                encoding_before: Encoding::None,
                encoding_target: Encoding::Oltp,
                size_before_bytes: 10,
            })
            .unwrap()
            .id
    }

    #[test]
    fn dropped_lease_closes_record() {
        let store: Arc<dyn Store> = Arc::new(Ledger::in_memory());
        let id = open(&store);
        {
            let lease = ExecutionLease::new(store.clone(), id);
            lease.advance(ExecState::Precheck).unwrap();
            lease.advance(ExecState::Applying).unwrap();
        }
        let rec = store.execution(id).unwrap();
        assert_eq!(rec.status, ExecState::Failed);
        assert_eq!(rec.error.as_deref(), Some("execution abandoned"));
        assert!(store.open_execution_for(&rec.object).unwrap().is_none());
    }

    #[test]
    fn finished_lease_leaves_record_alone() {
        let store: Arc<dyn Store> = Arc::new(Ledger::in_memory());
        let id = open(&store);
        let lease = ExecutionLease::new(store.clone(), id);
        lease.advance(ExecState::Precheck).unwrap();
        lease.advance(ExecState::DryRun).unwrap();
        let rec = lease.finish(ExecutionOutcome::succeeded(Some(10))).unwrap();
        assert_eq!(rec.status, ExecState::Succeeded);
        assert_eq!(store.execution(id).unwrap().status, ExecState::Succeeded);
    }
}
