//! Shared setup for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use strata_core::config::AdvisorConfig;
use strata_core::metrics::{ObjectMetrics, RatioEstimate, WriteCounters};
use strata_core::id::{ExecutionId, RecommendationId, RunId};
use strata_core::model::{
    AnalysisRun, ExecState, ExecutionDraft, ExecutionOutcome, ExecutionRecord, Recommendation,
    RecommendationDraft, RunCompletion, Scope,
};
use strata_core::port::{DatabasePort, PortError, Statement};
use strata_core::types::{Encoding, ObjectRef};
use strata_exec::Advisor;
use strata_rules::StrategyBook;
use strata_store::{
    ExecutionStore, HistoryFilter, Ledger, MemoryCatalog, RecommendationFilter, RecommendationStore, RunStore,
    Store, StoreError,
};

pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;

/// Config that analyzes objects of any size.
pub fn config() -> AdvisorConfig {
    AdvisorConfig {
        min_object_size_bytes: 0,
        ..AdvisorConfig::default()
    }
}

pub fn advisor(cat: &MemoryCatalog) -> Advisor {
    advisor_with(Arc::new(cat.clone()), config(), Arc::new(Ledger::in_memory()))
}

pub fn advisor_with(port: Arc<dyn DatabasePort>, cfg: AdvisorConfig, store: Arc<dyn Store>) -> Advisor {
    Advisor::new(cfg, port, store, Arc::new(StrategyBook::with_builtins())).unwrap()
}

pub fn scope() -> Scope {
    Scope::owner("APP")
}

/// Delegates to a catalog but panics on metrics lookups for objects whose
/// name starts with `BAD`.
pub struct PanickingPort {
    pub inner: MemoryCatalog,
}

impl DatabasePort for PanickingPort {
    fn list_objects(&self, scope: &Scope) -> Result<Vec<ObjectRef>, PortError> {
        self.inner.list_objects(scope)
    }

    fn object_metrics(&self, object: &ObjectRef) -> Result<Option<ObjectMetrics>, PortError> {
        if object.name.starts_with("BAD") {
            panic!("driver crashed reading {object}");
        }
        self.inner.object_metrics(object)
    }

    fn modification_counters(
        &self,
        object: &ObjectRef,
        window: Duration,
    ) -> Result<Option<WriteCounters>, PortError> {
        self.inner.modification_counters(object, window)
    }

    fn estimate_ratio(
        &self,
        object: &ObjectRef,
        encoding: Encoding,
        sample_rows: u64,
    ) -> Result<RatioEstimate, PortError> {
        self.inner.estimate_ratio(object, encoding, sample_rows)
    }

    fn execute_statement(&self, statement: &Statement) -> Result<(), PortError> {
        self.inner.execute_statement(statement)
    }

    fn rollback(&self, statement: &Statement) -> Result<(), PortError> {
        self.inner.rollback(statement)
    }

    fn conflicting_lock(&self, object: &ObjectRef) -> Result<Option<String>, PortError> {
        self.inner.conflicting_lock(object)
    }

    fn free_space_bytes(&self, storage_area: &str) -> Result<u64, PortError> {
        self.inner.free_space_bytes(storage_area)
    }
}

/// A ledger whose recommendation inserts fail, as on a full disk.
pub struct FullDiskStore {
    pub inner: Ledger,
}

impl RunStore for FullDiskStore {
    fn create_run(&self, strategy: &str, strategy_digest: &str, scope: &Scope) -> Result<AnalysisRun, StoreError> {
        self.inner.create_run(strategy, strategy_digest, scope)
    }

    fn finish_run(&self, id: RunId, completion: RunCompletion) -> Result<AnalysisRun, StoreError> {
        self.inner.finish_run(id, completion)
    }

    fn run(&self, id: RunId) -> Result<AnalysisRun, StoreError> {
        self.inner.run(id)
    }

    fn latest_run(&self) -> Result<Option<AnalysisRun>, StoreError> {
        self.inner.latest_run()
    }

    fn runs(&self) -> Result<Vec<AnalysisRun>, StoreError> {
        self.inner.runs()
    }
}

impl RecommendationStore for FullDiskStore {
    fn insert_recommendation(&self, _draft: RecommendationDraft) -> Result<Recommendation, StoreError> {
        Err(StoreError::Io(std::io::Error::other("no space left on device")))
    }

    fn recommendation(&self, id: RecommendationId) -> Result<Recommendation, StoreError> {
        self.inner.recommendation(id)
    }

    fn query(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>, StoreError> {
        self.inner.query(filter)
    }
}

impl ExecutionStore for FullDiskStore {
    fn begin(&self, draft: ExecutionDraft) -> Result<ExecutionRecord, StoreError> {
        self.inner.begin(draft)
    }

    fn advance(&self, id: ExecutionId, next: ExecState) -> Result<ExecutionRecord, StoreError> {
        self.inner.advance(id, next)
    }

    fn finalize(&self, id: ExecutionId, outcome: ExecutionOutcome) -> Result<ExecutionRecord, StoreError> {
        self.inner.finalize(id, outcome)
    }

    fn execution(&self, id: ExecutionId) -> Result<ExecutionRecord, StoreError> {
        self.inner.execution(id)
    }

    fn open_execution_for(&self, object: &ObjectRef) -> Result<Option<ExecutionRecord>, StoreError> {
        self.inner.open_execution_for(object)
    }

    fn history(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.inner.history(filter)
    }
}

/// Delegates to a catalog but stalls metrics lookups for objects whose name
/// starts with `SLOW`.
pub struct StallingPort {
    pub inner: MemoryCatalog,
    pub stall: Duration,
}

impl DatabasePort for StallingPort {
    fn list_objects(&self, scope: &Scope) -> Result<Vec<ObjectRef>, PortError> {
        self.inner.list_objects(scope)
    }

    fn object_metrics(&self, object: &ObjectRef) -> Result<Option<ObjectMetrics>, PortError> {
        if object.name.starts_with("SLOW") {
            std::thread::sleep(self.stall);
        }
        self.inner.object_metrics(object)
    }

    fn modification_counters(
        &self,
        object: &ObjectRef,
        window: Duration,
    ) -> Result<Option<WriteCounters>, PortError> {
        self.inner.modification_counters(object, window)
    }

    fn estimate_ratio(
        &self,
        object: &ObjectRef,
        encoding: Encoding,
        sample_rows: u64,
    ) -> Result<RatioEstimate, PortError> {
        self.inner.estimate_ratio(object, encoding, sample_rows)
    }

    fn execute_statement(&self, statement: &Statement) -> Result<(), PortError> {
        self.inner.execute_statement(statement)
    }

    fn rollback(&self, statement: &Statement) -> Result<(), PortError> {
        self.inner.rollback(statement)
    }

    fn conflicting_lock(&self, object: &ObjectRef) -> Result<Option<String>, PortError> {
        self.inner.conflicting_lock(object)
    }

    fn free_space_bytes(&self, storage_area: &str) -> Result<u64, PortError> {
        self.inner.free_space_bytes(storage_area)
    }
}
