//! In-memory record store with an optional JSONL journal.
//!
//! All three record families share one lock so "is there an open execution
//! for this object?" and "open one" happen as a single step.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};
use uuid::Uuid;

use strata_core::id::{ExecutionId, RecommendationId, RunId};
use strata_core::model::{
    AnalysisRun, ExecState, ExecutionDraft, ExecutionOutcome, ExecutionRecord, Recommendation,
    RecommendationDraft, RunCompletion, RunStatus, Scope,
};
use strata_core::now_millis;
use strata_core::types::ObjectRef;

use crate::error::{Result, StoreError};
use crate::filter::{HistoryFilter, RecommendationFilter};
use crate::journal::{Event, Journal};
use crate::traits::{ExecutionStore, RecommendationStore, RunStore};

#[derive(Default)]
struct State {
    last_run: u64,
    last_rec: u64,
    last_exec: u64,
    runs: BTreeMap<RunId, AnalysisRun>,
    recs: BTreeMap<RecommendationId, Recommendation>,
    execs: BTreeMap<ExecutionId, ExecutionRecord>,
    open_by_object: HashMap<String, ExecutionId>,
    journal: Option<Journal>,
}

impl State {
    fn record(&mut self, event: Event) -> Result<()> {
        if let Some(j) = self.journal.as_mut() {
            j.append(&event)?;
        }
        Ok(())
    }

    fn replay(&mut self, event: Event) {
        match event {
            Event::Run(run) => {
                self.last_run = self.last_run.max(run.id.get());
                self.runs.insert(run.id, run);
            }
            Event::Recommendation(rec) => {
                self.last_rec = self.last_rec.max(rec.id.get());
                self.recs.insert(rec.id, rec);
            }
            Event::Execution(rec) => {
                self.last_exec = self.last_exec.max(rec.id.get());
                if rec.is_open() {
                    self.open_by_object.insert(rec.object.key(), rec.id);
                } else if self.open_by_object.get(&rec.object.key()) == Some(&rec.id) {
                    self.open_by_object.remove(&rec.object.key());
                }
                self.execs.insert(rec.id, rec);
            }
        }
    }

    /// Close whatever a previous process left half-done.
    fn recover(&mut self) -> Result<()> {
        let now = now_millis();
        let stale_runs: Vec<RunId> = self
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running)
            .map(|r| r.id)
            .collect();
        for id in stale_runs {
            if let Some(run) = self.runs.get_mut(&id) {
                run.status = RunStatus::Failed;
                run.finished_ms = Some(now);
                run.error = Some("interrupted: advisor restarted".into());
                warn!(run = %id, "closing interrupted analysis run");
                let ev = Event::Run(run.clone());
                self.record(ev)?;
            }
        }

        let stale_execs: Vec<ExecutionId> = self.open_by_object.drain().map(|(_, id)| id).collect();
        for id in stale_execs {
            if let Some(rec) = self.execs.get_mut(&id) {
                if rec.status != ExecState::Failed {
                    rec.path.push(ExecState::Failed);
                }
                rec.status = ExecState::Failed;
                rec.finished_ms = Some(now);
                rec.error = Some("interrupted: advisor restarted; verify object state".into());
                warn!(execution = %id, object = %rec.object, "closing interrupted execution");
                let ev = Event::Execution(rec.clone());
                self.record(ev)?;
            }
        }
        Ok(())
    }
}

pub struct Ledger {
    state: Mutex<State>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Ledger {
    /// Nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Journal-backed ledger in `dir`; replays existing history first.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let (journal, events) = Journal::open(dir)?;
        let mut state = State::default();
        let replayed = events.len();
        for ev in events {
            state.replay(ev);
        }
        info!(path = %journal.path().display(), events = replayed, "journal replayed");
        state.journal = Some(journal);
        state.recover()?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RunStore for Ledger {
    fn create_run(&self, strategy: &str, strategy_digest: &str, scope: &Scope) -> Result<AnalysisRun> {
        let mut st = self.lock()?;
        st.last_run += 1;
        let run = AnalysisRun {
            id: RunId::new(st.last_run),
            token: Uuid::new_v4(),
            strategy: strategy.to_string(),
            strategy_digest: strategy_digest.to_string(),
            scope: scope.clone(),
            status: RunStatus::Running,
            advisor_version: strata_core::VERSION.to_string(),
            started_ms: now_millis(),
            finished_ms: None,
            objects_analyzed: 0,
            objects_failed: 0,
            error: None,
        };
        st.record(Event::Run(run.clone()))?;
        st.runs.insert(run.id, run.clone());
        Ok(run)
    }

    fn finish_run(&self, id: RunId, completion: RunCompletion) -> Result<AnalysisRun> {
        let mut st = self.lock()?;
        let run = st
            .runs
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if run.status != RunStatus::Running {
            return Err(StoreError::RunFinished(id));
        }
        let mut run = run.clone();
        run.status = completion.status;
        run.objects_analyzed = completion.objects_analyzed;
        run.objects_failed = completion.objects_failed;
        run.error = completion.error;
        run.finished_ms = Some(now_millis());
        st.record(Event::Run(run.clone()))?;
        st.runs.insert(id, run.clone());
        Ok(run)
    }

    fn run(&self, id: RunId) -> Result<AnalysisRun> {
        self.lock()?
            .runs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn latest_run(&self) -> Result<Option<AnalysisRun>> {
        Ok(self.lock()?.runs.values().next_back().cloned())
    }

    fn runs(&self) -> Result<Vec<AnalysisRun>> {
        Ok(self.lock()?.runs.values().cloned().collect())
    }
}

impl RecommendationStore for Ledger {
    fn insert_recommendation(&self, draft: RecommendationDraft) -> Result<Recommendation> {
        let mut st = self.lock()?;
        match st.runs.get(&draft.run_id) {
            None => return Err(StoreError::NotFound(draft.run_id.to_string())),
            Some(run) if run.status != RunStatus::Running => {
                return Err(StoreError::RunFinished(draft.run_id))
            }
            Some(_) => {}
        }
        st.last_rec += 1;
        let rec = Recommendation::from_draft(RecommendationId::new(st.last_rec), draft, now_millis());
        st.record(Event::Recommendation(rec.clone()))?;
        st.recs.insert(rec.id, rec.clone());
        Ok(rec)
    }

    fn recommendation(&self, id: RecommendationId) -> Result<Recommendation> {
        self.lock()?
            .recs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn query(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>> {
        let st = self.lock()?;
        Ok(filter.apply(st.recs.values()))
    }
}

impl ExecutionStore for Ledger {
    fn begin(&self, draft: ExecutionDraft) -> Result<ExecutionRecord> {
        let mut st = self.lock()?;
        st.last_exec += 1;
        let id = ExecutionId::new(st.last_exec);
        let now = now_millis();
        let key = draft.object.key();
        let busy = st.open_by_object.get(&key).copied();

        let mut rec = ExecutionRecord {
            id,
            recommendation_id: draft.recommendation_id,
            object: draft.object,
            statement: draft.statement,
            statement_digest: draft.statement_digest,
            dry_run: draft.dry_run,
            online: draft.online,
            status: ExecState::Pending,
            path: vec![ExecState::Pending],
            encoding_before: draft.encoding_before,
            encoding_target: draft.encoding_target,
            size_before_bytes: draft.size_before_bytes,
            size_after_bytes: None,
            started_ms: now,
            finished_ms: None,
            error: None,
        };
        match busy {
            Some(other) => {
                rec.status = ExecState::Failed;
                rec.path.push(ExecState::Failed);
                rec.finished_ms = Some(now);
                rec.error = Some(format!("object busy: {other} is still in progress"));
                warn!(execution = %id, object = %rec.object, blocking = %other, "object already has an open execution");
            }
            None => {
                st.open_by_object.insert(key, id);
            }
        }
        st.record(Event::Execution(rec.clone()))?;
        st.execs.insert(id, rec.clone());
        Ok(rec)
    }

    fn advance(&self, id: ExecutionId, next: ExecState) -> Result<ExecutionRecord> {
        let mut st = self.lock()?;
        let rec = st
            .execs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !rec.is_open() {
            return Err(StoreError::AlreadyFinal(id));
        }
        if !rec.status.can_transition_to(next) {
            return Err(StoreError::IllegalTransition {
                id,
                from: rec.status,
                to: next,
            });
        }
        rec.status = next;
        rec.path.push(next);
        Ok(rec.clone())
    }

    fn finalize(&self, id: ExecutionId, outcome: ExecutionOutcome) -> Result<ExecutionRecord> {
        let mut st = self.lock()?;
        let rec = st
            .execs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !rec.is_open() {
            return Err(StoreError::AlreadyFinal(id));
        }
        let to = outcome.status;
        let reachable = to == rec.status || rec.status.can_transition_to(to);
        if !to.is_terminal() || !reachable {
            return Err(StoreError::IllegalTransition {
                id,
                from: rec.status,
                to,
            });
        }
        if to != rec.status {
            rec.path.push(to);
        }
        rec.status = to;
        rec.size_after_bytes = outcome.size_after_bytes;
        rec.error = outcome.error;
        rec.finished_ms = Some(now_millis());
        let closed = rec.clone();
        st.open_by_object.remove(&closed.object.key());
        st.record(Event::Execution(closed.clone()))?;
        Ok(closed)
    }

    fn execution(&self, id: ExecutionId) -> Result<ExecutionRecord> {
        self.lock()?
            .execs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn open_execution_for(&self, object: &ObjectRef) -> Result<Option<ExecutionRecord>> {
        let st = self.lock()?;
        Ok(st
            .open_by_object
            .get(&object.key())
            .and_then(|id| st.execs.get(id))
            .cloned())
    }

    fn history(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionRecord>> {
        let st = self.lock()?;
        let mut out: Vec<ExecutionRecord> = st
            .execs
            .values()
            .filter(|r| filter.admits(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.started_ms.cmp(&a.started_ms).then_with(|| b.id.cmp(&a.id)));
        if let Some(n) = filter.limit {
            out.truncate(n);
        }
        Ok(out)
    }
}
