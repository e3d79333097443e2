//! The `Advisor`: owns the port, the store, the strategy book, and the rule
//! cache, and exposes every caller operation.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio::time::timeout;
use tracing::{error, info, warn};

use strata_core::config::AdvisorConfig;
use strata_core::id::{ExecutionId, RecommendationId, RunId};
use strata_core::model::{
    AnalysisRun, ExecutionRecord, Recommendation, RecommendationDraft, RunCompletion, RunStatus, Scope,
};
use strata_core::now_millis;
use strata_core::port::{DatabasePort, PortError};
use strata_core::types::ObjectRef;
use strata_ddl::{generate, DdlOptions, DdlStatement};
use strata_rules::{LoadedStrategy, RuleCache, RuleSource, Strategy, StrategyBook};
use strata_store::{write_recommendations_csv, HistoryFilter, RecommendationFilter, Store, StrategySavings};

use crate::analysis::{compare, Analyzer, RunSummary, StrategyComparison};
use crate::error::{AdvisorError, Result};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Objects counted so far in one run.
#[derive(Debug, Default)]
struct Tally {
    analyzed: u64,
    failed: u64,
}

/// What one analysis worker produced.
enum Verdict {
    Drafts(Vec<RecommendationDraft>),
    Failed(ObjectRef, String),
    Aborted(PortError),
    Skipped,
}

#[derive(Clone)]
pub struct Advisor {
    pub(crate) cfg: AdvisorConfig,
    pub(crate) port: Arc<dyn DatabasePort>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) book: Arc<StrategyBook>,
    pub(crate) rules: Arc<RuleCache>,
    pub(crate) exec_slots: Arc<Semaphore>,
}

impl Advisor {
    pub fn new(
        cfg: AdvisorConfig,
        port: Arc<dyn DatabasePort>,
        store: Arc<dyn Store>,
        book: Arc<StrategyBook>,
    ) -> Result<Self> {
        cfg.validate()?;
        let source: Arc<dyn RuleSource> = book.clone();
        Ok(Self {
            exec_slots: Arc::new(Semaphore::new(cfg.execution_parallelism)),
            rules: Arc::new(RuleCache::new(source)),
            cfg,
            port,
            store,
            book,
        })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.cfg
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn book(&self) -> &Arc<StrategyBook> {
        &self.book
    }

    /// `startAnalysis(scope, strategyId, parallelism)`.
    ///
    /// Per-object failures become FAILED_TO_ANALYZE rows; an unreachable
    /// database aborts the run, which is then recorded as failed. Any other
    /// error after the run was created also closes it as failed before it is
    /// returned, so no run is left RUNNING.
    pub async fn start_analysis(
        &self,
        scope: Scope,
        strategy: &str,
        parallelism: Option<usize>,
    ) -> Result<RunSummary> {
        self.book.mark_referenced(strategy)?;
        let loaded = self.rules.get(strategy)?;
        let run = self
            .store
            .create_run(strategy, &loaded.digest.to_hex(), &scope)?;
        info!(run = %run.id, strategy, digest = %loaded.digest.short(), "analysis started");

        let min_size = if scope.min_size_bytes > 0 {
            scope.min_size_bytes
        } else {
            self.cfg.min_object_size_bytes
        };
        let analyzer = Analyzer::new(&self.cfg, Arc::clone(&self.port), loaded, run.id, min_size);

        let mut tally = Tally::default();
        let aborted = match self.analyze_scope(&scope, &analyzer, parallelism, &mut tally).await {
            Ok(aborted) => aborted,
            Err(e) => {
                error!(run = %run.id, error = %e, "analysis failed; closing run");
                let closed = self.store.finish_run(
                    run.id,
                    RunCompletion {
                        status: RunStatus::Failed,
                        objects_analyzed: tally.analyzed,
                        objects_failed: tally.failed,
                        error: Some(e.to_string()),
                    },
                );
                if let Err(close) = closed {
                    error!(run = %run.id, error = %close, "could not record run failure");
                }
                return Err(e);
            }
        };

        match aborted {
            Some(reason) => {
                error!(run = %run.id, %reason, "run aborted");
                self.close_run(run.id, RunStatus::Failed, tally.analyzed, tally.failed, Some(reason))
            }
            None => {
                let summary = self.close_run(run.id, RunStatus::Completed, tally.analyzed, tally.failed, None)?;
                info!(
                    run = %run.id,
                    analyzed = tally.analyzed,
                    failed = tally.failed,
                    actionable = summary.actionable,
                    projected_savings = summary.projected_savings_bytes,
                    "analysis finished"
                );
                Ok(summary)
            }
        }
    }

    /// Fan the scope out over the workers and persist every draft. Returns
    /// the reason the run was aborted, if the database became unreachable.
    async fn analyze_scope(
        &self,
        scope: &Scope,
        analyzer: &Analyzer,
        parallelism: Option<usize>,
        tally: &mut Tally,
    ) -> Result<Option<String>> {
        let port = Arc::clone(&self.port);
        let listing_scope = scope.clone();
        let objects = match task::spawn_blocking(move || port.list_objects(&listing_scope)).await? {
            Ok(objects) => objects,
            Err(e) => return Ok(Some(format!("object listing failed: {e}"))),
        };

        let workers = parallelism.unwrap_or(self.cfg.analysis_parallelism).max(1);
        let slots = Arc::new(Semaphore::new(workers));
        let abort = Arc::new(AtomicBool::new(false));
        let per_object = self.cfg.object_timeout();
        let mut set = JoinSet::new();
        let mut in_flight: HashMap<task::Id, ObjectRef> = HashMap::new();

        for object in objects {
            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .map_err(|_| AdvisorError::Closed)?;
            if abort.load(Ordering::Acquire) {
                break;
            }
            let worker = analyzer.clone();
            let abort = Arc::clone(&abort);
            let tracked = object.clone();
            let handle = set.spawn(async move {
                let _permit = permit;
                if abort.load(Ordering::Acquire) {
                    return Verdict::Skipped;
                }
                let target = object.clone();
                let job = task::spawn_blocking(move || worker.analyze(&target));
                match timeout(per_object, job).await {
                    Ok(Ok(Ok(drafts))) => Verdict::Drafts(drafts),
                    Ok(Ok(Err(e))) if e.is_systemic() => {
                        abort.store(true, Ordering::Release);
                        Verdict::Aborted(e)
                    }
                    Ok(Ok(Err(e))) => Verdict::Failed(object, e.to_string()),
                    Ok(Err(e)) => Verdict::Failed(object, format!("worker failed: {e}")),
                    Err(_) => Verdict::Failed(
                        object,
                        format!("timed out after {}ms", per_object.as_millis()),
                    ),
                }
            });
            in_flight.insert(handle.id(), tracked);
        }

        let run = analyzer.run_id;
        let mut drafts = Vec::new();
        let mut fatal: Option<PortError> = None;
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, verdict)) => {
                    in_flight.remove(&id);
                    match verdict {
                        Verdict::Drafts(d) => {
                            tally.analyzed += 1;
                            drafts.extend(d);
                        }
                        Verdict::Failed(object, reason) => {
                            warn!(run = %run, object = %object, %reason, "object could not be analyzed");
                            tally.failed += 1;
                            drafts.push(analyzer.fallback(&object, reason));
                        }
                        Verdict::Aborted(e) => {
                            if fatal.is_none() {
                                fatal = Some(e);
                            }
                        }
                        Verdict::Skipped => {}
                    }
                }
                Err(e) => {
                    tally.failed += 1;
                    match in_flight.remove(&e.id()) {
                        Some(object) => {
                            error!(run = %run, object = %object, error = %e, "analysis worker lost");
                            drafts.push(analyzer.fallback(&object, format!("worker lost: {e}")));
                        }
                        None => error!(run = %run, error = %e, "analysis worker lost"),
                    }
                }
            }
        }

        // stable ids across identical runs
        drafts.sort_by(|a, b| a.object.cmp(&b.object));
        for d in drafts {
            self.store.insert_recommendation(d)?;
        }

        Ok(fatal.map(|e| format!("database unreachable: {e}")))
    }

    fn close_run(
        &self,
        id: RunId,
        status: RunStatus,
        analyzed: u64,
        failed: u64,
        error: Option<String>,
    ) -> Result<RunSummary> {
        let run = self.store.finish_run(
            id,
            RunCompletion {
                status,
                objects_analyzed: analyzed,
                objects_failed: failed,
                error,
            },
        )?;
        let all = self.store.query(&RecommendationFilter {
            run_id: Some(id),
            ..RecommendationFilter::all()
        })?;
        let actionable: Vec<&Recommendation> = all.iter().filter(|r| r.is_actionable()).collect();
        Ok(RunSummary {
            run,
            recommendations: all.len() as u64,
            actionable: actionable.len() as u64,
            projected_savings_bytes: actionable
                .iter()
                .map(|r| r.projected_savings_bytes)
                .fold(0u64, u64::saturating_add),
        })
    }

    pub fn analysis_status(&self, run: RunId) -> Result<AnalysisRun> {
        Ok(self.store.run(run)?)
    }

    pub fn latest_run(&self) -> Result<Option<AnalysisRun>> {
        Ok(self.store.latest_run()?)
    }

    /// `getRecommendations(strategyId, minSavingsPct, objectType)` and friends.
    pub fn recommendations(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>> {
        Ok(self.store.query(filter)?)
    }

    pub fn recommendation(&self, id: RecommendationId) -> Result<Recommendation> {
        Ok(self.store.recommendation(id)?)
    }

    /// `generateDDL(recommendationId)`; pure, never touches the database.
    pub fn generate_ddl(&self, id: RecommendationId, opts: &DdlOptions) -> Result<DdlStatement> {
        let rec = self.store.recommendation(id)?;
        Ok(generate(&rec, opts))
    }

    pub fn execution(&self, id: ExecutionId) -> Result<ExecutionRecord> {
        Ok(self.store.execution(id)?)
    }

    /// `getExecutionHistory(daysBack, ...)`, newest first.
    pub fn history(&self, days_back: Option<u64>, mut filter: HistoryFilter) -> Result<Vec<ExecutionRecord>> {
        if let Some(days) = days_back {
            filter.since_ms = Some(now_millis().saturating_sub(days.saturating_mul(DAY_MS)));
        }
        Ok(self.store.history(&filter)?)
    }

    pub fn savings_by_strategy(&self) -> Result<Vec<StrategySavings>> {
        Ok(self.store.savings_by_strategy()?)
    }

    /// Write the filtered listing as CSV; returns the number of rows.
    pub fn export_recommendations_csv<W: Write>(&self, filter: &RecommendationFilter, out: W) -> Result<usize> {
        let rows = self.store.query(filter)?;
        write_recommendations_csv(out, &rows)?;
        Ok(rows.len())
    }

    /// What every registered strategy would decide for one object right now.
    pub async fn compare_strategies(&self, object: &ObjectRef) -> Result<Vec<StrategyComparison>> {
        let strategies = self
            .book
            .list()?
            .iter()
            .map(LoadedStrategy::from_strategy)
            .collect::<strata_rules::Result<Vec<_>>>()?;
        let port = Arc::clone(&self.port);
        let cfg = self.cfg.clone();
        let target = object.clone();
        let found = task::spawn_blocking(move || compare(port.as_ref(), &cfg, &target, &strategies)).await??;
        found.ok_or_else(|| AdvisorError::NotFound(object.to_string()))
    }

    pub fn strategies(&self) -> Result<Vec<Strategy>> {
        Ok(self.book.list()?)
    }

    /// `getStrategyDetails(name)`.
    pub fn strategy(&self, name: &str) -> Result<Strategy> {
        Ok(self.book.get(name)?)
    }

    /// Add or replace a strategy; refused once a run has used it.
    pub fn register_strategy(&self, strategy: Strategy) -> Result<()> {
        Ok(self.book.upsert(strategy)?)
    }
}
