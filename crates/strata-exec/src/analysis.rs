//! Per-object analysis: collect, score, estimate, decide.
//!
//! Everything here is synchronous and talks to the port directly; the runtime
//! runs it on blocking worker threads under a timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use strata_core::config::AdvisorConfig;
use strata_core::id::RunId;
use strata_core::model::{AnalysisOutcome, AnalysisRun, RecommendationDraft, RunStatus};
use strata_core::port::{DatabasePort, PortError};
use strata_core::types::{Encoding, ObjectRef, ObjectType};
use strata_rules::engine::evaluate_with;
use strata_rules::{EvalInput, LoadedStrategy};
use strata_score::{Collector, EstimateReport, Estimator, ObjectSignals, Scorer};

/// What `start_analysis` hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: AnalysisRun,
    pub recommendations: u64,
    pub actionable: u64,
    pub projected_savings_bytes: u64,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.run.status == RunStatus::Completed
    }
}

/// One strategy's verdict for one object, as shown by `compare_strategies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub strategy: String,
    pub encoding: Encoding,
    pub matched_rule: Option<u32>,
    pub rationale: String,
    pub projected_size_bytes: u64,
    pub projected_savings_bytes: u64,
    pub savings_pct: f64,
}

/// Analysis context shared by all workers of one run.
#[derive(Clone)]
pub struct Analyzer {
    pub port: Arc<dyn DatabasePort>,
    pub scorer: Scorer,
    pub estimator: Estimator,
    pub window: Duration,
    pub min_size_bytes: u64,
    pub strategy: Arc<LoadedStrategy>,
    pub run_id: RunId,
}

impl Analyzer {
    pub fn new(
        cfg: &AdvisorConfig,
        port: Arc<dyn DatabasePort>,
        strategy: Arc<LoadedStrategy>,
        run_id: RunId,
        min_size_bytes: u64,
    ) -> Self {
        Self {
            port,
            scorer: Scorer::from_config(cfg),
            estimator: Estimator::new(cfg.sample_rows),
            window: cfg.dml_window(),
            min_size_bytes,
            strategy,
            run_id,
        }
    }

    /// Drafts for one listed object: none if it vanished or is too small, one
    /// per partition for partitioned tables, otherwise one.
    ///
    /// Only a failed metrics lookup is an error; everything softer is folded
    /// into the draft.
    pub fn analyze(&self, object: &ObjectRef) -> Result<Vec<RecommendationDraft>, PortError> {
        let collector = Collector::new(self.port.as_ref(), self.scorer, self.window);
        let signals = match collector.collect(object)? {
            Some(s) => s,
            None => {
                debug!(object = %object, "object disappeared before analysis");
                return Ok(Vec::new());
            }
        };
        if signals.metrics.size_bytes < self.min_size_bytes {
            debug!(object = %object, size = signals.metrics.size_bytes, "below minimum size; skipped");
            return Ok(Vec::new());
        }

        let partitioned = object.object_type == ObjectType::Table
            && object.partition.is_none()
            && !signals.metrics.partitions.is_empty();
        if !partitioned {
            return Ok(vec![self.draft(signals)]);
        }

        let mut out = Vec::with_capacity(signals.metrics.partitions.len());
        for name in &signals.metrics.partitions {
            let part = object.with_partition(name.as_str());
            match collector.collect(&part)? {
                Some(s) => out.push(self.draft(s)),
                None => warn!(object = %part, "listed partition has no metrics; skipped"),
            }
        }
        Ok(out)
    }

    fn draft(&self, signals: ObjectSignals) -> RecommendationDraft {
        let m = &signals.metrics;
        let report = self.estimator.estimate(
            self.port.as_ref(),
            m,
            Encoding::candidates_for(&m.object.object_type),
        );
        let input = eval_input(&signals, &report);
        let decision = evaluate_with(&self.strategy, &input);
        let projected = projected_size(m.size_bytes, decision.encoding, &report);

        RecommendationDraft {
            run_id: self.run_id,
            strategy: self.strategy.name.clone(),
            object: m.object.clone(),
            size_bytes: m.size_bytes,
            current_encoding: m.current_encoding,
            hotness: input.hotness,
            access: input.access,
            write_ratio: input.write_ratio,
            candidates: report.candidates,
            best_encoding: report.best,
            best_ratio: report.best_ratio,
            encoding: decision.encoding,
            matched_rule: decision.basis.matched_rule(),
            rationale: decision.rationale,
            projected_size_bytes: projected,
            outcome: AnalysisOutcome::Complete,
        }
    }

    /// Row recorded when an object could not be analyzed at all.
    pub fn fallback(&self, object: &ObjectRef, reason: impl Into<String>) -> RecommendationDraft {
        let reason = reason.into();
        RecommendationDraft {
            run_id: self.run_id,
            strategy: self.strategy.name.clone(),
            object: object.clone(),
            size_bytes: 0,
            current_encoding: Encoding::None,
            hotness: 0.0,
            access: 0.0,
            write_ratio: 0.0,
            candidates: Vec::new(),
            best_encoding: Encoding::None,
            best_ratio: 1.0,
            encoding: Encoding::None,
            matched_rule: None,
            rationale: format!("analysis failed: {reason}"),
            projected_size_bytes: 0,
            outcome: AnalysisOutcome::FailedToAnalyze { reason },
        }
    }
}

/// Engine input: scores from the collector, ratios from the estimator. Only
/// tested candidates are passed on.
fn eval_input(signals: &ObjectSignals, report: &EstimateReport) -> EvalInput {
    EvalInput {
        object_type: signals.metrics.object.object_type.clone(),
        size_bytes: signals.metrics.size_bytes,
        hotness: signals.hotness.value,
        access: signals.access.value,
        write_ratio: signals.write_ratio,
        ratio: report.best_ratio,
        estimates: report
            .candidates
            .iter()
            .filter(|c| c.tested)
            .map(|c| (c.encoding, c.ratio))
            .collect(),
    }
}

/// Size after applying `encoding`, from the estimator's result for it.
pub fn projected_size(size_bytes: u64, encoding: Encoding, report: &EstimateReport) -> u64 {
    if encoding.is_none() {
        return size_bytes;
    }
    report
        .candidates
        .iter()
        .find(|c| c.encoding == encoding && c.tested)
        .map(|c| c.estimated_size_bytes.min(size_bytes))
        .unwrap_or(size_bytes)
}

/// Evaluate every given strategy for one object without persisting anything.
pub fn compare(
    port: &dyn DatabasePort,
    cfg: &AdvisorConfig,
    object: &ObjectRef,
    strategies: &[LoadedStrategy],
) -> Result<Option<Vec<StrategyComparison>>, PortError> {
    let collector = Collector::new(port, Scorer::from_config(cfg), cfg.dml_window());
    let signals = match collector.collect(object)? {
        Some(s) => s,
        None => return Ok(None),
    };
    let m = &signals.metrics;
    let report = Estimator::new(cfg.sample_rows).estimate(
        port,
        m,
        Encoding::candidates_for(&m.object.object_type),
    );
    let input = eval_input(&signals, &report);

    let mut out: Vec<StrategyComparison> = strategies
        .iter()
        .map(|s| {
            let d = evaluate_with(s, &input);
            let projected = projected_size(m.size_bytes, d.encoding, &report);
            let saved = m.size_bytes - projected;
            StrategyComparison {
                strategy: s.name.clone(),
                encoding: d.encoding,
                matched_rule: d.basis.matched_rule(),
                rationale: d.rationale,
                projected_size_bytes: projected,
                projected_savings_bytes: saved,
                savings_pct: if m.size_bytes == 0 {
                    0.0
                } else {
                    saved as f64 / m.size_bytes as f64 * 100.0
                },
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.projected_savings_bytes
            .cmp(&a.projected_savings_bytes)
            .then_with(|| a.strategy.cmp(&b.strategy))
    });
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_rules::builtin;
    use strata_store::{CatalogObject, MemoryCatalog};

    const GIB: u64 = 1 << 30;

    fn analyzer(cat: MemoryCatalog) -> Analyzer {
        let loaded = LoadedStrategy::from_strategy(&builtin::balanced()).unwrap();
        Analyzer::new(
            &AdvisorConfig::default(),
            Arc::new(cat),
            Arc::new(loaded),
            RunId::new(1),
            100,
        )
    }

    #[test]
    fn cold_table_archived_with_projection() {
        let cat = MemoryCatalog::new().with(
            CatalogObject::table("APP", "AUDIT", 8 * GIB)
                .writes(0, 0, 0)
                .ratio(Encoding::ArchiveLow, 8.0)
                .ratio(Encoding::QueryHigh, 6.0),
        );
        let drafts = analyzer(cat).analyze(&ObjectRef::table("APP", "AUDIT")).unwrap();
        assert_eq!(drafts.len(), 1);
        let d = &drafts[0];
        assert_eq!(d.encoding, Encoding::ArchiveLow);
        assert_eq!(d.best_encoding, Encoding::ArchiveLow);
        assert_eq!(d.projected_size_bytes, GIB);
        assert_eq!(d.hotness, 0.0);
        assert!(d.rationale.contains("Low DML"));
        // untestable candidates are recorded at 1.0
        let basic = d.candidates.iter().find(|c| c.encoding == Encoding::Basic).unwrap();
        assert!(!basic.tested);
        assert_eq!(basic.ratio, 1.0);
    }

    #[test]
    fn partitions_are_analyzed_separately() {
        let cat = MemoryCatalog::new()
            .with(CatalogObject::table("APP", "SALES", 4 * GIB).partitions(&["P1", "P2", "P3"]))
            .with(CatalogObject::new(ObjectRef::table("APP", "SALES").with_partition("P1"), 2 * GIB).flat_ratio(3.0))
            .with(CatalogObject::new(ObjectRef::table("APP", "SALES").with_partition("P2"), 2 * GIB).flat_ratio(1.0));
        let drafts = analyzer(cat).analyze(&ObjectRef::table("APP", "SALES")).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].object.partition.as_deref(), Some("P1"));
        assert_ne!(drafts[0].encoding, Encoding::None);
        assert_eq!(drafts[1].encoding, Encoding::None);
    }

    #[test]
    fn small_objects_skipped() {
        let cat = MemoryCatalog::new().with(CatalogObject::table("APP", "TINY", 10).flat_ratio(3.0));
        assert!(analyzer(cat).analyze(&ObjectRef::table("APP", "TINY")).unwrap().is_empty());
    }

    #[test]
    fn comparison_covers_every_strategy() {
        let cat = MemoryCatalog::new().with(
            CatalogObject::table("APP", "T", GIB)
                .writes(0, 0, 0)
                .reads(10, 0)
                .flat_ratio(2.0)
                .ratio(Encoding::ArchiveHigh, 5.0),
        );
        let strategies: Vec<LoadedStrategy> = builtin::builtin_strategies()
            .iter()
            .map(|s| LoadedStrategy::from_strategy(s).unwrap())
            .collect();
        let cmp = compare(&cat, &AdvisorConfig::default(), &ObjectRef::table("APP", "T"), &strategies)
            .unwrap()
            .unwrap();
        assert_eq!(cmp.len(), 3);
        assert_eq!(cmp[0].strategy, "aggressive");
        assert_eq!(cmp[0].encoding, Encoding::ArchiveHigh);
    }

    #[test]
    fn rule_never_lands_on_an_unestimated_encoding() {
        let cat = MemoryCatalog::new().with(
            CatalogObject::table("APP", "COLD", 8 * GIB)
                .writes(0, 0, 0)
                .ratio(Encoding::Oltp, 3.0),
        );
        let drafts = analyzer(cat).analyze(&ObjectRef::table("APP", "COLD")).unwrap();
        let d = &drafts[0];
        assert_eq!(d.encoding, Encoding::Oltp);
        assert_eq!(d.projected_size_bytes, 8 * GIB / 3);
        assert!(d.rationale.contains("passed over p10 ARCHIVE_LOW"), "{}", d.rationale);
    }
}
