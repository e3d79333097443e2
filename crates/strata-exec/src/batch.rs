//! Batch execution over a strategy's latest actionable recommendations, or
//! over an explicit list of recommendation ids.
//!
//! The strategy queue is the repository order (largest projected savings first). One
//! object failing never stops the others; the summary carries both counts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use strata_core::id::RecommendationId;
use strata_core::model::{ExecState, ExecutionRecord, PriorityTier, Recommendation};
use strata_core::types::ObjectRef;
use strata_store::RecommendationFilter;

use crate::error::Result;
use crate::pipeline::ExecuteOptions;
use crate::runtime::Advisor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub max_objects: usize,
    /// Skip recommendations that would push the batch's total size past this.
    pub max_total_size_bytes: Option<u64>,
    pub min_savings_pct: Option<f64>,
    pub online: bool,
    pub dry_run: bool,
    pub parallel_degree: Option<u32>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_total_size_bytes: None,
            min_savings_pct: None,
            online: false,
            dry_run: true,
            parallel_degree: None,
        }
    }
}

impl BatchOptions {
    fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
            online: self.online,
            parallel_degree: self.parallel_degree,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub recommendation_id: RecommendationId,
    pub object: ObjectRef,
    pub tier: PriorityTier,
    pub projected_savings_bytes: u64,
    pub record: Option<ExecutionRecord>,
    /// Set when no execution record could be produced at all.
    pub error: Option<String>,
}

impl BatchItem {
    pub fn succeeded(&self) -> bool {
        matches!(&self.record, Some(r) if r.status == ExecState::Succeeded)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Realized savings of the items that succeeded; zero for dry runs.
    pub total_savings_bytes: u64,
    pub projected_savings_bytes: u64,
    /// In queue order.
    pub items: Vec<BatchItem>,
}

/// Take candidates in queue order until `max_objects`, skipping any that
/// would break the size cap.
pub fn plan_batch(candidates: Vec<Recommendation>, opts: &BatchOptions) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let mut total: u64 = 0;
    for rec in candidates {
        if out.len() >= opts.max_objects {
            break;
        }
        if let Some(cap) = opts.max_total_size_bytes {
            if total.saturating_add(rec.size_bytes) > cap {
                continue;
            }
        }
        total = total.saturating_add(rec.size_bytes);
        out.push(rec);
    }
    out
}

impl Advisor {
    /// `batchExecute(strategyId, maxObjects, maxTotalSizeBytes, online)`.
    pub async fn batch_execute(&self, strategy: &str, opts: BatchOptions) -> Result<BatchSummary> {
        let mut filter = RecommendationFilter {
            limit: None,
            ..RecommendationFilter::default()
        }
        .strategy(strategy);
        filter.min_savings_pct = opts.min_savings_pct;
        let queue = plan_batch(self.store.query(&filter)?, &opts);
        info!(strategy, queued = queue.len(), dry_run = opts.dry_run, "batch started");
        Ok(self.run_batch(queue, &opts).await)
    }

    /// `batchExecute(recommendationIds, dryRun, parallelDegree)`.
    ///
    /// Items run in the order given, duplicates dropped; the caps of `opts`
    /// still apply. Every id is resolved before anything runs, so an unknown
    /// id fails the whole batch untouched.
    pub async fn batch_execute_ids(&self, ids: &[RecommendationId], opts: BatchOptions) -> Result<BatchSummary> {
        let mut seen = HashSet::new();
        let mut picked = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.insert(*id) {
                picked.push(self.store.recommendation(*id)?);
            }
        }
        if let Some(min) = opts.min_savings_pct {
            picked.retain(|r| r.savings_pct >= min);
        }
        let queue = plan_batch(picked, &opts);
        info!(requested = ids.len(), queued = queue.len(), dry_run = opts.dry_run, "batch started");
        Ok(self.run_batch(queue, &opts).await)
    }

    async fn run_batch(&self, queue: Vec<Recommendation>, opts: &BatchOptions) -> BatchSummary {
        let exec = opts.execute_options();
        let mut items: Vec<BatchItem> = queue
            .iter()
            .map(|r| BatchItem {
                recommendation_id: r.id,
                object: r.object.clone(),
                tier: r.priority(),
                projected_savings_bytes: r.projected_savings_bytes,
                record: None,
                error: None,
            })
            .collect();

        let mut set = JoinSet::new();
        for (idx, rec) in queue.into_iter().enumerate() {
            let advisor = self.clone();
            set.spawn(async move { (idx, advisor.execute_recommendation(rec, exec).await) });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(record))) => items[idx].record = Some(record),
                Ok((idx, Err(e))) => {
                    warn!(object = %items[idx].object, error = %e, "batch item failed");
                    items[idx].error = Some(e.to_string());
                }
                // a panicked task already closed its record through the lease
                Err(e) => warn!(error = %e, "batch task lost"),
            }
        }

        let mut summary = BatchSummary {
            processed: items.len() as u64,
            ..BatchSummary::default()
        };
        for item in &items {
            summary.projected_savings_bytes = summary
                .projected_savings_bytes
                .saturating_add(item.projected_savings_bytes);
            if item.succeeded() {
                summary.succeeded += 1;
                if let Some(r) = &item.record {
                    summary.total_savings_bytes = summary.total_savings_bytes.saturating_add(r.savings_bytes());
                }
            } else {
                summary.failed += 1;
            }
        }
        summary.items = items;
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            saved = summary.total_savings_bytes,
            "batch finished"
        );
        summary
    }
}
