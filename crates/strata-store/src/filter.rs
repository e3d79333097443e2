//! Query filters and report ordering.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use strata_core::id::RunId;
use strata_core::model::{AnalysisOutcome, ExecState, ExecutionRecord, Recommendation};
use strata_core::types::Encoding;
use strata_core::types::ObjectType;

/// Default page size for recommendation listings.
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationFilter {
    pub strategy: Option<String>,
    pub min_savings_pct: Option<f64>,
    pub object_type: Option<ObjectType>,
    pub owner: Option<String>,
    pub run_id: Option<RunId>,
    /// Hide `NONE`, no-op, and failed-to-analyze rows.
    pub actionable_only: bool,
    /// Only the newest recommendation per (strategy, object).
    pub latest_only: bool,
    pub limit: Option<usize>,
}

impl Default for RecommendationFilter {
    /// The "actionable candidates" query.
    fn default() -> Self {
        Self {
            strategy: None,
            min_savings_pct: None,
            object_type: None,
            owner: None,
            run_id: None,
            actionable_only: true,
            latest_only: true,
            limit: Some(DEFAULT_LIMIT),
        }
    }
}

impl RecommendationFilter {
    /// Everything, superseded and non-actionable rows included.
    pub fn all() -> Self {
        Self {
            actionable_only: false,
            latest_only: false,
            limit: None,
            ..Self::default()
        }
    }

    pub fn strategy(mut self, s: impl Into<String>) -> Self {
        self.strategy = Some(s.into());
        self
    }

    pub fn min_savings_pct(mut self, pct: f64) -> Self {
        self.min_savings_pct = Some(pct);
        self
    }

    pub fn object_type(mut self, t: ObjectType) -> Self {
        self.object_type = Some(t);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn admits(&self, r: &Recommendation) -> bool {
        if self.actionable_only && !r.is_actionable() {
            return false;
        }
        if let Some(s) = &self.strategy {
            if &r.strategy != s {
                return false;
            }
        }
        if let Some(min) = self.min_savings_pct {
            if r.savings_pct < min {
                return false;
            }
        }
        if let Some(t) = &self.object_type {
            if &r.object.object_type != t {
                return false;
            }
        }
        if let Some(o) = &self.owner {
            if !o.eq_ignore_ascii_case(&r.object.owner) {
                return false;
            }
        }
        if let Some(run) = self.run_id {
            if r.run_id != run {
                return false;
            }
        }
        true
    }

    /// Apply the filter to a candidate set and order the result.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<Recommendation>
    where
        I: IntoIterator<Item = &'a Recommendation>,
    {
        let rows: Vec<&Recommendation> = if self.latest_only {
            latest_per_object(rows)
        } else {
            rows.into_iter().collect()
        };
        let mut out: Vec<Recommendation> = rows
            .into_iter()
            .filter(|r| self.admits(r))
            .cloned()
            .collect();
        out.sort_by(report_order);
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Projected savings desc, savings percentage desc, id asc.
pub fn report_order(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.projected_savings_bytes
        .cmp(&a.projected_savings_bytes)
        .then_with(|| b.savings_pct.total_cmp(&a.savings_pct))
        .then_with(|| a.id.cmp(&b.id))
}

fn latest_per_object<'a, I>(rows: I) -> Vec<&'a Recommendation>
where
    I: IntoIterator<Item = &'a Recommendation>,
{
    let mut latest: HashMap<(String, String), &Recommendation> = HashMap::new();
    for r in rows {
        let key = (r.strategy.clone(), r.object.key());
        match latest.get(&key) {
            Some(cur) if (cur.run_id, cur.id) >= (r.run_id, r.id) => {}
            _ => {
                latest.insert(key, r);
            }
        }
    }
    latest.into_values().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryFilter {
    /// Only records started at or after this instant (ms since epoch).
    pub since_ms: Option<u64>,
    pub owner: Option<String>,
    pub status: Option<ExecState>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn admits(&self, r: &ExecutionRecord) -> bool {
        self.since_ms.map_or(true, |s| r.started_ms >= s)
            && self
                .owner
                .as_ref()
                .map_or(true, |o| o.eq_ignore_ascii_case(&r.object.owner))
            && self.status.map_or(true, |s| r.status == s)
    }
}

/// Aggregate over actionable recommendations of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySavings {
    pub strategy: String,
    pub objects: u64,
    pub total_size_bytes: u64,
    pub total_savings_bytes: u64,
    pub avg_ratio: f64,
    pub avg_savings_pct: f64,
}

/// Per-strategy totals, sorted by strategy name.
pub fn savings_by_strategy<'a, I>(rows: I) -> Vec<StrategySavings>
where
    I: IntoIterator<Item = &'a Recommendation>,
{
    let mut acc: BTreeMap<&str, (u64, u64, u64, f64, f64)> = BTreeMap::new();
    for r in rows {
        let e = acc.entry(r.strategy.as_str()).or_default();
        e.0 += 1;
        e.1 = e.1.saturating_add(r.size_bytes);
        e.2 = e.2.saturating_add(r.projected_savings_bytes);
        e.3 += r.best_ratio;
        e.4 += r.savings_pct;
    }
    acc.into_iter()
        .map(|(strategy, (n, size, saved, ratio, pct))| StrategySavings {
            strategy: strategy.to_string(),
            objects: n,
            total_size_bytes: size,
            total_savings_bytes: saved,
            avg_ratio: ratio / n as f64,
            avg_savings_pct: pct / n as f64,
        })
        .collect()
}

/// Estate-wide totals over the newest recommendation of every object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionStatistics {
    /// Objects whose newest analysis completed.
    pub total_objects: u64,
    pub total_size_bytes: u64,
    /// Objects already stored with an encoding, and their current size.
    pub compressed_objects: u64,
    pub compressed_size_bytes: u64,
    pub actionable: u64,
    pub projected_savings_bytes: u64,
    /// Mean savings percentage of the actionable recommendations.
    pub avg_savings_pct: f64,
}

/// Whatever strategy produced it, only an object's newest row counts.
pub fn compression_statistics<'a, I>(rows: I) -> CompressionStatistics
where
    I: IntoIterator<Item = &'a Recommendation>,
{
    let mut newest: HashMap<String, &Recommendation> = HashMap::new();
    for r in rows {
        match newest.get(&r.object.key()) {
            Some(cur) if (cur.run_id, cur.id) >= (r.run_id, r.id) => {}
            _ => {
                newest.insert(r.object.key(), r);
            }
        }
    }

    let mut stats = CompressionStatistics::default();
    let mut pct_sum = 0.0;
    for r in newest.into_values() {
        if matches!(r.outcome, AnalysisOutcome::FailedToAnalyze { .. }) {
            continue;
        }
        stats.total_objects += 1;
        stats.total_size_bytes = stats.total_size_bytes.saturating_add(r.size_bytes);
        if r.current_encoding != Encoding::None {
            stats.compressed_objects += 1;
            stats.compressed_size_bytes = stats.compressed_size_bytes.saturating_add(r.size_bytes);
        }
        if r.is_actionable() {
            stats.actionable += 1;
            stats.projected_savings_bytes = stats.projected_savings_bytes.saturating_add(r.projected_savings_bytes);
            pct_sum += r.savings_pct;
        }
    }
    if stats.actionable > 0 {
        stats.avg_savings_pct = pct_sum / stats.actionable as f64;
    }
    stats
}
