//! Activity scoring.
//!
//! `score = min(100, log10(n + 1) / log10(cap) * 100)`, so an object touched
//! once and one touched millions of times land on the same bounded scale.

use serde::{Deserialize, Serialize};

use strata_core::config::AdvisorConfig;
use strata_core::metrics::{ReadCounters, WriteCounters};

pub const DEFAULT_HOTNESS_CAP: f64 = 1_000_000.0;
pub const DEFAULT_ACCESS_CAP: f64 = 100_000_000.0;

/// Where a score came from. A cold object and an unmonitored one both score
/// 0, but they mean different things in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Measured,
    NoData,
    LookupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub source: ScoreSource,
}

impl Score {
    pub fn measured(value: f64) -> Self {
        Self {
            value,
            source: ScoreSource::Measured,
        }
    }

    pub fn no_data() -> Self {
        Self {
            value: 0.0,
            source: ScoreSource::NoData,
        }
    }

    pub fn lookup_failed() -> Self {
        Self {
            value: 0.0,
            source: ScoreSource::LookupFailed,
        }
    }
}

/// Log-scaled 0..100 score of `n` events against a reference volume `cap`.
pub fn log_score(n: u64, cap: f64) -> f64 {
    if n == 0 || cap.is_nan() || cap <= 1.0 {
        return 0.0;
    }
    let s = ((n as f64) + 1.0).log10() / cap.log10() * 100.0;
    s.min(100.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    pub hotness_cap: f64,
    pub access_cap: f64,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            hotness_cap: DEFAULT_HOTNESS_CAP,
            access_cap: DEFAULT_ACCESS_CAP,
        }
    }
}

impl Scorer {
    pub fn from_config(cfg: &AdvisorConfig) -> Self {
        Self {
            hotness_cap: cfg.hotness_cap,
            access_cap: cfg.access_cap,
        }
    }

    pub fn hotness(&self, counters: &WriteCounters) -> f64 {
        log_score(counters.total(), self.hotness_cap)
    }

    pub fn access(&self, counters: &ReadCounters) -> f64 {
        log_score(counters.total(), self.access_cap)
    }
}

/// Bucket label used in rationale text.
pub fn hotness_label(score: f64) -> &'static str {
    if score >= 70.0 {
        "High DML"
    } else if score >= 30.0 {
        "Moderate DML"
    } else {
        "Low DML"
    }
}

pub fn access_label(score: f64) -> &'static str {
    if score >= 70.0 {
        "Hot reads"
    } else if score >= 30.0 {
        "Warm reads"
    } else {
        "Cold reads"
    }
}
