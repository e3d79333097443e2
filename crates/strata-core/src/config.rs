//! Advisor configuration that downstream crates can serialize/deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Workers scoring/estimating objects concurrently during analysis.
    pub analysis_parallelism: usize,

    /// Storage changes allowed in flight at once (distinct objects only).
    pub execution_parallelism: usize,

    /// Upper bound on analyzing one object before it falls back to defaults.
    pub object_timeout_ms: u64,

    /// Default upper bound on one DDL statement; callers may override.
    pub statement_timeout_ms: u64,

    /// Rows sampled by the engine's ratio estimator.
    pub sample_rows: u64,

    /// Objects smaller than this are not analyzed.
    pub min_object_size_bytes: u64,

    /// Trailing window for DML counters.
    pub dml_window_days: u64,

    /// Write volume treated as "maximally hot".
    pub hotness_cap: f64,

    /// Read volume treated as "maximally accessed".
    pub access_cap: f64,

    /// Extra free space (percent of the projected size) PRECHECK demands.
    pub space_headroom_pct: u64,

    /// Directory for the append-only journal.
    pub state_dir: String,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            analysis_parallelism: 4,
            execution_parallelism: 2,
            object_timeout_ms: 30_000,
            statement_timeout_ms: 60 * 60 * 1000,
            sample_rows: 1_000_000,
            min_object_size_bytes: 100 * 1024 * 1024, // 100 MiB
            dml_window_days: 30,
            hotness_cap: 1_000_000.0,
            access_cap: 100_000_000.0,
            space_headroom_pct: 10,
            state_dir: "./strata-state".to_string(),
        }
    }
}

impl AdvisorConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `STRATA_ANALYSIS_PARALLELISM`
    /// - `STRATA_EXECUTION_PARALLELISM`
    /// - `STRATA_OBJECT_TIMEOUT_MS`
    /// - `STRATA_STATEMENT_TIMEOUT_MS`
    /// - `STRATA_SAMPLE_ROWS`
    /// - `STRATA_MIN_OBJECT_SIZE_BYTES`
    /// - `STRATA_DML_WINDOW_DAYS`
    /// - `STRATA_SPACE_HEADROOM_PCT`
    /// - `STRATA_STATE_DIR`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<usize>("STRATA_ANALYSIS_PARALLELISM") {
            cfg.analysis_parallelism = v;
        }
        if let Some(v) = env_parse::<usize>("STRATA_EXECUTION_PARALLELISM") {
            cfg.execution_parallelism = v;
        }
        if let Some(v) = env_parse::<u64>("STRATA_OBJECT_TIMEOUT_MS") {
            cfg.object_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("STRATA_STATEMENT_TIMEOUT_MS") {
            cfg.statement_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("STRATA_SAMPLE_ROWS") {
            cfg.sample_rows = v;
        }
        if let Some(v) = env_parse::<u64>("STRATA_MIN_OBJECT_SIZE_BYTES") {
            cfg.min_object_size_bytes = v;
        }
        if let Some(v) = env_parse::<u64>("STRATA_DML_WINDOW_DAYS") {
            cfg.dml_window_days = v;
        }
        if let Some(v) = env_parse::<u64>("STRATA_SPACE_HEADROOM_PCT") {
            cfg.space_headroom_pct = v;
        }
        if let Ok(s) = std::env::var("STRATA_STATE_DIR") {
            cfg.state_dir = s;
        }

        cfg
    }

    /// Reject settings that would stall or divide by zero later on.
    pub fn validate(&self) -> Result<()> {
        if self.analysis_parallelism == 0 {
            return Err(Error::Config("analysis_parallelism must be >= 1".into()));
        }
        if self.execution_parallelism == 0 {
            return Err(Error::Config("execution_parallelism must be >= 1".into()));
        }
        let bad_cap = |c: f64| c.is_nan() || c <= 1.0;
        if bad_cap(self.hotness_cap) || bad_cap(self.access_cap) {
            return Err(Error::Config("score caps must be greater than 1".into()));
        }
        if self.object_timeout_ms == 0 || self.statement_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn object_timeout(&self) -> Duration {
        Duration::from_millis(self.object_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn dml_window(&self) -> Duration {
        Duration::from_secs(self.dml_window_days * 24 * 60 * 60)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
