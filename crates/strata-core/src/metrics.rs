//! Raw per-object facts as reported by the database engine.

use serde::{Deserialize, Serialize};

use crate::types::{Encoding, ObjectRef};

/// DML counters over some monitoring window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCounters {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl WriteCounters {
    pub fn total(&self) -> u64 {
        self.inserts
            .saturating_add(self.updates)
            .saturating_add(self.deletes)
    }
}

/// Read counters over some monitoring window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCounters {
    pub logical_reads: u64,
    pub physical_reads: u64,
}

impl ReadCounters {
    pub fn total(&self) -> u64 {
        self.logical_reads.saturating_add(self.physical_reads)
    }
}

/// Result of `getObjectMetrics`.
///
/// Counters are optional: `None` means "no monitoring data yet", which the
/// scoring engine treats differently from a zero count in its logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetrics {
    pub object: ObjectRef,
    pub size_bytes: u64,
    pub row_count: u64,
    pub block_count: u64,
    #[serde(default)]
    pub write: Option<WriteCounters>,
    #[serde(default)]
    pub read: Option<ReadCounters>,
    pub current_encoding: Encoding,
    /// Storage area (tablespace) the segment lives in.
    #[serde(default)]
    pub storage_area: String,
    /// Partition names for partitioned tables; empty otherwise.
    #[serde(default)]
    pub partitions: Vec<String>,
}

/// Result of `estimateCompressionRatio` for one encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioEstimate {
    pub ratio: f64,
    pub compressed_size_estimate: u64,
}

/// Share of write activity among all activity, `0.0..=1.0`.
/// No activity at all yields `0.0`.
pub fn write_ratio(write: Option<&WriteCounters>, read: Option<&ReadCounters>) -> f64 {
    let w = write.map(|c| c.total()).unwrap_or(0) as f64;
    let r = read.map(|c| c.total()).unwrap_or(0) as f64;
    if w + r <= 0.0 {
        0.0
    } else {
        w / (w + r)
    }
}
