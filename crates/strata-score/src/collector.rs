//! Metrics Collector: one object's facts plus its two activity scores.

use std::time::Duration;

use tracing::{debug, warn};

use strata_core::metrics::{write_ratio, ObjectMetrics, WriteCounters};
use strata_core::port::{DatabasePort, PortError};
use strata_core::types::ObjectRef;

use crate::scoring::{Score, Scorer};

/// Scored view of one object, ready for the rule engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSignals {
    pub metrics: ObjectMetrics,
    pub hotness: Score,
    pub access: Score,
    pub write_ratio: f64,
}

pub struct Collector<'a> {
    port: &'a dyn DatabasePort,
    scorer: Scorer,
    window: Duration,
}

impl<'a> Collector<'a> {
    pub fn new(port: &'a dyn DatabasePort, scorer: Scorer, window: Duration) -> Self {
        Self {
            port,
            scorer,
            window,
        }
    }

    /// Fetch metrics and score them.
    ///
    /// Only the metrics lookup itself can fail the call (`Ok(None)` when the
    /// object is gone). Counter lookups degrade to a 0 score.
    pub fn collect(&self, object: &ObjectRef) -> Result<Option<ObjectSignals>, PortError> {
        let metrics = match self.port.object_metrics(object)? {
            Some(m) => m,
            None => return Ok(None),
        };

        let (writes, hotness) = self.hotness(object, &metrics);
        let access = match metrics.read.as_ref() {
            Some(reads) => Score::measured(self.scorer.access(reads)),
            None => {
                debug!(object = %object, "no read monitoring data; access score 0");
                Score::no_data()
            }
        };
        let ratio = write_ratio(writes.as_ref(), metrics.read.as_ref());

        Ok(Some(ObjectSignals {
            metrics,
            hotness,
            access,
            write_ratio: ratio,
        }))
    }

    /// Prefer the windowed modification counters; fall back to whatever the
    /// metrics snapshot carried.
    fn hotness(&self, object: &ObjectRef, metrics: &ObjectMetrics) -> (Option<WriteCounters>, Score) {
        match self.port.modification_counters(object, self.window) {
            Ok(Some(c)) => (Some(c), Score::measured(self.scorer.hotness(&c))),
            Ok(None) => match metrics.write {
                Some(c) => (Some(c), Score::measured(self.scorer.hotness(&c))),
                None => {
                    debug!(object = %object, "no DML monitoring data; hotness score 0");
                    (None, Score::no_data())
                }
            },
            Err(e) => {
                warn!(object = %object, error = %e, "DML counter lookup failed; hotness score 0");
                (None, Score::lookup_failed())
            }
        }
    }
}
