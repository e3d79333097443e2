//! Compression Ratio Estimator.
//!
//! Each candidate is probed independently; a probe that fails (unsupported
//! feature, missing privilege, transient error) counts as ratio `1.0` and is
//! logged, never propagated.

use std::cmp::Ordering;

use tracing::warn;

use strata_core::metrics::{ObjectMetrics, RatioEstimate};
use strata_core::model::CandidateRatio;
use strata_core::port::{DatabasePort, PortError};
use strata_core::types::{Encoding, ObjectRef};

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateReport {
    /// `Encoding::None` when nothing beats 1.0.
    pub best: Encoding,
    pub best_ratio: f64,
    pub candidates: Vec<CandidateRatio>,
}

impl EstimateReport {
    /// Ratio measured for `encoding`, if it was tested.
    pub fn ratio_for(&self, encoding: Encoding) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.encoding == encoding && c.tested)
            .map(|c| c.ratio)
    }

    /// Report for an object we could not probe at all.
    pub fn untested() -> Self {
        Self {
            best: Encoding::None,
            best_ratio: 1.0,
            candidates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Estimator {
    pub sample_rows: u64,
}

impl Estimator {
    pub fn new(sample_rows: u64) -> Self {
        Self { sample_rows }
    }

    /// One candidate. Returned as a `Result` so callers have to decide what an
    /// untestable encoding means for them.
    pub fn probe(
        &self,
        port: &dyn DatabasePort,
        object: &ObjectRef,
        encoding: Encoding,
    ) -> Result<RatioEstimate, PortError> {
        let est = port.estimate_ratio(object, encoding, self.sample_rows)?;
        if !est.ratio.is_finite() || est.ratio <= 0.0 {
            return Err(PortError::Unsupported(format!(
                "estimator returned invalid ratio {}",
                est.ratio
            )));
        }
        Ok(est)
    }

    /// Probe every candidate applicable to the object's type and pick the best.
    ///
    /// Ties on ratio go to the encoding with the lower CPU overhead.
    pub fn estimate(
        &self,
        port: &dyn DatabasePort,
        metrics: &ObjectMetrics,
        candidates: &[Encoding],
    ) -> EstimateReport {
        let object = &metrics.object;
        let mut results = Vec::with_capacity(candidates.len());

        for &enc in candidates {
            if enc.is_none() || !enc.applies_to(&object.object_type) {
                continue;
            }
            let row = match self.probe(port, object, enc) {
                Ok(est) => CandidateRatio {
                    encoding: enc,
                    ratio: est.ratio,
                    estimated_size_bytes: est.compressed_size_estimate,
                    tested: true,
                    note: None,
                },
                Err(e) => {
                    warn!(object = %object, candidate = %enc, error = %e, "candidate untestable; assuming ratio 1.0");
                    CandidateRatio {
                        encoding: enc,
                        ratio: 1.0,
                        estimated_size_bytes: metrics.size_bytes,
                        tested: false,
                        note: Some(e.to_string()),
                    }
                }
            };
            results.push(row);
        }

        let (best, best_ratio) = results
            .iter()
            .filter(|c| c.ratio > 1.0)
            .max_by(|a, b| compare_candidates(a, b))
            .map(|c| (c.encoding, c.ratio))
            .unwrap_or((Encoding::None, 1.0));

        EstimateReport {
            best,
            best_ratio,
            candidates: results,
        }
    }
}

/// Higher ratio wins; on a tie the lighter encoding is "greater".
fn compare_candidates(a: &CandidateRatio, b: &CandidateRatio) -> Ordering {
    a.ratio.total_cmp(&b.ratio).then_with(|| {
        b.encoding
            .cpu_overhead_rank()
            .cmp(&a.encoding.cpu_overhead_rank())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use strata_core::metrics::WriteCounters;
    use strata_core::model::Scope;
    use strata_core::port::Statement;
    use strata_core::types::ObjectType;

    /// Minimal port: fixed ratios, anything else unsupported.
    struct RatioPort(HashMap<Encoding, f64>);

    impl DatabasePort for RatioPort {
        fn list_objects(&self, _: &Scope) -> Result<Vec<ObjectRef>, PortError> {
            Ok(vec![])
        }
        fn object_metrics(&self, _: &ObjectRef) -> Result<Option<ObjectMetrics>, PortError> {
            Ok(None)
        }
        fn modification_counters(
            &self,
            _: &ObjectRef,
            _: Duration,
        ) -> Result<Option<WriteCounters>, PortError> {
            Ok(None)
        }
        fn estimate_ratio(
            &self,
            _: &ObjectRef,
            encoding: Encoding,
            _: u64,
        ) -> Result<RatioEstimate, PortError> {
            self.0
                .get(&encoding)
                .map(|r| RatioEstimate {
                    ratio: *r,
                    compressed_size_estimate: (1000.0 / r) as u64,
                })
                .ok_or_else(|| PortError::Unsupported(format!("{encoding} not licensed")))
        }
        fn execute_statement(&self, _: &Statement) -> Result<(), PortError> {
            Ok(())
        }
        fn rollback(&self, _: &Statement) -> Result<(), PortError> {
            Ok(())
        }
        fn conflicting_lock(&self, _: &ObjectRef) -> Result<Option<String>, PortError> {
            Ok(None)
        }
        fn free_space_bytes(&self, _: &str) -> Result<u64, PortError> {
            Ok(u64::MAX)
        }
    }

    fn table_metrics() -> ObjectMetrics {
        ObjectMetrics {
            object: ObjectRef::table("SH", "SALES"),
            size_bytes: 1000,
            row_count: 10,
            block_count: 1,
            write: None,
            read: None,
            current_encoding: Encoding::None,
            storage_area: "USERS".into(),
            partitions: vec![],
        }
    }

    #[test]
    fn picks_highest_ratio() {
        let port = RatioPort(HashMap::from([
            (Encoding::Oltp, 1.8),
            (Encoding::QueryHigh, 4.2),
            (Encoding::ArchiveHigh, 3.9),
        ]));
        let m = table_metrics();
        let rep = Estimator::new(1000).estimate(&port, &m, Encoding::candidates_for(&ObjectType::Table));
        assert_eq!(rep.best, Encoding::QueryHigh);
        assert_eq!(rep.best_ratio, 4.2);
        // untested candidates are still reported, at 1.0
        let basic = rep.candidates.iter().find(|c| c.encoding == Encoding::Basic).unwrap();
        assert!(!basic.tested);
        assert_eq!(basic.ratio, 1.0);
        assert!(basic.note.as_deref().unwrap().contains("not licensed"));
    }

    #[test]
    fn ties_prefer_lighter_encoding() {
        let port = RatioPort(HashMap::from([
            (Encoding::ArchiveHigh, 3.0),
            (Encoding::QueryLow, 3.0),
            (Encoding::QueryHigh, 3.0),
        ]));
        let rep = Estimator::new(1000).estimate(
            &port,
            &table_metrics(),
            Encoding::candidates_for(&ObjectType::Table),
        );
        assert_eq!(rep.best, Encoding::QueryLow);
    }

    #[test]
    fn nothing_worthwhile_yields_none() {
        let port = RatioPort(HashMap::from([(Encoding::Oltp, 1.0), (Encoding::QueryLow, 1.0)]));
        let rep = Estimator::new(1000).estimate(
            &port,
            &table_metrics(),
            Encoding::candidates_for(&ObjectType::Table),
        );
        assert_eq!(rep.best, Encoding::None);
        assert_eq!(rep.best_ratio, 1.0);
        assert_eq!(rep.ratio_for(Encoding::Oltp), Some(1.0));
    }

    #[test]
    fn inapplicable_candidates_skipped() {
        let port = RatioPort(HashMap::from([(Encoding::LobHigh, 5.0)]));
        let rep = Estimator::new(1000).estimate(&port, &table_metrics(), &[Encoding::LobHigh]);
        assert!(rep.candidates.is_empty());
        assert_eq!(rep.best, Encoding::None);
    }

    #[test]
    fn invalid_ratio_is_untestable() {
        let port = RatioPort(HashMap::from([(Encoding::Oltp, f64::NAN)]));
        let m = table_metrics();
        let err = Estimator::new(10).probe(&port, &m.object, Encoding::Oltp).unwrap_err();
        assert!(matches!(err, PortError::Unsupported(_)));
    }
}
