//! Rule cache: each strategy is loaded, validated, and ordered once, on first
//! use, then shared read-only by every worker.
//!
//! The cache is an ordinary value passed to whoever needs it, so tests can
//! build one over a fixture `RuleSource`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing::debug;

use strata_core::hash::Hash256;
use strata_core::types::ObjectType;

use crate::error::{Result, RuleError};
use crate::strategy::{Rule, Strategy};

/// Where strategies come from (registry, fixture, database table...).
pub trait RuleSource: Send + Sync {
    fn load(&self, strategy: &str) -> Result<Strategy>;
}

/// A validated strategy with rules pre-sorted per object type.
#[derive(Debug)]
pub struct LoadedStrategy {
    pub name: String,
    pub digest: Hash256,
    rules: BTreeMap<ObjectType, Vec<Rule>>,
}

impl LoadedStrategy {
    pub fn from_strategy(strategy: &Strategy) -> Result<Self> {
        strategy.validate()?;
        Ok(Self {
            name: strategy.name.clone(),
            digest: strategy.digest()?,
            rules: strategy.ordered_rules(),
        })
    }

    /// Rules for one object type in evaluation order.
    pub fn rules_for(&self, object_type: &ObjectType) -> &[Rule] {
        self.rules.get(object_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

type Slot = Arc<OnceCell<Arc<LoadedStrategy>>>;

pub struct RuleCache {
    source: Arc<dyn RuleSource>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RuleCache {
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        Self {
            source,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Loaded strategy, fetching it from the source on first use.
    ///
    /// Concurrent first calls for the same strategy load it exactly once; a
    /// failed load leaves the slot empty so a later call can retry.
    pub fn get(&self, strategy: &str) -> Result<Arc<LoadedStrategy>> {
        let slot = {
            let mut slots = self.slots.lock().map_err(|_| RuleError::Poisoned)?;
            Arc::clone(slots.entry(strategy.to_string()).or_default())
        };
        let loaded = slot.get_or_try_init(|| {
            let s = self.source.load(strategy)?;
            let loaded = LoadedStrategy::from_strategy(&s)?;
            debug!(strategy, digest = %loaded.digest.short(), "rules loaded");
            Ok::<_, RuleError>(Arc::new(loaded))
        })?;
        Ok(Arc::clone(loaded))
    }

    pub fn is_loaded(&self, strategy: &str) -> bool {
        self.slots
            .lock()
            .map(|s| s.get(strategy).map_or(false, |c| c.get().is_some()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use strata_core::types::Encoding;

    struct CountingSource {
        loads: AtomicUsize,
    }

    impl RuleSource for CountingSource {
        fn load(&self, strategy: &str) -> Result<Strategy> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if strategy != "fixture" {
                return Err(RuleError::UnknownStrategy(strategy.to_string()));
            }
            Ok(Strategy::new(
                "fixture",
                "",
                vec![
                    Rule::new(ObjectType::Table, 2, Encoding::Oltp),
                    Rule::new(ObjectType::Table, 1, Encoding::ArchiveHigh),
                ],
            ))
        }
    }

    #[test]
    fn loads_once_and_orders() {
        let src = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let cache = RuleCache::new(src.clone());
        assert!(!cache.is_loaded("fixture"));

        let a = cache.get("fixture").unwrap();
        let b = cache.get("fixture").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(src.loads.load(Ordering::SeqCst), 1);
        assert!(cache.is_loaded("fixture"));

        let prios: Vec<u32> = a.rules_for(&ObjectType::Table).iter().map(|r| r.priority).collect();
        assert_eq!(prios, vec![1, 2]);
        assert!(a.rules_for(&ObjectType::Index).is_empty());
    }

    #[test]
    fn concurrent_first_use_loads_once() {
        let src = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let cache = Arc::new(RuleCache::new(src.clone()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get("fixture").unwrap().digest)
            })
            .collect();
        let digests: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(digests.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(src.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_can_retry() {
        let src = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let cache = RuleCache::new(src.clone());
        assert!(cache.get("missing").is_err());
        assert!(cache.get("missing").is_err());
        assert_eq!(src.loads.load(Ordering::SeqCst), 2);
    }
}
