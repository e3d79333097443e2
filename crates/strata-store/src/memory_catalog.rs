//! Simulated database engine.
//!
//! Holds a catalog of objects with their metrics, DML counters, per-encoding
//! ratios, locks, and injected statement faults. Statements "apply" by
//! rewriting the object's encoding and size; a configurable delay stands in
//! for long-running rebuilds so timeouts and cancellation can be exercised.
//!
//! Used by the test suites and by the CLI's `--catalog` mode.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use strata_core::metrics::{ObjectMetrics, RatioEstimate, ReadCounters, WriteCounters};
use strata_core::model::Scope;
use strata_core::port::{DatabasePort, PortError, Statement};
use strata_core::types::{Encoding, ObjectRef};

use crate::error::Result;

/// Injected failure for storage-change statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementFault {
    /// Fails before touching anything.
    Reject { message: String },
    /// Changes storage, then fails; rollback restores the previous state.
    FailAfterApply { message: String },
    /// Changes storage, then fails; rollback cannot restore it.
    Irreversible { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogRatio {
    pub encoding: Encoding,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub metrics: ObjectMetrics,
    /// Windowed counters; `None` falls back to the ones in `metrics`.
    #[serde(default)]
    pub modifications: Option<WriteCounters>,
    /// Encodings missing here are reported as unsupported by the estimator.
    #[serde(default)]
    pub ratios: Vec<CatalogRatio>,
    #[serde(default)]
    pub lock_holder: Option<String>,
    #[serde(default)]
    pub fault: Option<StatementFault>,
    /// Make the counter lookup fail with this message.
    #[serde(default)]
    pub counter_error: Option<String>,
}

impl CatalogObject {
    pub fn new(object: ObjectRef, size_bytes: u64) -> Self {
        Self {
            metrics: ObjectMetrics {
                object,
                size_bytes,
                row_count: size_bytes / 100,
                block_count: size_bytes / 8192,
                write: None,
                read: None,
                current_encoding: Encoding::None,
                storage_area: "USERS".to_string(),
                partitions: Vec::new(),
            },
            modifications: None,
            ratios: Vec::new(),
            lock_holder: None,
            fault: None,
            counter_error: None,
        }
    }

    pub fn table(owner: &str, name: &str, size_bytes: u64) -> Self {
        Self::new(ObjectRef::table(owner, name), size_bytes)
    }

    pub fn index(owner: &str, name: &str, size_bytes: u64) -> Self {
        Self::new(ObjectRef::index(owner, name), size_bytes)
    }

    pub fn lob(owner: &str, table: &str, column: &str, size_bytes: u64) -> Self {
        Self::new(ObjectRef::lob(owner, table, column), size_bytes)
    }

    pub fn ratio(mut self, encoding: Encoding, ratio: f64) -> Self {
        self.ratios.retain(|r| r.encoding != encoding);
        self.ratios.push(CatalogRatio { encoding, ratio });
        self
    }

    /// Same ratio for every candidate of the object's type.
    pub fn flat_ratio(mut self, ratio: f64) -> Self {
        for &enc in Encoding::candidates_for(&self.metrics.object.object_type) {
            self = self.ratio(enc, ratio);
        }
        self
    }

    pub fn writes(mut self, inserts: u64, updates: u64, deletes: u64) -> Self {
        self.metrics.write = Some(WriteCounters {
            inserts,
            updates,
            deletes,
        });
        self
    }

    pub fn reads(mut self, logical_reads: u64, physical_reads: u64) -> Self {
        self.metrics.read = Some(ReadCounters {
            logical_reads,
            physical_reads,
        });
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.metrics.current_encoding = encoding;
        self
    }

    pub fn area(mut self, area: &str) -> Self {
        self.metrics.storage_area = area.to_string();
        self
    }

    pub fn partitions(mut self, names: &[&str]) -> Self {
        self.metrics.partitions = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn fault(mut self, fault: StatementFault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn locked_by(mut self, session: &str) -> Self {
        self.lock_holder = Some(session.to_string());
        self
    }

    fn ratio_for(&self, encoding: Encoding) -> Option<f64> {
        self.ratios
            .iter()
            .find(|r| r.encoding == encoding)
            .map(|r| r.ratio)
    }
}

/// Serializable form of a whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub objects: Vec<CatalogObject>,
    /// Free bytes per storage area; areas not listed are unlimited.
    pub free_space: BTreeMap<String, u64>,
    pub statement_delay_ms: u64,
}

#[derive(Default)]
struct CatalogState {
    objects: BTreeMap<String, CatalogObject>,
    free_space: BTreeMap<String, u64>,
    statement_delay: Duration,
    unreachable: bool,
    /// Objects whose running statement has been asked to roll back.
    cancelled: HashSet<String>,
    /// Pre-change (encoding, size) for statements that may still roll back.
    undo: HashMap<String, (Encoding, u64)>,
    executed: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let cat = Self::new();
        if let Ok(mut st) = cat.state.lock() {
            for obj in snapshot.objects {
                st.objects.insert(obj.metrics.object.key(), obj);
            }
            st.free_space = snapshot.free_space;
            st.statement_delay = Duration::from_millis(snapshot.statement_delay_ms);
        }
        cat
    }

    pub fn from_json(src: &str) -> Result<Self> {
        Ok(Self::from_snapshot(serde_json::from_str(src)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let src = std::fs::read_to_string(path)?;
        Self::from_json(&src)
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        match self.state.lock() {
            Ok(st) => CatalogSnapshot {
                objects: st.objects.values().cloned().collect(),
                free_space: st.free_space.clone(),
                statement_delay_ms: st.statement_delay.as_millis() as u64,
            },
            Err(_) => CatalogSnapshot::default(),
        }
    }

    /// Persist the current state (including applied changes).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, CatalogState>, PortError> {
        self.state
            .lock()
            .map_err(|_| PortError::Transient("catalog lock poisoned".into()))
    }

    fn reachable(&self) -> std::result::Result<MutexGuard<'_, CatalogState>, PortError> {
        let st = self.lock()?;
        if st.unreachable {
            return Err(PortError::Unreachable("simulated outage".into()));
        }
        Ok(st)
    }

    pub fn insert(&self, obj: CatalogObject) {
        if let Ok(mut st) = self.state.lock() {
            st.objects.insert(obj.metrics.object.key(), obj);
        }
    }

    pub fn with(self, obj: CatalogObject) -> Self {
        self.insert(obj);
        self
    }

    pub fn set_free_space(&self, area: &str, bytes: u64) {
        if let Ok(mut st) = self.state.lock() {
            st.free_space.insert(area.to_string(), bytes);
        }
    }

    pub fn set_statement_delay(&self, delay: Duration) {
        if let Ok(mut st) = self.state.lock() {
            st.statement_delay = delay;
        }
    }

    pub fn set_unreachable(&self, down: bool) {
        if let Ok(mut st) = self.state.lock() {
            st.unreachable = down;
        }
    }

    pub fn set_lock(&self, object: &ObjectRef, holder: Option<&str>) {
        if let Ok(mut st) = self.state.lock() {
            if let Some(o) = st.objects.get_mut(&object.key()) {
                o.lock_holder = holder.map(str::to_string);
            }
        }
    }

    pub fn set_fault(&self, object: &ObjectRef, fault: Option<StatementFault>) {
        if let Ok(mut st) = self.state.lock() {
            if let Some(o) = st.objects.get_mut(&object.key()) {
                o.fault = fault;
            }
        }
    }

    /// Statement texts that ran to completion, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|st| st.executed.clone())
            .unwrap_or_default()
    }

    pub fn metrics(&self, object: &ObjectRef) -> Option<ObjectMetrics> {
        self.state
            .lock()
            .ok()
            .and_then(|st| st.objects.get(&object.key()).map(|o| o.metrics.clone()))
    }

    fn apply_change(st: &mut CatalogState, key: &str, encoding: Encoding) {
        if let Some(obj) = st.objects.get_mut(key) {
            let before = (obj.metrics.current_encoding, obj.metrics.size_bytes);
            let ratio = obj.ratio_for(encoding).unwrap_or(1.0).max(1.0);
            obj.metrics.size_bytes = (obj.metrics.size_bytes as f64 / ratio) as u64;
            obj.metrics.current_encoding = encoding;
            st.undo.insert(key.to_string(), before);
        }
    }
}

impl DatabasePort for MemoryCatalog {
    fn list_objects(&self, scope: &Scope) -> std::result::Result<Vec<ObjectRef>, PortError> {
        let st = self.reachable()?;
        Ok(st
            .objects
            .values()
            .map(|o| &o.metrics.object)
            .filter(|o| o.partition.is_none() && scope.admits(o))
            .cloned()
            .collect())
    }

    fn object_metrics(&self, object: &ObjectRef) -> std::result::Result<Option<ObjectMetrics>, PortError> {
        let st = self.reachable()?;
        Ok(st.objects.get(&object.key()).map(|o| o.metrics.clone()))
    }

    fn modification_counters(
        &self,
        object: &ObjectRef,
        _window: Duration,
    ) -> std::result::Result<Option<WriteCounters>, PortError> {
        let st = self.reachable()?;
        match st.objects.get(&object.key()) {
            Some(o) => match &o.counter_error {
                Some(msg) => Err(PortError::Privilege(msg.clone())),
                None => Ok(o.modifications),
            },
            None => Ok(None),
        }
    }

    fn estimate_ratio(
        &self,
        object: &ObjectRef,
        encoding: Encoding,
        _sample_rows: u64,
    ) -> std::result::Result<RatioEstimate, PortError> {
        let st = self.reachable()?;
        let obj = st
            .objects
            .get(&object.key())
            .ok_or_else(|| PortError::Statement(format!("{object} does not exist")))?;
        let ratio = obj
            .ratio_for(encoding)
            .ok_or_else(|| PortError::Unsupported(format!("{encoding} not available for {object}")))?;
        Ok(RatioEstimate {
            ratio,
            compressed_size_estimate: (obj.metrics.size_bytes as f64 / ratio.max(f64::MIN_POSITIVE)) as u64,
        })
    }

    fn execute_statement(&self, statement: &Statement) -> std::result::Result<(), PortError> {
        let key = statement.target.key();
        let delay = {
            let mut st = self.reachable()?;
            let obj = st
                .objects
                .get(&key)
                .ok_or_else(|| PortError::Statement(format!("{} does not exist", statement.target)))?;
            if let Some(StatementFault::Reject { message }) = &obj.fault {
                return Err(PortError::Statement(message.clone()));
            }
            st.cancelled.remove(&key);
            st.undo.remove(&key);
            st.statement_delay
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut st = self.reachable()?;
        if st.cancelled.remove(&key) {
            return Err(PortError::Statement("statement cancelled".into()));
        }
        let fault = st.objects.get(&key).and_then(|o| o.fault.clone());
        Self::apply_change(&mut st, &key, statement.encoding);
        match fault {
            Some(StatementFault::FailAfterApply { message }) | Some(StatementFault::Irreversible { message }) => {
                Err(PortError::Statement(message))
            }
            _ => {
                st.undo.remove(&key);
                st.executed.push(statement.text.clone());
                Ok(())
            }
        }
    }

    fn rollback(&self, statement: &Statement) -> std::result::Result<(), PortError> {
        let key = statement.target.key();
        let mut st = self.reachable()?;
        st.cancelled.insert(key.clone());
        let irreversible = matches!(
            st.objects.get(&key).and_then(|o| o.fault.as_ref()),
            Some(StatementFault::Irreversible { .. })
        );
        if irreversible {
            return Err(PortError::Statement("rollback failed: segment already rewritten".into()));
        }
        if let Some((encoding, size)) = st.undo.remove(&key) {
            if let Some(obj) = st.objects.get_mut(&key) {
                obj.metrics.current_encoding = encoding;
                obj.metrics.size_bytes = size;
            }
        }
        Ok(())
    }

    fn conflicting_lock(&self, object: &ObjectRef) -> std::result::Result<Option<String>, PortError> {
        let st = self.reachable()?;
        Ok(st.objects.get(&object.key()).and_then(|o| o.lock_holder.clone()))
    }

    fn free_space_bytes(&self, storage_area: &str) -> std::result::Result<u64, PortError> {
        let st = self.reachable()?;
        Ok(st.free_space.get(storage_area).copied().unwrap_or(u64::MAX))
    }
}
