//! Execution safety pipeline.
//!
//! `PENDING → PRECHECK → DRY_RUN → SUCCEEDED` for dry runs, and
//! `PENDING → PRECHECK → APPLYING → SUCCEEDED | FAILED [→ ROLLED_BACK]` for
//! real ones. Every path ends in a finalized record.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinHandle};
use tokio::time::timeout;
use tracing::{error, info, warn};

use strata_core::id::RecommendationId;
use strata_core::metrics::ObjectMetrics;
use strata_core::model::{ExecState, ExecutionDraft, ExecutionOutcome, ExecutionRecord, Recommendation};
use strata_core::port::{DatabasePort, PortError};
use strata_ddl::{generate, DdlOptions, DdlStatement};

use crate::error::{AdvisorError, Result};
use crate::lease::ExecutionLease;
use crate::runtime::Advisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    /// Validate only. Real changes need an explicit `false`.
    pub dry_run: bool,
    pub online: bool,
    pub parallel_degree: Option<u32>,
    /// Overrides the configured statement timeout.
    pub timeout: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            online: false,
            parallel_degree: None,
            timeout: None,
        }
    }
}

impl ExecuteOptions {
    pub fn apply() -> Self {
        Self {
            dry_run: false,
            ..Self::default()
        }
    }

    pub fn ddl_options(&self) -> DdlOptions {
        DdlOptions {
            online: self.online,
            parallel_degree: self.parallel_degree,
        }
    }
}

/// Everything that must hold before a statement may run. Returns the fresh
/// metrics on success and the rejection reason otherwise.
pub fn precheck(
    port: &dyn DatabasePort,
    rec: &Recommendation,
    ddl: &DdlStatement,
    headroom_pct: u64,
) -> std::result::Result<ObjectMetrics, String> {
    if ddl.placeholder {
        return Err(format!("no statement template for {}", rec.object));
    }
    if !rec.is_actionable() {
        return Err(format!(
            "recommendation is not actionable (encoding {}, current {})",
            rec.encoding, rec.current_encoding
        ));
    }
    let metrics = port
        .object_metrics(&rec.object)
        .map_err(|e| format!("metrics lookup failed: {e}"))?
        .ok_or_else(|| "object no longer exists".to_string())?;
    if metrics.current_encoding != rec.current_encoding {
        return Err(format!(
            "object changed since analysis (was {}, now {})",
            rec.current_encoding, metrics.current_encoding
        ));
    }
    if let Some(holder) = port
        .conflicting_lock(&rec.object)
        .map_err(|e| format!("lock check failed: {e}"))?
    {
        return Err(format!("object locked by {holder}"));
    }
    let need = (rec.projected_size_bytes as u128 * (100 + headroom_pct as u128) / 100) as u64;
    let free = port
        .free_space_bytes(&metrics.storage_area)
        .map_err(|e| format!("free space check failed: {e}"))?;
    if free < need {
        return Err(format!(
            "insufficient free space in {}: need {need} bytes, have {free}",
            metrics.storage_area
        ));
    }
    Ok(metrics)
}

impl Advisor {
    /// `execute(recommendationId, dryRun, online, parallelDegree, timeout)`.
    pub async fn execute(&self, id: RecommendationId, opts: ExecuteOptions) -> Result<ExecutionRecord> {
        let rec = self.store.recommendation(id)?;
        self.execute_recommendation(rec, opts).await
    }

    pub(crate) async fn execute_recommendation(
        &self,
        rec: Recommendation,
        opts: ExecuteOptions,
    ) -> Result<ExecutionRecord> {
        let ddl = generate(&rec, &opts.ddl_options());
        let opened = self.store.begin(ExecutionDraft {
            recommendation_id: rec.id,
            object: rec.object.clone(),
            statement: ddl.text().to_string(),
            statement_digest: ddl.digest.clone(),
            dry_run: opts.dry_run,
            online: opts.online,
            encoding_before: rec.current_encoding,
            encoding_target: rec.encoding,
            size_before_bytes: rec.size_bytes,
        })?;
        if !opened.is_open() {
            // another attempt holds the object
            return Ok(opened);
        }
        let lease = ExecutionLease::new(Arc::clone(&self.store), opened.id);
        let _slot = Arc::clone(&self.exec_slots)
            .acquire_owned()
            .await
            .map_err(|_| AdvisorError::Closed)?;

        info!(execution = %opened.id, object = %rec.object, target = %rec.encoding, dry_run = opts.dry_run, "execution started");
        lease.advance(ExecState::Precheck)?;
        let port = Arc::clone(&self.port);
        let headroom = self.cfg.space_headroom_pct;
        let (r, d) = (rec.clone(), ddl.clone());
        let checked = task::spawn_blocking(move || precheck(port.as_ref(), &r, &d, headroom)).await?;
        let metrics = match checked {
            Ok(m) => m,
            Err(reason) => {
                warn!(execution = %opened.id, object = %rec.object, %reason, "precheck rejected");
                return Ok(lease.finish(ExecutionOutcome::failed(format!("precheck: {reason}")))?);
            }
        };

        if opts.dry_run {
            lease.advance(ExecState::DryRun)?;
            return Ok(lease.finish(ExecutionOutcome::succeeded(Some(metrics.size_bytes)))?);
        }

        lease.advance(ExecState::Applying)?;
        let limit = opts.timeout.unwrap_or_else(|| self.cfg.statement_timeout());
        let port = Arc::clone(&self.port);
        let stmt = ddl.statement.clone();
        let mut running = task::spawn_blocking(move || port.execute_statement(&stmt));
        let failure = match timeout(limit, &mut running).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(format!("statement failed: {e}")),
            Ok(Err(e)) => Some(format!("statement task failed: {e}")),
            Err(_) => {
                let reason = format!("statement timed out after {}ms", limit.as_millis());
                self.cancel_and_wait(&rec, &ddl, running, &reason).await;
                Some(reason)
            }
        };

        match failure {
            None => {
                let after = self.refetch(&rec).await;
                info!(execution = %opened.id, object = %rec.object, size_after = ?after, "execution succeeded");
                Ok(lease.finish(ExecutionOutcome::succeeded(after))?)
            }
            Some(reason) => self.roll_back(lease, &rec, &ddl, reason).await,
        }
    }

    /// Ask the engine to abandon a statement that overran its timeout, then
    /// wait for it to actually return. The record stays open meanwhile, so the
    /// object cannot be claimed by another attempt while it is still running.
    async fn cancel_and_wait(
        &self,
        rec: &Recommendation,
        ddl: &DdlStatement,
        running: JoinHandle<std::result::Result<(), PortError>>,
        reason: &str,
    ) {
        warn!(object = %rec.object, %reason, "cancelling statement; waiting for it to stop");
        let port = Arc::clone(&self.port);
        let stmt = ddl.statement.clone();
        match task::spawn_blocking(move || port.rollback(&stmt)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(object = %rec.object, error = %e, "cancel request failed"),
            Err(e) => warn!(object = %rec.object, error = %e, "cancel task failed"),
        }
        match running.await {
            Ok(Ok(())) => warn!(object = %rec.object, "statement completed after its timeout"),
            Ok(Err(e)) => info!(object = %rec.object, error = %e, "statement stopped"),
            Err(e) => warn!(object = %rec.object, error = %e, "statement task failed"),
        }
    }

    async fn refetch(&self, rec: &Recommendation) -> Option<u64> {
        let port = Arc::clone(&self.port);
        let object = rec.object.clone();
        match task::spawn_blocking(move || port.object_metrics(&object)).await {
            Ok(Ok(Some(m))) => Some(m.size_bytes),
            _ => None,
        }
    }

    /// Undo a failed apply and record whether the object is verifiably back
    /// where it started.
    async fn roll_back(
        &self,
        lease: ExecutionLease,
        rec: &Recommendation,
        ddl: &DdlStatement,
        reason: String,
    ) -> Result<ExecutionRecord> {
        error!(execution = %lease.id(), object = %rec.object, %reason, "apply failed; rolling back");
        lease.advance(ExecState::Failed)?;

        let port = Arc::clone(&self.port);
        let stmt = ddl.statement.clone();
        let (undo, now) = task::spawn_blocking(move || {
            let undo = port.rollback(&stmt);
            let now = port.object_metrics(&stmt.target);
            (undo, now)
        })
        .await?;

        let detail = match (&undo, &now) {
            (Ok(()), Ok(Some(m))) if m.current_encoding == rec.current_encoding => None,
            (Err(e), _) => Some(format!("rollback failed: {e}")),
            (Ok(()), Ok(Some(m))) => Some(format!("rollback unverified: object is now {}", m.current_encoding)),
            (Ok(()), Ok(None)) => Some("rollback unverified: object not found".to_string()),
            (Ok(()), Err(e)) => Some(format!("rollback unverified: {e}")),
        };
        match detail {
            None => {
                warn!(execution = %lease.id(), object = %rec.object, "rolled back");
                Ok(lease.finish(ExecutionOutcome::rolled_back(reason))?)
            }
            Some(detail) => {
                error!(execution = %lease.id(), object = %rec.object, %detail, "object state after failure unknown");
                Ok(lease.finish(ExecutionOutcome::failed(format!("{reason}; {detail}")))?)
            }
        }
    }
}
