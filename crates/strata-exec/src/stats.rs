//! Read-only reports over the store and the live catalog.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task;

use strata_core::metrics::ObjectMetrics;
use strata_core::model::{ExecutionRecord, Recommendation};
use strata_core::types::ObjectRef;
use strata_store::{CompressionStatistics, HistoryFilter, RecommendationFilter};

use crate::error::{AdvisorError, Result};
use crate::runtime::Advisor;

/// Everything known about one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub object: ObjectRef,
    /// Live metrics; `None` once the object has been dropped.
    pub metrics: Option<ObjectMetrics>,
    /// Newest recommendation per strategy, largest savings first.
    pub recommendations: Vec<Recommendation>,
    /// Newest first.
    pub executions: Vec<ExecutionRecord>,
}

impl TableStatistics {
    /// Bytes saved by the successful applies recorded for this object.
    pub fn realized_savings_bytes(&self) -> u64 {
        self.executions
            .iter()
            .map(ExecutionRecord::savings_bytes)
            .fold(0u64, u64::saturating_add)
    }
}

impl Advisor {
    /// `getCompressionStatistics()`.
    pub fn compression_statistics(&self) -> Result<CompressionStatistics> {
        Ok(self.store.compression_statistics()?)
    }

    /// `getTableStatistics(owner, name)`: live metrics plus the recorded
    /// recommendations and executions. Unknown objects are `NotFound`.
    pub async fn table_statistics(&self, object: &ObjectRef) -> Result<TableStatistics> {
        let port = Arc::clone(&self.port);
        let target = object.clone();
        let metrics = task::spawn_blocking(move || port.object_metrics(&target)).await??;

        let key = object.key();
        let mut recommendations = self.store.query(&RecommendationFilter {
            owner: Some(object.owner.clone()),
            actionable_only: false,
            limit: None,
            ..RecommendationFilter::default()
        })?;
        recommendations.retain(|r| r.object.key() == key);

        let mut executions = self.store.history(&HistoryFilter {
            owner: Some(object.owner.clone()),
            ..HistoryFilter::default()
        })?;
        executions.retain(|r| r.object.key() == key);

        if metrics.is_none() && recommendations.is_empty() && executions.is_empty() {
            return Err(AdvisorError::NotFound(object.to_string()));
        }
        Ok(TableStatistics {
            object: object.clone(),
            metrics,
            recommendations,
            executions,
        })
    }
}
