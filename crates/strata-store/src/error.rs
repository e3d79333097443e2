use thiserror::Error;

use strata_core::id::{ExecutionId, RunId};
use strata_core::model::ExecState;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("journal I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv export: {0}")]
    Csv(#[from] csv::Error),

    #[error("journal line {line}: {detail}")]
    Corrupt { line: usize, detail: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        id: ExecutionId,
        from: ExecState,
        to: ExecState,
    },

    #[error("{0} is already final")]
    AlreadyFinal(ExecutionId),

    #[error("{0} is already finished")]
    RunFinished(RunId),

    #[error("store lock poisoned")]
    Poisoned,
}
