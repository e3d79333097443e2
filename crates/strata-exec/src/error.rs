use thiserror::Error;

use strata_core::port::PortError;
use strata_rules::RuleError;
use strata_store::StoreError;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error(transparent)]
    Core(#[from] strata_core::error::Error),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("worker task failed: {0}")]
    Join(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("advisor is shutting down")]
    Closed,
}

impl From<tokio::task::JoinError> for AdvisorError {
    fn from(e: tokio::task::JoinError) -> Self {
        AdvisorError::Join(e.to_string())
    }
}
