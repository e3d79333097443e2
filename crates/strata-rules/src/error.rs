use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuleError>;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("strategy '{0}' not found")]
    UnknownStrategy(String),

    #[error("strategy '{strategy}': {detail}")]
    Invalid { strategy: String, detail: String },

    #[error("strategy '{0}' is referenced by an analysis run and can no longer change")]
    Frozen(String),

    #[error("strategy file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("rule cache lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Core(#[from] strata_core::error::Error),
}

impl RuleError {
    pub(crate) fn invalid(strategy: &str, detail: impl Into<String>) -> Self {
        RuleError::Invalid {
            strategy: strategy.to_string(),
            detail: detail.into(),
        }
    }
}
