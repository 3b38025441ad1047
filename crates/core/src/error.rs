use thiserror::Error;

pub type InsightsResult<T> = Result<T, InsightsError>;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The ads platform answered with a non-success status. `payload` is the
    /// raw error body so callers can surface it for diagnostics.
    #[error("Upstream error (HTTP {status}): {payload}")]
    Upstream {
        status: u16,
        payload: serde_json::Value,
    },

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl InsightsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for failures that originate outside this process (network,
    /// auth, rate limiting, truncated pagination).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Transport(_) | Self::Pagination(_)
        )
    }
}
