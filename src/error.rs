use thiserror::Error;

#[derive(Error, Debug)]
pub enum EarnWatchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid payout rate: {0}")]
    InvalidRate(String),

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EarnWatchError {
    /// True when the remote service never answered within the retry budget.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, EarnWatchError::RetryExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, EarnWatchError>;
