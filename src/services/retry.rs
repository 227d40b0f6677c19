use crate::error::{EarnWatchError, Result};
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a constant wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 attempts, 30 seconds apart.
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The last error is folded into [`EarnWatchError::RetryExhausted`].
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded on attempt {}", name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        "{} failed after {} attempts: {}",
                        name,
                        attempt,
                        e
                    );
                    return Err(EarnWatchError::RetryExhausted {
                        operation: name.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}, retrying in {:?}",
                        name,
                        attempt,
                        self.max_attempts,
                        e,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
