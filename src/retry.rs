//! Bounded retry with a fixed delay for transient network failures

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;
use crate::error::{Result, SyncError};

/// Retry settings for one class of remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Constant wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.import.max_attempts, config.retry_delay())
    }

    /// Run `operation`, retrying only transient network errors.
    ///
    /// Any other error is returned after the first attempt. When every
    /// attempt fails with a network error the last one is returned.
    pub async fn with_retry<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "Retrying {} due to network error: {} (attempt {}/{})",
                        label, err, attempt, self.max_attempts
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!("{} failed after {} attempts: {}", label, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Like [`RetryPolicy::with_retry`] but degrades any failure to `T::default()`
    pub async fn with_retry_or_default<T, F, Fut>(&self, label: &str, operation: F) -> T
    where
        T: Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.with_retry(label, operation).await {
            Ok(value) => value,
            Err(err) => {
                log_degraded(label, &err);
                T::default()
            }
        }
    }
}

fn log_degraded(label: &str, err: &SyncError) {
    match err {
        SyncError::TransientNetwork(_) => {
            warn!("Giving up on {}; continuing with an empty result", label)
        }
        other => warn!("Error while {}: {}; continuing with an empty result", label, other),
    }
}
