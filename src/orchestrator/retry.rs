//! Per-attempt retry loop with backoff and a hard send timeout

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::{AppError, Result};
use crate::provider::{ImageProvider, ProviderRequest};

/// Lifecycle of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Sending,
    RetryScheduled,
    Succeeded,
    Failed,
}

/// How a settled attempt ended
#[derive(Debug)]
pub struct AttemptReport {
    /// One image reference, or the error that ended the attempt
    pub result: Result<String>,
    /// Number of provider calls made
    pub sends: u32,
    /// Every state entered, starting with `Idle`
    pub history: Vec<AttemptState>,
}

impl AttemptReport {
    pub fn final_state(&self) -> AttemptState {
        self.history.last().copied().unwrap_or(AttemptState::Idle)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }

    /// Wait before send number `sends + 1`: `base * 2^(sends - 1)`
    pub fn delay_after(&self, sends: u32) -> Duration {
        let exponent = sends.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Drive one attempt to `Succeeded` or `Failed`
    pub async fn run(&self, provider: &dyn ImageProvider, request: &ProviderRequest, index: usize) -> AttemptReport {
        let mut history = vec![AttemptState::Idle];
        let mut sends = 0;

        loop {
            history.push(AttemptState::Sending);
            sends += 1;
            debug!(provider = %provider.name(), attempt = index, send = sends, "Sending attempt");

            let error = match tokio::time::timeout(self.attempt_timeout, provider.generate(request)).await {
                Ok(Ok(images)) => match images.into_iter().next() {
                    Some(image) => {
                        history.push(AttemptState::Succeeded);
                        debug!(provider = %provider.name(), attempt = index, sends, "Attempt succeeded");
                        return AttemptReport {
                            result: Ok(image),
                            sends,
                            history,
                        };
                    }
                    None => AppError::ProviderFailed("Provider returned no images".to_string()),
                },
                Ok(Err(e)) => e,
                Err(_) => AppError::Timeout(format!(
                    "No response within {}s",
                    self.attempt_timeout.as_secs()
                )),
            };

            if !error.is_retryable() || sends >= self.max_attempts {
                history.push(AttemptState::Failed);
                warn!(
                    provider = %provider.name(),
                    attempt = index,
                    sends,
                    class = ?error.class(),
                    error = %error,
                    "Attempt failed"
                );
                return AttemptReport {
                    result: Err(error),
                    sends,
                    history,
                };
            }

            let delay = self.delay_after(sends);
            history.push(AttemptState::RetryScheduled);
            debug!(
                provider = %provider.name(),
                attempt = index,
                sends,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retry scheduled"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
