//! Concurrent fan-out of one batch into independently retried attempts

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::{AppError, Result};
use crate::orchestrator::progress::BatchProgress;
use crate::orchestrator::retry::RetryPolicy;
use crate::provider::{ImageProvider, ProviderRequest};

/// How often the time-based progress estimate is refreshed
const PROGRESS_TICK: Duration = Duration::from_millis(500);

/// A batch that produced at least one image
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Successful image references in attempt order
    pub images: Vec<String>,
    pub requested: u32,
}

impl BatchResult {
    pub fn delivered(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn is_partial(&self) -> bool {
        self.delivered() < self.requested
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    policy: RetryPolicy,
    stagger: Duration,
}

impl Dispatcher {
    pub fn new(policy: RetryPolicy, stagger: Duration) -> Self {
        Self { policy, stagger }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            RetryPolicy::from_config(config),
            Duration::from_millis(config.stagger_ms),
        )
    }

    /// Run `count` attempts of `request` and wait for all of them to settle.
    ///
    /// Attempt `i` starts after `i * stagger`. Each attempt asks for one
    /// image with its own random seed. Fails only when no attempt succeeds,
    /// with the first error that came back. Settles feed the current phase
    /// of `progress`; closing the batch is left to the caller.
    pub async fn dispatch(
        &self,
        provider: Arc<dyn ImageProvider>,
        request: &ProviderRequest,
        count: u32,
        progress: &BatchProgress,
    ) -> Result<BatchResult> {
        let mut pending: FuturesUnordered<_> = (0..count as usize)
            .map(|index| {
                let provider = provider.clone();
                let policy = self.policy.clone();
                let delay = self.stagger * index as u32;
                let mut attempt = request.clone();
                attempt.n = 1;
                attempt.seed = Some(rand::random::<u32>() as u64);

                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let report = policy.run(provider.as_ref(), &attempt, index).await;
                    (index, report)
                }
            })
            .collect();

        let mut slots: Vec<Option<String>> = vec![None; count as usize];
        let mut first_error: Option<AppError> = None;
        let mut failures = 0u32;

        let mut ticker = tokio::time::interval(PROGRESS_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                settled = pending.next() => {
                    let Some((index, report)) = settled else { break };
                    progress.settle(index);
                    match report.result {
                        Ok(image) => {
                            debug!(attempt = index, sends = report.sends, "Attempt settled with image");
                            slots[index] = Some(image);
                        }
                        Err(e) => {
                            failures += 1;
                            first_error.get_or_insert(e);
                        }
                    }
                }
                _ = ticker.tick() => progress.tick(),
            }
        }

        let images: Vec<String> = slots.into_iter().flatten().collect();
        if images.is_empty() {
            let error = first_error
                .unwrap_or_else(|| AppError::ProviderFailed("No images were generated".to_string()));
            warn!(provider = %provider.name(), requested = count, error = %error, "Batch produced no images");
            return Err(error);
        }

        info!(
            provider = %provider.name(),
            requested = count,
            delivered = images.len(),
            failures,
            "Batch settled"
        );
        Ok(BatchResult {
            images,
            requested: count,
        })
    }
}
