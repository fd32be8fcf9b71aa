//! Bounded retries with capped exponential backoff
//!
//! Hard blocks stop immediately. Soft blocks and network failures are retried
//! until the source's attempt budget runs out.

use crate::config::{RetryConfig, SourceConfig};
use crate::harvest::detector::{BlockDetector, BlockVerdict};
use crate::harvest::fetcher::{FetchConfig, FetchStrategy};
use crate::harvest::governor::RateGovernor;
use crate::harvest::middleware::StageChain;
use crate::harvest::target::{BlockKind, FetchOutcome, Target};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt budget and backoff bounds for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    pub fn for_source(retry: &RetryConfig, source: &SourceConfig) -> Self {
        Self::new(
            source.max_attempts,
            Duration::from_millis(retry.base_backoff_ms),
            Duration::from_millis(retry.max_backoff_ms),
        )
    }

    /// Backoff before the attempt following `attempt`, without jitter
    ///
    /// `min(base * 2^(attempt - 1), max)`, attempts counting from 1.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// [`backoff_for`](Self::backoff_for) plus uniform jitter in `[0, base / 2]`
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let jitter_cap = (self.base_backoff / 2).as_millis() as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::random_range(0..=jitter_cap)
        };
        self.backoff_for(attempt) + Duration::from_millis(jitter)
    }
}

/// Runs fetch attempts for a target until it succeeds, hits a hard block or
/// exhausts its policy
pub struct RetryController {
    detector: Arc<BlockDetector>,
    stages: Arc<StageChain>,
    governor: Arc<RateGovernor>,
}

impl RetryController {
    pub fn new(
        detector: Arc<BlockDetector>,
        stages: Arc<StageChain>,
        governor: Arc<RateGovernor>,
    ) -> Self {
        Self {
            detector,
            stages,
            governor,
        }
    }

    /// Fetches `target`, retrying soft blocks and network failures
    ///
    /// Every attempt runs the outcome stages, is classified by the detector
    /// and is reported to the rate governor.
    ///
    /// # Returns
    ///
    /// * `Success` - A clean page, as soon as one arrives
    /// * `Blocked { kind: Hard }` - After the first hard block, with no retry
    /// * `Blocked { kind: Soft }` - When the last allowed attempt was soft-blocked
    /// * `NetworkFailure` - When the last allowed attempt failed in transport
    ///
    /// If `cancel` fires during a backoff the last outcome is returned at once
    /// and no further fetch is issued.
    pub async fn execute(
        &self,
        target: &Target,
        fetcher: &dyn FetchStrategy,
        config: &FetchConfig,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let mut attempt = 1;

        loop {
            let raw = fetcher.fetch(target, config).await;
            let outcome = self.stages.apply(target, raw);

            let outcome = match self.detector.classify(&outcome) {
                BlockVerdict::None => outcome,
                BlockVerdict::Soft => outcome.into_blocked(BlockKind::Soft),
                BlockVerdict::Hard => outcome.into_blocked(BlockKind::Hard),
            };

            self.governor.record_outcome(&target.source, &outcome);

            match &outcome {
                FetchOutcome::Success { .. } => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", target, attempt);
                    }
                    return outcome;
                }
                FetchOutcome::Blocked {
                    kind: BlockKind::Hard,
                    ..
                } => {
                    tracing::warn!("Hard block on {}: {}", target, outcome);
                    return outcome;
                }
                _ if attempt >= policy.max_attempts => {
                    tracing::warn!(
                        "Giving up on {} after {} attempts: {}",
                        target,
                        attempt,
                        outcome
                    );
                    return outcome;
                }
                _ => {}
            }

            let backoff = policy.jittered_backoff(attempt);
            tracing::info!(
                "Attempt {}/{} for {} returned {}; retrying in {:?}",
                attempt,
                policy.max_attempts,
                target,
                outcome,
                backoff
            );

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!("Backoff for {} interrupted by cancellation", target);
                    return outcome;
                }
            }

            attempt += 1;
        }
    }
}
