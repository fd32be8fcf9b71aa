//! Adaptive per-source rate governor
//!
//! Every source owns a [`RateState`] behind its own lock. Delays are drawn
//! from the source's current window, widened after blocks and decayed after
//! success streaks.

use crate::config::{GovernorConfig, SourceConfig};
use crate::harvest::target::FetchOutcome;
use crate::state::RateState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct RateGovernor {
    config: GovernorConfig,
    states: Mutex<HashMap<String, Arc<Mutex<RateState>>>>,
}

impl RateGovernor {
    /// Creates a governor with one rate state per source
    pub fn new<'a>(
        config: GovernorConfig,
        sources: impl IntoIterator<Item = &'a SourceConfig>,
    ) -> Self {
        let states = sources
            .into_iter()
            .map(|s| {
                (
                    s.name.clone(),
                    Arc::new(Mutex::new(RateState::new(s.delay_floor(), s.delay_ceiling()))),
                )
            })
            .collect();

        Self {
            config,
            states: Mutex::new(states),
        }
    }

    fn state(&self, source: &str) -> Arc<Mutex<RateState>> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states
            .entry(source.to_string())
            .or_insert_with(|| {
                tracing::warn!("Rate state for unknown source '{}' created with no delay", source);
                Arc::new(Mutex::new(RateState::new(Duration::ZERO, Duration::ZERO)))
            })
            .clone()
    }

    /// Reserves the next request slot for `source`
    ///
    /// The delay is drawn uniformly from the current window plus jitter in
    /// `[0, jitter-ms]`, and measured from the later of now and the source's
    /// previous reservation.
    ///
    /// # Returns
    ///
    /// How long the caller should wait before fetching
    pub fn next_delay(&self, source: &str) -> Duration {
        let state = self.state(source);
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());

        let (lower, upper) = state.bounds();
        let drawn = draw_between(lower, upper) + draw_between(Duration::ZERO, self.jitter());
        state.reserve(Instant::now(), drawn)
    }

    /// Feeds the classified result of one fetch attempt back into the window
    pub fn record_outcome(&self, source: &str, outcome: &FetchOutcome) {
        let state = self.state(source);
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());

        match outcome {
            FetchOutcome::Success { .. } => {
                if state.record_success(self.config.success_threshold, self.config.backoff_factor)
                {
                    let (lower, upper) = state.bounds();
                    if state.is_widened() {
                        tracing::debug!(
                            "Source '{}' delay window decayed to {:?}..{:?}",
                            source,
                            lower,
                            upper
                        );
                    } else {
                        tracing::info!(
                            "Source '{}' delay window back to {:?}..{:?}",
                            source,
                            lower,
                            upper
                        );
                    }
                }
            }
            FetchOutcome::Blocked { .. } | FetchOutcome::NetworkFailure { .. } => {
                state.record_failure(
                    self.config.backoff_factor,
                    Duration::from_millis(self.config.max_delay_ms),
                );
                let (lower, upper) = state.bounds();
                tracing::info!(
                    "Source '{}' delay window widened to {:?}..{:?} ({} consecutive failures)",
                    source,
                    lower,
                    upper,
                    state.consecutive_failures
                );
            }
        }
    }

    /// Copy of the current rate state of `source`
    pub fn snapshot(&self, source: &str) -> Option<RateState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = states.get(source)?;
        let state = state.lock().unwrap_or_else(|e| e.into_inner());
        Some(state.clone())
    }

    fn jitter(&self) -> Duration {
        Duration::from_millis(self.config.jitter_ms)
    }
}

fn draw_between(lower: Duration, upper: Duration) -> Duration {
    let lo = lower.as_millis() as u64;
    let hi = upper.as_millis() as u64;
    if hi <= lo {
        return lower;
    }
    Duration::from_millis(rand::random_range(lo..=hi))
}
