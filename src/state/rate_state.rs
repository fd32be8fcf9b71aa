use std::time::{Duration, Instant};

/// Smallest amount a bound grows by on a failure, so a zero floor still widens
pub const MIN_WIDEN_STEP: Duration = Duration::from_millis(500);

/// Tracks the adaptive request pacing of one source
///
/// The delay window `[lower, upper]` starts at the configured
/// `[floor, ceiling]`, widens after every block or network failure and decays
/// back after a streak of successes. `lower` never drops below `floor`.
#[derive(Debug, Clone)]
pub struct RateState {
    /// When the latest reserved request slot fires
    pub last_request_at: Option<Instant>,

    /// Current lower bound of the delay window
    pub lower: Duration,

    /// Current upper bound of the delay window
    pub upper: Duration,

    /// Failures since the last decay, decremented by each success
    pub consecutive_failures: u32,

    /// Successes since the last failure or decay
    pub consecutive_successes: u32,

    floor: Duration,
    ceiling: Duration,
}

impl RateState {
    /// Creates a state whose window is the configured `[floor, ceiling]`
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            last_request_at: None,
            lower: floor,
            upper: ceiling,
            consecutive_failures: 0,
            consecutive_successes: 0,
            floor,
            ceiling,
        }
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Returns the current `(lower, upper)` delay window
    pub fn bounds(&self) -> (Duration, Duration) {
        (self.lower, self.upper)
    }

    /// Returns true if the window is wider than the configured one
    pub fn is_widened(&self) -> bool {
        self.lower > self.floor || self.upper > self.ceiling
    }

    /// Records a successful fetch
    ///
    /// Once `threshold` consecutive successes are seen, both bounds are
    /// divided by `factor` (the lower bound clamped at the floor, the upper
    /// at the ceiling) and the streak restarts.
    ///
    /// # Returns
    ///
    /// `true` if the window decayed on this call
    pub fn record_success(&mut self, threshold: u32, factor: f64) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_sub(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);

        if self.consecutive_successes < threshold.max(1) {
            return false;
        }

        self.consecutive_successes = 0;
        self.lower = scale(self.lower, 1.0 / factor).max(self.floor);
        self.upper = scale(self.upper, 1.0 / factor)
            .max(self.ceiling)
            .max(self.lower);
        true
    }

    /// Records a block or network failure
    ///
    /// Both bounds are multiplied by `factor`, growing by at least
    /// [`MIN_WIDEN_STEP`], and capped at `max_delay` (or the ceiling, if that
    /// is larger).
    pub fn record_failure(&mut self, factor: f64, max_delay: Duration) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;

        let cap = max_delay.max(self.ceiling);
        self.lower = widen(self.lower, factor).min(cap);
        self.upper = widen(self.upper, factor).min(cap).max(self.lower);
    }

    /// Reserves the next request slot `delay` after the later of `now` and
    /// the previously reserved slot
    ///
    /// # Returns
    ///
    /// How long the caller has to wait from `now`
    pub fn reserve(&mut self, now: Instant, delay: Duration) -> Duration {
        let start = match self.last_request_at {
            Some(last) if last > now => last,
            _ => now,
        };
        let slot = start + delay;
        self.last_request_at = Some(slot);
        slot.duration_since(now)
    }
}

fn scale(d: Duration, factor: f64) -> Duration {
    Duration::from_secs_f64((d.as_secs_f64() * factor).max(0.0))
}

fn widen(d: Duration, factor: f64) -> Duration {
    let grown = d.as_secs_f64() * factor;
    let stepped = (d + MIN_WIDEN_STEP).as_secs_f64();
    // Guards against an absurd factor overflowing Duration
    Duration::from_secs_f64(grown.max(stepped).min(u32::MAX as f64))
}
