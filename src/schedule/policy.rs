//! Poll interval policy: how long to sleep between refresh calls.

use std::time::Duration;

/// Default floor on the delay between polls.
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default cap on the delay between polls.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How the delay between polls evolves over a wait.
///
/// Policies are pure data: they describe the cadence but don't sleep. The
/// [`Schedule`](super::Schedule) turns a policy into concrete tick instants.
///
/// # Examples
///
/// ```rust
/// use statewait::PollPolicy;
/// use std::time::Duration;
///
/// // Start at 500ms and double up to 10s
/// let policy = PollPolicy::exponential(Duration::from_millis(500));
/// assert_eq!(policy.delay_for_poll(0), Duration::from_millis(500));
/// assert_eq!(policy.delay_for_poll(1), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_poll(10), Duration::from_secs(10));
///
/// // A pinned cadence
/// let policy = PollPolicy::fixed(Duration::from_secs(5));
/// assert_eq!(policy.delay_for_poll(3), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PollPolicy {
    backoff: Backoff,
    max_interval: Duration,
    #[cfg_attr(feature = "serde", serde(default))]
    jitter: JitterStrategy,
}

/// The growth rule for poll delays.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Backoff {
    /// The same delay every time.
    Fixed(Duration),
    /// Delay doubles: min * 2^poll.
    Exponential {
        /// Delay after the first poll, and floor for every later one.
        min: Duration,
    },
}

/// Strategy for adding randomness to delays.
///
/// Many waiters started at the same moment (a batch of resources created by
/// one apply) would otherwise poll the remote API in lockstep.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between the floor and the calculated delay.
    Full,
    /// Random delay between the floor and 3x the previous delay.
    Decorrelated,
}

impl PollPolicy {
    /// Delays start at `min` and double after each poll, up to the cap.
    pub fn exponential(min: Duration) -> Self {
        Self {
            backoff: Backoff::Exponential { min },
            max_interval: DEFAULT_MAX_POLL_INTERVAL,
            jitter: JitterStrategy::None,
        }
    }

    /// Poll every `interval`, regardless of how long the wait has run.
    ///
    /// The cap is raised to `interval` if it was lower, so a long pinned
    /// interval is honored as given.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            backoff: Backoff::Fixed(interval),
            max_interval: interval.max(DEFAULT_MAX_POLL_INTERVAL),
            jitter: JitterStrategy::None,
        }
    }

    /// Set the delay floor.
    ///
    /// For exponential backoff this is the first delay; a fixed interval is
    /// raised to `min` if it was shorter.
    pub fn with_min_interval(mut self, min: Duration) -> Self {
        self.backoff = match self.backoff {
            Backoff::Fixed(interval) => Backoff::Fixed(interval.max(min)),
            Backoff::Exponential { .. } => Backoff::Exponential { min },
        };
        self.max_interval = self.max_interval.max(min);
        self
    }

    /// Set the cap on the delay between polls.
    ///
    /// A cap below the floor is raised to the floor.
    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max.max(self.floor());
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// `0.25` means the actual delay lands within ±25% of the calculated one
    /// (still clamped to the floor and the cap).
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays are exact.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(proportion(factor));
        self
    }

    /// Use full jitter: a random delay between the floor and the calculated one.
    ///
    /// **Note**: Requires the `jitter` feature.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Use decorrelated jitter: a random delay between the floor and three
    /// times the previous delay.
    ///
    /// **Note**: Requires the `jitter` feature.
    pub fn with_decorrelated_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Decorrelated;
        self
    }

    /// Get the backoff rule.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Get the delay cap.
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// The smallest delay this policy ever produces.
    pub fn floor(&self) -> Duration {
        match self.backoff {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential { min } => min,
        }
    }

    /// The delay after poll `n` (0-indexed), without jitter.
    pub fn delay_for_poll(&self, n: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential { min } => min.saturating_mul(2u32.saturating_pow(n)),
        };
        base.min(self.max_interval)
    }

    /// The delay after poll `n` with jitter applied.
    pub(crate) fn delay_with_jitter(&self, n: u32, prev_delay: Option<Duration>) -> Duration {
        let base = self.delay_for_poll(n);
        self.jitter
            .apply(base, prev_delay, self.floor(), self.max_interval)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MIN_POLL_INTERVAL)
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay, clamping the result to `[floor, cap]`.
    pub fn apply(
        &self,
        base_delay: Duration,
        #[cfg_attr(not(feature = "jitter"), allow(unused_variables))] prev_delay: Option<Duration>,
        floor: Duration,
        cap: Duration,
    ) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let jitter_range = base_millis * proportion(*factor);
                let min = (base_millis - jitter_range).max(0.0);
                let max = base_millis + jitter_range;
                if max <= min {
                    base_delay
                } else {
                    Duration::from_millis(rand::rng().random_range(min..=max) as u64)
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let low = floor.as_millis() as u64;
                let high = base_delay.as_millis() as u64;
                if high <= low {
                    base_delay
                } else {
                    Duration::from_millis(rand::rng().random_range(low..=high))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Decorrelated => {
                use rand::Rng;
                let prev = prev_delay.unwrap_or(base_delay);
                let low = floor.as_millis() as u64;
                let high = prev.as_millis().saturating_mul(3) as u64;
                if high <= low {
                    base_delay
                } else {
                    Duration::from_millis(rand::rng().random_range(low..=high))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Decorrelated => base_delay,
        };

        jittered.clamp(floor.min(cap), cap)
    }
}

/// Clamp a jitter factor to `0.0..=1.0`. NaN and infinities mean no jitter.
fn proportion(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
