//! Waiter configuration.

use std::fmt;
use std::time::Duration;

use crate::schedule::PollPolicy;
use crate::state::{StateLabel, StateSet};

/// Default hard deadline for a wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Default time an in-flight refresh may run past the deadline.
pub const DEFAULT_REFRESH_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// The timing half of a [`WaitSpec`].
///
/// Kept separate from the state sets so hosts can load it from
/// configuration (with the `serde` feature) and share it between waits.
///
/// ```rust
/// use statewait::{PollPolicy, WaitTimings};
/// use std::time::Duration;
///
/// let timings = WaitTimings::new(Duration::from_secs(300))
///     .with_initial_delay(Duration::from_secs(5))
///     .with_poll_policy(PollPolicy::fixed(Duration::from_secs(15)));
///
/// assert_eq!(timings.timeout, Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WaitTimings {
    /// Hard deadline for the whole wait, measured from its start.
    pub timeout: Duration,
    /// Sleep before the first poll.
    pub initial_delay: Duration,
    /// Cadence of polls after the first.
    pub poll: PollPolicy,
    /// How long a refresh still running at the deadline may take to return.
    pub refresh_grace_period: Duration,
}

impl WaitTimings {
    /// Default timings with the given deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Set the sleep before the first poll.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Replace the poll cadence.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll = policy;
        self
    }

    /// Set the refresh grace period.
    pub fn with_refresh_grace_period(mut self, grace: Duration) -> Self {
        self.refresh_grace_period = grace;
        self
    }
}

impl Default for WaitTimings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            initial_delay: Duration::ZERO,
            poll: PollPolicy::default(),
            refresh_grace_period: DEFAULT_REFRESH_GRACE_PERIOD,
        }
    }
}

/// What to wait for and how patiently.
///
/// # Examples
///
/// ```rust
/// use statewait::WaitSpec;
/// use std::time::Duration;
///
/// let spec = WaitSpec::new(["CREATING", "BACKING_UP"], ["AVAILABLE"])
///     .with_timeout(Duration::from_secs(40 * 60))
///     .with_min_poll_interval(Duration::from_secs(10))
///     .with_not_found_tolerance(3)
///     .with_required_target_hits(2);
///
/// assert!(spec.validate().is_ok());
/// assert_eq!(spec.required_target_hits(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec<S: StateLabel> {
    pending: StateSet<S>,
    target: StateSet<S>,
    timings: WaitTimings,
    not_found_tolerance: u32,
    required_target_hits: u32,
    unexpected_state_is_fatal: bool,
}

impl<S: StateLabel> WaitSpec<S> {
    /// A spec with default timings, no not-found tolerance, no debounce and
    /// fatal unexpected states.
    pub fn new<P, T>(pending: P, target: T) -> Self
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
    {
        Self {
            pending: StateSet::of(pending),
            target: StateSet::of(target),
            timings: WaitTimings::default(),
            not_found_tolerance: 0,
            required_target_hits: 1,
            unexpected_state_is_fatal: true,
        }
    }

    /// Set the hard deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timings.timeout = timeout;
        self
    }

    /// Set the floor on the delay between polls.
    pub fn with_min_poll_interval(mut self, min: Duration) -> Self {
        self.timings.poll = self.timings.poll.with_min_interval(min);
        self
    }

    /// Set the sleep before the first poll.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.timings.initial_delay = delay;
        self
    }

    /// Replace the poll cadence.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.timings.poll = policy;
        self
    }

    /// Replace all timings at once.
    pub fn with_timings(mut self, timings: WaitTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Set how long a refresh still running at the deadline may take.
    pub fn with_refresh_grace_period(mut self, grace: Duration) -> Self {
        self.timings.refresh_grace_period = grace;
        self
    }

    /// Tolerate `n` consecutive not-found results before failing.
    pub fn with_not_found_tolerance(mut self, n: u32) -> Self {
        self.not_found_tolerance = n;
        self
    }

    /// Require `n` consecutive target observations before succeeding.
    ///
    /// Zero is treated as one.
    pub fn with_required_target_hits(mut self, n: u32) -> Self {
        self.required_target_hits = n.max(1);
        self
    }

    /// Choose whether a label outside pending and target ends the wait.
    pub fn with_unexpected_state_is_fatal(mut self, fatal: bool) -> Self {
        self.unexpected_state_is_fatal = fatal;
        self
    }

    /// Labels that mean "keep polling".
    pub fn pending(&self) -> &StateSet<S> {
        &self.pending
    }

    /// Labels that mean "done".
    pub fn target(&self) -> &StateSet<S> {
        &self.target
    }

    /// All timing parameters.
    pub fn timings(&self) -> &WaitTimings {
        &self.timings
    }

    /// The hard deadline.
    pub fn timeout(&self) -> Duration {
        self.timings.timeout
    }

    /// Consecutive not-found results tolerated.
    pub fn not_found_tolerance(&self) -> u32 {
        self.not_found_tolerance
    }

    /// Consecutive target observations required.
    pub fn required_target_hits(&self) -> u32 {
        self.required_target_hits
    }

    /// Whether unexpected labels end the wait.
    pub fn unexpected_state_is_fatal(&self) -> bool {
        self.unexpected_state_is_fatal
    }

    /// Check that pending and target share no label.
    pub fn validate(&self) -> Result<(), InvalidSpec<S>> {
        match self.pending.first_overlap(&self.target) {
            Some(label) => Err(InvalidSpec::OverlappingStates(label.clone())),
            None => Ok(()),
        }
    }
}

/// A [`WaitSpec`] that can't be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSpec<S> {
    /// The label appears in both the pending and the target set.
    OverlappingStates(S),
}

impl<S: fmt::Display> fmt::Display for InvalidSpec<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverlappingStates(label) => {
                write!(f, "state {} is both pending and target", label)
            }
        }
    }
}

impl<S: fmt::Debug + fmt::Display> std::error::Error for InvalidSpec<S> {}

#[cfg(test)]
mod spec_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = WaitSpec::new(["PENDING"], ["DONE"]);

        assert_eq!(spec.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(spec.timings().initial_delay, Duration::ZERO);
        assert_eq!(spec.timings().poll, PollPolicy::default());
        assert_eq!(spec.not_found_tolerance(), 0);
        assert_eq!(spec.required_target_hits(), 1);
        assert!(spec.unexpected_state_is_fatal());
    }

    #[test]
    fn test_zero_target_hits_clamped() {
        let spec = WaitSpec::new(["PENDING"], ["DONE"]).with_required_target_hits(0);
        assert_eq!(spec.required_target_hits(), 1);
    }

    #[test]
    fn test_min_poll_interval_sets_floor() {
        let spec =
            WaitSpec::new(["PENDING"], ["DONE"]).with_min_poll_interval(Duration::from_secs(5));
        assert_eq!(spec.timings().poll.floor(), Duration::from_secs(5));
        assert_eq!(spec.timings().poll.delay_for_poll(1), Duration::from_secs(10));
    }

    #[test]
    fn test_overlap_rejected() {
        let spec = WaitSpec::new(["PENDING", "DONE"], ["DONE"]);
        assert_eq!(spec.validate(), Err(InvalidSpec::OverlappingStates("DONE")));
        assert_eq!(
            spec.validate().unwrap_err().to_string(),
            "state DONE is both pending and target"
        );
    }

    #[test]
    fn test_empty_sets_are_valid() {
        let spec: WaitSpec<String> = WaitSpec::new([], []);
        assert!(spec.validate().is_ok());
    }
}
