//! When to poll: backoff policy and deadline-bounded tick schedule.
//!
//! A wait polls frequently at first, so quick operations are noticed
//! quickly, then backs off so slow ones don't hammer the remote API:
//!
//! - **Exponential**: 500ms, 1s, 2s, 4s, 8s, 10s, 10s, ... (default)
//! - **Fixed**: a caller-pinned interval
//!
//! The [`Schedule`] turns a [`PollPolicy`] into tick instants and owns the
//! deadline: no tick is ever placed after it. When the next delay would
//! overshoot, the schedule emits one final tick *at* the deadline and then
//! ends, so a wait always gets a last look before it times out.
//!
//! # Examples
//!
//! ```rust
//! use statewait::{Pace, PollPolicy, Schedule};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let start = Instant::now();
//! let mut schedule = Schedule::new(
//!     start,
//!     Duration::from_secs(3),
//!     Duration::ZERO,
//!     PollPolicy::exponential(Duration::from_secs(1)),
//! );
//!
//! let first = schedule.next_tick(start, Pace::Backoff).unwrap();
//! assert_eq!(first.at, start);
//!
//! let second = schedule.next_tick(first.at, Pace::Backoff).unwrap();
//! assert_eq!(second.at, start + Duration::from_secs(1));
//!
//! // 1s + 2s lands exactly on the deadline: final tick
//! let third = schedule.next_tick(second.at, Pace::Backoff).unwrap();
//! assert!(third.is_final);
//! assert!(schedule.next_tick(third.at, Pace::Backoff).is_none());
//! ```
//!
//! # Jitter Support
//!
//! Enable the `jitter` feature to spread polls of many concurrent waits:
//!
//! ```toml
//! statewait = { version = "...", features = ["jitter"] }
//! ```

mod policy;

use std::time::Duration;

use tokio::time::Instant;

pub use policy::{
    Backoff, JitterStrategy, PollPolicy, DEFAULT_MAX_POLL_INTERVAL, DEFAULT_MIN_POLL_INTERVAL,
};

/// Stand-in horizon for deadlines too far away to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Whether the delay before the next tick should grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Advance the backoff.
    Backoff,
    /// Repeat the previous delay. Used while confirming a target state so a
    /// debounce streak isn't stretched out by backoff.
    Steady,
}

/// One scheduled poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 0-indexed position in the schedule.
    pub index: u32,
    /// When the poll should start.
    pub at: Instant,
    /// True for the tick placed at the deadline; nothing follows it.
    pub is_final: bool,
}

/// A lazy, deadline-truncated sequence of poll ticks.
///
/// Ticks are produced one at a time because each delay is measured from the
/// moment the previous poll *returned*, which only the caller knows.
#[derive(Debug, Clone)]
pub struct Schedule {
    policy: PollPolicy,
    start: Instant,
    deadline: Instant,
    initial_delay: Duration,
    issued: u32,
    backoff_step: u32,
    prev_delay: Option<Duration>,
    finished: bool,
}

impl Schedule {
    /// Create a schedule for a wait starting at `start` and lasting at most
    /// `timeout`. The first tick comes `initial_delay` after `start`.
    pub fn new(
        start: Instant,
        timeout: Duration,
        initial_delay: Duration,
        policy: PollPolicy,
    ) -> Self {
        Self {
            policy,
            start,
            deadline: later(start, timeout),
            initial_delay,
            issued: 0,
            backoff_step: 0,
            prev_delay: None,
            finished: false,
        }
    }

    /// The instant no tick may be scheduled after.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// When the wait started.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Number of ticks handed out so far.
    pub fn issued(&self) -> u32 {
        self.issued
    }

    /// True once the final tick has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.finished
    }

    /// The delay most recently placed between two ticks.
    pub fn last_delay(&self) -> Option<Duration> {
        self.prev_delay
    }

    /// Schedule the next tick relative to `now`, the moment the previous
    /// poll finished. Returns `None` once the final tick has been issued.
    pub fn next_tick(&mut self, now: Instant, pace: Pace) -> Option<Tick> {
        if self.finished {
            return None;
        }

        let at = if self.issued == 0 {
            later(self.start, self.initial_delay)
        } else {
            let delay = match (pace, self.prev_delay) {
                (Pace::Steady, Some(prev)) => prev,
                _ => {
                    let d = self.policy.delay_with_jitter(self.backoff_step, self.prev_delay);
                    self.backoff_step = self.backoff_step.saturating_add(1);
                    d
                }
            };
            self.prev_delay = Some(delay);
            later(now, delay)
        };

        let index = self.issued;
        self.issued = self.issued.saturating_add(1);

        if at >= self.deadline {
            self.finished = true;
            return Some(Tick {
                index,
                at: self.deadline,
                is_final: true,
            });
        }

        Some(Tick {
            index,
            at,
            is_final: false,
        })
    }
}

pub(crate) fn later(base: Instant, by: Duration) -> Instant {
    base.checked_add(by)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}
