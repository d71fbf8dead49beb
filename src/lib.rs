//! # Statewait
//!
//! Poll eventually-consistent remote state until it settles.
//!
//! Control planes accept a request, return at once, and finish the work in
//! the background. Callers then have to poll a describe-style endpoint
//! until the object reaches a stable state. This crate is that polling
//! loop, written once:
//!
//! - **Debounced**: a target state must be seen N times in a row
//! - **Deadline-bounded**: never polls after the timeout, always gets a last look at it
//! - **Backed off**: 500ms doubling to 10s by default, optional jitter
//! - **Cancellable**: a [`CancellationToken`](tokio_util::sync::CancellationToken)
//!   interrupts the sleep between polls
//!
//! ## Quick Example
//!
//! ```rust
//! use statewait::{Observation, WaitSpec, Waiter};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ApiError;
//!
//! async fn describe_volume() -> Result<Observation<String, &'static str>, ApiError> {
//!     Ok(Observation::found("vol-0abc".to_string(), "available"))
//! }
//!
//! # tokio_test::block_on(async {
//! let spec = WaitSpec::new(["creating"], ["available"])
//!     .with_timeout(Duration::from_secs(300))
//!     .with_required_target_hits(1);
//!
//! let outcome = Waiter::new(spec, describe_volume)
//!     .unwrap()
//!     .wait_standalone()
//!     .await
//!     .unwrap();
//!
//! assert_eq!(outcome.object, "vol-0abc");
//! assert_eq!(outcome.polls, 1);
//! # });
//! ```
//!
//! ## Features
//!
//! - `tracing`: debug/trace events and a `wait` span around every wait
//! - `jitter`: randomized poll delays
//! - `serde`: (de)serialize [`WaitTimings`] and [`PollPolicy`]
//! - `proptest`: `Arbitrary` for [`Observation`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod refresh;
pub mod schedule;
pub mod state;
pub mod testing;
pub mod wait;

// Re-exports
pub use refresh::Refresh;
pub use schedule::{
    Backoff, JitterStrategy, Pace, PollPolicy, Schedule, Tick, DEFAULT_MAX_POLL_INTERVAL,
    DEFAULT_MIN_POLL_INTERVAL,
};
pub use state::{Observation, StateLabel, StateSet};
pub use wait::{
    wait_until, Classifier, Condition, Goal, InvalidSpec, Verdict, WaitError, WaitErrorKind,
    WaitOutcome, WaitSpec, WaitStats, WaitTimings, Waiter, DEFAULT_REFRESH_GRACE_PERIOD,
    DEFAULT_TIMEOUT,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::refresh::Refresh;
    pub use crate::schedule::PollPolicy;
    pub use crate::state::{Observation, StateLabel};
    pub use crate::wait::{
        wait_until, WaitError, WaitErrorKind, WaitOutcome, WaitSpec, WaitTimings, Waiter,
    };
    pub use tokio_util::sync::CancellationToken;
}
