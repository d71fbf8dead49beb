//! The waiter: poll a refresh function until the remote state settles.
//!
//! A wait is one sequential loop, *sleep → poll → classify*, that ends in
//! exactly one of:
//!
//! - **Settled**: a target label was observed `required_target_hits` times in a row
//! - **Timeout**: the deadline passed first
//! - **UnexpectedState**: a label outside pending and target showed up
//! - **NotFound**: the object stayed missing beyond the tolerance
//! - **Refresh**: the refresh function itself failed
//! - **Cancelled**: the caller's token fired
//!
//! Waiters share nothing, so any number of them can run as independent
//! tasks.
//!
//! # Quick Start
//!
//! ```rust
//! use statewait::{Observation, WaitSpec, Waiter};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let polls = AtomicU32::new(0);
//! let refresh = || {
//!     let n = polls.fetch_add(1, Ordering::SeqCst);
//!     async move {
//!         let state = if n < 2 { "CREATING" } else { "AVAILABLE" };
//!         Ok::<_, std::io::Error>(Observation::found("db-1", state))
//!     }
//! };
//!
//! let spec = WaitSpec::new(["CREATING"], ["AVAILABLE"])
//!     .with_timeout(Duration::from_secs(5))
//!     .with_min_poll_interval(Duration::from_millis(1));
//!
//! let outcome = Waiter::new(spec, refresh)
//!     .unwrap()
//!     .wait(&CancellationToken::new())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(outcome.object, "db-1");
//! assert_eq!(outcome.state, "AVAILABLE");
//! assert_eq!(outcome.polls, 3);
//! # });
//! ```

mod classify;
mod error;
mod spec;
mod until;

use std::time::Duration;

use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::refresh::Refresh;
use crate::schedule::{Pace, Schedule};
use crate::state::{Observation, StateLabel};

pub use classify::{Classifier, Goal, Verdict};
pub use error::{WaitError, WaitErrorKind};
pub use spec::{InvalidSpec, WaitSpec, WaitTimings, DEFAULT_REFRESH_GRACE_PERIOD, DEFAULT_TIMEOUT};
pub use until::{wait_until, Condition};

/// The settled object and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome<T, S> {
    /// The object from the poll that completed the wait.
    pub object: T,
    /// Its label, a member of the target set.
    pub state: S,
    /// Refresh calls made.
    pub polls: u32,
    /// Time from the start of the wait to success.
    pub elapsed: Duration,
}

impl<T, S> WaitOutcome<T, S> {
    /// Take the object, discarding the rest.
    pub fn into_object(self) -> T {
        self.object
    }

    /// Poll count and elapsed time.
    pub fn stats(&self) -> WaitStats {
        WaitStats {
            polls: self.polls,
            elapsed: self.elapsed,
        }
    }
}

/// Poll count and elapsed time of a successful wait with no object to
/// return, such as a wait for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStats {
    /// Refresh calls made.
    pub polls: u32,
    /// Time from the start of the wait to success.
    pub elapsed: Duration,
}

/// A refresh function paired with the spec it is polled against.
///
/// Built once, consumed by one of the `wait*` methods.
#[derive(Debug)]
pub struct Waiter<R: Refresh> {
    spec: WaitSpec<R::State>,
    refresh: R,
}

/// What a wait has seen so far, for error reporting.
struct Progress<T, S: StateLabel> {
    goal: Goal,
    start: Instant,
    polls: u32,
    last_object: Option<T>,
    last_state: Option<S>,
}

impl<T, S: StateLabel> Progress<T, S> {
    fn new(goal: Goal, start: Instant) -> Self {
        Self {
            goal,
            start,
            polls: 0,
            last_object: None,
            last_state: None,
        }
    }

    fn record(&mut self, observation: Observation<T, S>) {
        match observation.into_parts() {
            Some((object, state)) => {
                self.last_object = Some(object);
                self.last_state = Some(state);
            }
            None => {
                self.last_object = None;
                self.last_state = None;
            }
        }
    }

    fn fail<E>(self, kind: WaitErrorKind<S, E>, spec: &WaitSpec<S>) -> WaitError<T, S, E> {
        #[cfg(feature = "tracing")]
        tracing::debug!(polls = self.polls, elapsed = ?self.start.elapsed(), "wait failed");

        WaitError::new(
            kind,
            self.goal,
            spec.target().clone(),
            self.last_object,
            self.last_state,
            self.start.elapsed(),
            self.polls,
        )
    }
}

type Settled<T, S> = (Observation<T, S>, WaitStats);

type WaitResult<R, V> = Result<
    V,
    WaitError<<R as Refresh>::Object, <R as Refresh>::State, <R as Refresh>::Error>,
>;

impl<R: Refresh> Waiter<R> {
    /// Pair a spec with its refresh function.
    ///
    /// Fails if the spec's pending and target sets overlap.
    pub fn new(spec: WaitSpec<R::State>, refresh: R) -> Result<Self, InvalidSpec<R::State>> {
        spec.validate()?;
        Ok(Self { spec, refresh })
    }

    /// The spec this waiter runs.
    pub fn spec(&self) -> &WaitSpec<R::State> {
        &self.spec
    }

    /// Poll until the object reaches a target state.
    ///
    /// Cancelling `cancel` interrupts the current sleep at once and ends the
    /// wait with [`WaitErrorKind::Cancelled`]; a refresh call already in
    /// flight is allowed to finish first.
    pub async fn wait(
        self,
        cancel: &CancellationToken,
    ) -> WaitResult<R, WaitOutcome<R::Object, R::State>> {
        let expected = self.spec.target().clone();
        let (observation, stats) = self.run(Goal::Target, cancel).await?;
        match observation.into_parts() {
            Some((object, state)) => Ok(WaitOutcome {
                object,
                state,
                polls: stats.polls,
                elapsed: stats.elapsed,
            }),
            // A target goal only settles on a found object.
            None => Err(WaitError::new(
                WaitErrorKind::NotFound { checks: 1 },
                Goal::Target,
                expected,
                None,
                None,
                stats.elapsed,
                stats.polls,
            )),
        }
    }

    /// [`wait`](Self::wait) without an external cancellation token.
    pub async fn wait_standalone(self) -> WaitResult<R, WaitOutcome<R::Object, R::State>> {
        self.wait(&CancellationToken::new()).await
    }

    /// Poll until the object no longer exists.
    ///
    /// A not-found result counts as a target observation (debounced by
    /// `required_target_hits`); a present object in a pending state keeps
    /// the wait going, and any other state is unexpected. The target set and
    /// not-found tolerance are not consulted.
    pub async fn wait_for_absence(self, cancel: &CancellationToken) -> WaitResult<R, WaitStats> {
        let (_, stats) = self.run(Goal::Absence, cancel).await?;
        Ok(stats)
    }

    async fn run(
        self,
        goal: Goal,
        cancel: &CancellationToken,
    ) -> WaitResult<R, Settled<R::Object, R::State>> {
        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "wait",
            goal = ?goal,
            target = %self.spec.target(),
            timeout = ?self.spec.timeout(),
        );

        let driven = self.drive(goal, cancel);

        #[cfg(feature = "tracing")]
        let driven = tracing::Instrument::instrument(driven, span);

        driven.await
    }

    async fn drive(
        self,
        goal: Goal,
        cancel: &CancellationToken,
    ) -> WaitResult<R, Settled<R::Object, R::State>> {
        let Self { spec, mut refresh } = self;
        let timings = spec.timings().clone();
        let start = Instant::now();
        let mut schedule =
            Schedule::new(start, timings.timeout, timings.initial_delay, timings.poll);
        let deadline = schedule.deadline();
        let grace_deadline = crate::schedule::later(deadline, timings.refresh_grace_period);
        let mut classifier = Classifier::new(&spec, goal);
        let mut progress = Progress::new(goal, start);
        let mut pace = Pace::Backoff;
        let mut now = start;

        #[cfg(feature = "tracing")]
        tracing::debug!(pending = %spec.pending(), "waiting for state to settle");

        while let Some(tick) = schedule.next_tick(now, pace) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(progress.fail(WaitErrorKind::Cancelled, &spec));
                }
                _ = sleep_until(tick.at) => {}
            }

            let polled = match timeout_at(grace_deadline, refresh.refresh()).await {
                Ok(polled) => polled,
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        grace = ?timings.refresh_grace_period,
                        "refresh still running past the deadline, abandoning it"
                    );
                    let kind = WaitErrorKind::Timeout {
                        timeout: timings.timeout,
                    };
                    return Err(progress.fail(kind, &spec));
                }
            };
            progress.polls = progress.polls.saturating_add(1);

            let observation = match polled {
                Ok(observation) => observation,
                Err(e) => return Err(progress.fail(WaitErrorKind::Refresh(e), &spec)),
            };

            let verdict = classifier.observe(&observation);

            #[cfg(feature = "tracing")]
            tracing::trace!(
                poll = tick.index,
                state = ?observation.state(),
                verdict = ?verdict,
                "polled"
            );

            match verdict {
                Verdict::Settled => {
                    let stats = WaitStats {
                        polls: progress.polls,
                        elapsed: start.elapsed(),
                    };

                    #[cfg(feature = "tracing")]
                    tracing::debug!(polls = stats.polls, elapsed = ?stats.elapsed, "wait settled");

                    return Ok((observation, stats));
                }
                Verdict::Continue(next) => {
                    progress.record(observation);
                    pace = next;
                }
                Verdict::NotFound { checks } => {
                    progress.record(observation);
                    return Err(progress.fail(WaitErrorKind::NotFound { checks }, &spec));
                }
                Verdict::Unexpected(state) => {
                    progress.record(observation);
                    return Err(progress.fail(WaitErrorKind::UnexpectedState { state }, &spec));
                }
            }

            now = Instant::now();
            if tick.is_final || now >= deadline {
                break;
            }
        }

        let kind = WaitErrorKind::Timeout {
            timeout: timings.timeout,
        };
        Err(progress.fail(kind, &spec))
    }
}
