//! Terminal errors for a wait.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::state::{StateLabel, StateSet};

use super::classify::Goal;

/// Why a wait ended without settling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitErrorKind<S, E> {
    /// The refresh function failed. Never retried by the waiter.
    Refresh(E),
    /// The object was missing for more consecutive polls than tolerated.
    NotFound {
        /// Consecutive not-found results observed.
        checks: u32,
    },
    /// The object entered a state outside the pending and target sets.
    UnexpectedState {
        /// The offending label.
        state: S,
    },
    /// The deadline passed before the goal was confirmed.
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
    /// The caller's cancellation token fired.
    Cancelled,
}

/// A wait that ended in failure, with everything known at the time.
///
/// Besides the [`kind`](Self::kind), the error keeps the last object and
/// label the refresh function reported, how long the wait ran and how many
/// polls it made, so callers can say *"stuck in MODIFYING after 20m"*
/// instead of just *"timed out"*.
///
/// # Enrichment
///
/// Some remote systems only explain a failure through a second call (an
/// event log, a failure-reason field). [`with_last_error`](Self::with_last_error)
/// attaches that explanation before the error is handed further up:
///
/// ```rust
/// use statewait::{Observation, WaitSpec, Waiter};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let spec = WaitSpec::new(["CREATE_IN_PROGRESS"], ["CREATE_COMPLETE"]);
/// let waiter = Waiter::new(spec, || async {
///     Ok::<_, std::io::Error>(Observation::found("stack-1", "ROLLBACK_COMPLETE"))
/// })
/// .unwrap();
///
/// let err = waiter
///     .wait_standalone()
///     .await
///     .unwrap_err()
///     .with_last_error("Resource handler returned message: bucket already exists");
///
/// assert!(err.is_unexpected_state());
/// assert_eq!(
///     err.to_string(),
///     "operation unexpectedly entered state ROLLBACK_COMPLETE (expected: CREATE_COMPLETE): \
///      Resource handler returned message: bucket already exists"
/// );
/// # });
/// ```
#[derive(Debug)]
pub struct WaitError<T, S: StateLabel, E> {
    kind: WaitErrorKind<S, E>,
    goal: Goal,
    expected: StateSet<S>,
    last_object: Option<T>,
    last_state: Option<S>,
    elapsed: Duration,
    polls: u32,
    last_error: Option<Box<dyn StdError + Send + Sync>>,
}

impl<T, S: StateLabel, E> WaitError<T, S, E> {
    pub(crate) fn new(
        kind: WaitErrorKind<S, E>,
        goal: Goal,
        expected: StateSet<S>,
        last_object: Option<T>,
        last_state: Option<S>,
        elapsed: Duration,
        polls: u32,
    ) -> Self {
        Self {
            kind,
            goal,
            expected,
            last_object,
            last_state,
            elapsed,
            polls,
            last_error: None,
        }
    }

    /// Attach a more specific failure reason discovered after the fact.
    ///
    /// Applies to timeouts, unexpected states and not-found errors; refresh
    /// failures and cancellations already carry their cause and are
    /// returned unchanged.
    pub fn with_last_error(mut self, err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        match self.kind {
            WaitErrorKind::Timeout { .. }
            | WaitErrorKind::UnexpectedState { .. }
            | WaitErrorKind::NotFound { .. } => {
                self.last_error = Some(err.into());
            }
            WaitErrorKind::Refresh(_) | WaitErrorKind::Cancelled => {}
        }
        self
    }

    /// Why the wait failed.
    pub fn kind(&self) -> &WaitErrorKind<S, E> {
        &self.kind
    }

    /// Take the kind, discarding the context.
    pub fn into_kind(self) -> WaitErrorKind<S, E> {
        self.kind
    }

    /// The object from the most recent poll, if it found one.
    pub fn last_object(&self) -> Option<&T> {
        self.last_object.as_ref()
    }

    /// Take the object from the most recent poll.
    pub fn into_last_object(self) -> Option<T> {
        self.last_object
    }

    /// The label from the most recent poll, if it found the object.
    pub fn last_state(&self) -> Option<&S> {
        self.last_state.as_ref()
    }

    /// The target labels the wait was looking for.
    pub fn expected(&self) -> &StateSet<S> {
        &self.expected
    }

    /// Time from the start of the wait to the failure.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Refresh calls that returned.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// The enrichment attached with [`with_last_error`](Self::with_last_error).
    pub fn last_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.last_error.as_deref()
    }

    /// Returns true if the deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, WaitErrorKind::Timeout { .. })
    }

    /// Returns true if the object stayed missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, WaitErrorKind::NotFound { .. })
    }

    /// Returns true if the object entered an unexpected state.
    pub fn is_unexpected_state(&self) -> bool {
        matches!(self.kind, WaitErrorKind::UnexpectedState { .. })
    }

    /// Returns true if the wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, WaitErrorKind::Cancelled)
    }

    /// Returns true if the refresh function failed.
    pub fn is_refresh(&self) -> bool {
        matches!(self.kind, WaitErrorKind::Refresh(_))
    }

    /// The refresh function's error, if that is what ended the wait.
    pub fn refresh_error(&self) -> Option<&E> {
        match &self.kind {
            WaitErrorKind::Refresh(e) => Some(e),
            _ => None,
        }
    }

    fn fmt_last_seen(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.last_state, self.polls) {
            (Some(state), _) => write!(f, "{}", state),
            (None, 0) => write!(f, "nothing, no poll completed"),
            (None, _) => write!(f, "not found"),
        }
    }
}

impl<T, S: StateLabel, E: fmt::Display> fmt::Display for WaitError<T, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WaitErrorKind::Refresh(e) => write!(f, "refreshing state failed: {}", e)?,
            WaitErrorKind::NotFound { checks } => {
                write!(f, "resource not found after {} consecutive checks", checks)?
            }
            WaitErrorKind::UnexpectedState { state } => match self.goal {
                Goal::Target => write!(
                    f,
                    "operation unexpectedly entered state {} (expected: {})",
                    state, self.expected
                )?,
                Goal::Absence => write!(
                    f,
                    "operation unexpectedly entered state {} while awaiting removal",
                    state
                )?,
            },
            WaitErrorKind::Timeout { timeout } => {
                match self.goal {
                    Goal::Target => write!(
                        f,
                        "operation did not reach state {} within {:?} (last seen: ",
                        self.expected, timeout
                    )?,
                    Goal::Absence => {
                        write!(f, "object was not removed within {:?} (last seen: ", timeout)?
                    }
                }
                self.fmt_last_seen(f)?;
                write!(f, ")")?;
            }
            WaitErrorKind::Cancelled => write!(f, "wait cancelled after {:?}", self.elapsed)?,
        }

        if let Some(last) = &self.last_error {
            write!(f, ": {}", last)?;
        }
        Ok(())
    }
}

impl<T, S, E> StdError for WaitError<T, S, E>
where
    T: fmt::Debug,
    S: StateLabel,
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            WaitErrorKind::Refresh(e) => Some(e),
            _ => self
                .last_error
                .as_deref()
                .map(|e| e as &(dyn StdError + 'static)),
        }
    }
}
