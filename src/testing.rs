//! Testing utilities for code that waits on remote state.
//!
//! Waits are only as testable as their refresh functions. This module
//! provides a scripted fake refresh function that counts its calls, and
//! assertion macros for wait results.
//!
//! Pair it with `#[tokio::test(start_paused = true)]` so backoff sleeps
//! complete instantly and deterministically.
//!
//! # Examples
//!
//! ```rust
//! use statewait::testing::ScriptedRefresh;
//! use statewait::{assert_settled, WaitSpec, Waiter};
//!
//! # tokio_test::block_on(async {
//! let refresh = ScriptedRefresh::<_, _, String>::states("queue-1", ["CREATING", "ACTIVE"]);
//! let calls = refresh.calls();
//!
//! let spec = WaitSpec::new(["CREATING"], ["ACTIVE"])
//!     .with_min_poll_interval(std::time::Duration::from_millis(1));
//! let waiter = Waiter::new(spec, refresh).unwrap();
//! let outcome = assert_settled!(waiter.wait_standalone().await, "ACTIVE");
//!
//! assert_eq!(outcome.object, "queue-1");
//! assert_eq!(calls.get(), 2);
//! # });
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::refresh::Refresh;
use crate::state::{Observation, StateLabel};

/// Shared count of refresh calls.
///
/// Clones observe the same counter, so a test can keep one while the
/// refresh function is moved into a waiter.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    /// Calls made so far.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    /// Record a call, returning the count before it.
    pub fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// A refresh function that replays a fixed script.
///
/// Call `n` returns step `n`; once the script runs out the last step
/// repeats. An empty script reports `NotFound` forever.
#[derive(Debug, Clone)]
pub struct ScriptedRefresh<T, S, E> {
    steps: Vec<Result<Observation<T, S>, E>>,
    latency: Duration,
    calls: CallCounter,
}

impl<T, S, E> ScriptedRefresh<T, S, E> {
    /// An empty script.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            latency: Duration::ZERO,
            calls: CallCounter::default(),
        }
    }

    /// Append a step that finds `object` in `state`.
    pub fn then_found(mut self, object: T, state: S) -> Self {
        self.steps.push(Ok(Observation::found(object, state)));
        self
    }

    /// Append a step that doesn't find the object.
    pub fn then_not_found(mut self) -> Self {
        self.steps.push(Ok(Observation::NotFound));
        self
    }

    /// Append a step that fails with `err`.
    pub fn then_fail(mut self, err: E) -> Self {
        self.steps.push(Err(err));
        self
    }

    /// Make every call take `latency` to return.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// A handle on the call counter.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<T: Clone, S, E> ScriptedRefresh<T, S, E> {
    /// A script that finds `object` in each of `states`, in order.
    pub fn states<I>(object: T, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        states
            .into_iter()
            .fold(Self::new(), |script, state| script.then_found(object.clone(), state))
    }
}

impl<T, S, E> Default for ScriptedRefresh<T, S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S, E> Refresh for ScriptedRefresh<T, S, E>
where
    T: Clone + Send + Sync,
    S: StateLabel,
    E: Clone + Send + Sync,
{
    type Object = T;
    type State = S;
    type Error = E;

    fn refresh(&mut self) -> impl Future<Output = Result<Observation<T, S>, E>> + Send {
        let n = self.calls.bump() as usize;
        let step = self
            .steps
            .get(n)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(Ok(Observation::NotFound));
        let latency = self.latency;

        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            step
        }
    }
}

/// Assert that a wait settled, evaluating to its outcome.
///
/// With a second argument, also asserts the final state.
///
/// # Example
///
/// ```rust
/// use statewait::{assert_settled, WaitOutcome, WaitError};
/// use std::time::Duration;
///
/// let result: Result<_, WaitError<u32, &str, String>> = Ok(WaitOutcome {
///     object: 1,
///     state: "READY",
///     polls: 1,
///     elapsed: Duration::ZERO,
/// });
/// let outcome = assert_settled!(result, "READY");
/// assert_eq!(outcome.object, 1);
/// ```
#[macro_export]
macro_rules! assert_settled {
    ($result:expr) => {
        match $result {
            Ok(outcome) => outcome,
            Err(err) => panic!("Expected wait to settle, got error: {:?}", err),
        }
    };
    ($result:expr, $state:expr) => {{
        let outcome = $crate::assert_settled!($result);
        assert_eq!(outcome.state, $state);
        outcome
    }};
}

/// Assert that a wait failed with a kind matching `$kind`, evaluating to
/// the error.
///
/// # Example
///
/// ```rust
/// use statewait::testing::ScriptedRefresh;
/// use statewait::{assert_wait_error, WaitErrorKind, WaitSpec, Waiter};
///
/// # tokio_test::block_on(async {
/// let refresh = ScriptedRefresh::<(), &str, String>::new().then_fail("throttled".to_string());
/// let waiter = Waiter::new(WaitSpec::new(["PENDING"], ["DONE"]), refresh).unwrap();
///
/// let err = assert_wait_error!(waiter.wait_standalone().await, WaitErrorKind::Refresh(_));
/// assert_eq!(err.polls(), 1);
/// # });
/// ```
#[macro_export]
macro_rules! assert_wait_error {
    ($result:expr, $kind:pat) => {
        match $result {
            Err(err) => {
                if !matches!(err.kind(), $kind) {
                    panic!(
                        "Expected wait error {}, got {:?}",
                        stringify!($kind),
                        err.kind()
                    );
                }
                err
            }
            Ok(outcome) => panic!(
                "Expected wait error {}, got success: {:?}",
                stringify!($kind),
                outcome
            ),
        }
    };
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl<T, S> Arbitrary for Observation<T, S>
where
    T: Arbitrary + 'static,
    S: Arbitrary + 'static,
    T::Strategy: 'static,
    S::Strategy: 'static,
{
    type Parameters = (T::Parameters, S::Parameters);
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        let (t_params, s_params) = args;
        prop_oneof![
            1 => any::<()>().prop_map(|_| Observation::NotFound),
            3 => (any_with::<T>(t_params), any_with::<S>(s_params))
                .prop_map(|(object, state)| Observation::found(object, state)),
        ]
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::{WaitErrorKind, WaitSpec, Waiter};

    #[tokio::test]
    async fn scripted_refresh_replays_then_repeats_last() {
        let mut refresh = ScriptedRefresh::<u8, &str, String>::new()
            .then_not_found()
            .then_found(1, "CREATING")
            .then_found(2, "ACTIVE");

        assert_eq!(refresh.refresh().await, Ok(Observation::NotFound));
        assert_eq!(refresh.refresh().await, Ok(Observation::found(1, "CREATING")));
        assert_eq!(refresh.refresh().await, Ok(Observation::found(2, "ACTIVE")));
        assert_eq!(refresh.refresh().await, Ok(Observation::found(2, "ACTIVE")));
        assert_eq!(refresh.calls().get(), 4);
    }

    #[tokio::test]
    async fn empty_script_is_not_found() {
        let mut refresh = ScriptedRefresh::<u8, &str, String>::default();
        assert_eq!(refresh.refresh().await, Ok(Observation::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_simulated() {
        let mut refresh = ScriptedRefresh::<u8, &str, String>::states(0, ["ACTIVE"])
            .with_latency(Duration::from_secs(3));

        let start = tokio::time::Instant::now();
        refresh.refresh().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn call_counter_is_shared() {
        let counter = CallCounter::default();
        let clone = counter.clone();
        assert_eq!(clone.bump(), 0);
        assert_eq!(counter.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn assert_macros_on_real_waits() {
        let spec = WaitSpec::new(["PENDING"], ["DONE"]);
        let refresh = ScriptedRefresh::<u8, &str, String>::states(9, ["PENDING", "DONE"]);
        let waiter = Waiter::new(spec.clone(), refresh).unwrap();
        let outcome = assert_settled!(waiter.wait_standalone().await, "DONE");
        assert_eq!(outcome.object, 9);

        let refresh = ScriptedRefresh::<u8, &str, String>::states(9, ["BROKEN"]);
        let err = assert_wait_error!(
            Waiter::new(spec, refresh).unwrap().wait_standalone().await,
            WaitErrorKind::UnexpectedState { .. }
        );
        assert_eq!(err.last_object(), Some(&9));
    }

    #[test]
    #[should_panic(expected = "Expected wait to settle")]
    fn assert_settled_panics_on_error() {
        let result: Result<crate::WaitOutcome<u8, &str>, &str> = Err("boom");
        assert_settled!(result);
    }

    #[cfg(feature = "proptest")]
    proptest! {
        #[test]
        fn arbitrary_observations_have_state_iff_found(obs in any::<Observation<u8, u8>>()) {
            prop_assert_eq!(obs.state().is_some(), !obs.is_not_found());
        }
    }
}
