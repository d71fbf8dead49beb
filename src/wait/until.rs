//! Waiting on a yes/no condition instead of a labelled state.

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::state::Observation;

use super::{WaitError, WaitSpec, WaitStats, WaitTimings, Waiter};

/// The two labels of a boolean wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// The condition returned `false`.
    Unmet,
    /// The condition returned `true`.
    Met,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Unmet => write!(f, "unmet"),
            Condition::Met => write!(f, "met"),
        }
    }
}

/// Poll `condition` until it returns `Ok(true)`.
///
/// For checks that don't map onto a state vocabulary: "is the key
/// replicated to every region", "does the invitation show as accepted".
/// `Ok(false)` keeps polling on the `timings` schedule; an `Err` ends the
/// wait at once.
///
/// # Examples
///
/// ```rust
/// use statewait::{wait_until, PollPolicy, WaitTimings};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let checks = AtomicU32::new(0);
/// let timings = WaitTimings::new(Duration::from_secs(1))
///     .with_poll_policy(PollPolicy::fixed(Duration::from_millis(1)));
///
/// let stats = wait_until(timings, &CancellationToken::new(), || {
///     let n = checks.fetch_add(1, Ordering::SeqCst);
///     async move { Ok::<_, std::io::Error>(n >= 2) }
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(stats.polls, 3);
/// # });
/// ```
pub async fn wait_until<F, Fut, E>(
    timings: WaitTimings,
    cancel: &CancellationToken,
    mut condition: F,
) -> Result<WaitStats, WaitError<(), Condition, E>>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool, E>> + Send,
    E: Send,
{
    let spec = WaitSpec::new([Condition::Unmet], [Condition::Met]).with_timings(timings);
    let refresh = move || {
        let check = condition();
        async move {
            let met = check.await?;
            let state = if met { Condition::Met } else { Condition::Unmet };
            Ok::<_, E>(Observation::found((), state))
        }
    };

    // Unmet and Met are disjoint, so the spec needs no validation.
    let outcome = Waiter { spec, refresh }.wait(cancel).await?;
    Ok(outcome.stats())
}
