//! The refresh function a waiter polls.

use std::future::Future;

use crate::state::{Observation, StateLabel};

/// Reads the current state of one remote object.
///
/// A waiter calls `refresh` exactly once per poll tick and never retries a
/// failed call: if a transport error is worth retrying, that belongs inside
/// the implementation. Calls must be side-effect free reads, safe to repeat
/// any number of times.
///
/// Any async closure returning `Result<Observation<T, S>, E>` is a
/// `Refresh`:
///
/// ```rust
/// use statewait::{Observation, Refresh};
///
/// fn assert_refresh<R: Refresh>(_: R) {}
///
/// assert_refresh(|| async { Ok::<_, std::io::Error>(Observation::found((), "READY")) });
/// ```
///
/// Implementations that page through list results must report an
/// unexpectedly empty page as an error rather than looping on it: a page
/// that carries no continuation token can never make progress.
pub trait Refresh: Send {
    /// The object being waited on.
    type Object: Send;
    /// Its state vocabulary.
    type State: StateLabel;
    /// Failure reading the object.
    type Error: Send;

    /// Read the object once.
    fn refresh(
        &mut self,
    ) -> impl Future<Output = Result<Observation<Self::Object, Self::State>, Self::Error>> + Send;
}

impl<F, Fut, T, S, E> Refresh for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Observation<T, S>, E>> + Send,
    T: Send,
    S: StateLabel,
    E: Send,
{
    type Object = T;
    type State = S;
    type Error = E;

    fn refresh(&mut self) -> impl Future<Output = Result<Observation<T, S>, E>> + Send {
        (self)()
    }
}
