//! Per-poll classification: the pure half of the waiter.
//!
//! A [`Classifier`] sees one observation at a time and decides whether the
//! wait continues, has settled, or has failed. It owns the two streak
//! counters (consecutive target hits and consecutive not-found results) and
//! nothing else, so it can be driven and tested without any clock.

use crate::schedule::Pace;
use crate::state::{Observation, StateLabel};

use super::spec::WaitSpec;

/// What a wait is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    /// The object reaches a target state.
    Target,
    /// The object stops existing.
    Absence,
}

/// The classification of one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<S> {
    /// Keep polling at the given pace.
    Continue(Pace),
    /// The goal has been observed often enough in a row.
    Settled,
    /// The object has been missing for more polls than tolerated.
    NotFound {
        /// Consecutive not-found results, including this one.
        checks: u32,
    },
    /// A label outside the pending and target sets.
    Unexpected(S),
}

/// Streak-tracking classifier for one wait.
///
/// # Examples
///
/// ```rust
/// use statewait::{Classifier, Goal, Observation, Verdict, WaitSpec};
///
/// let spec = WaitSpec::new(["PENDING"], ["SUCCEEDED"]).with_required_target_hits(2);
/// let mut classifier = Classifier::new(&spec, Goal::Target);
///
/// let succeeded = Observation::found((), "SUCCEEDED");
/// assert!(matches!(classifier.observe(&succeeded), Verdict::Continue(_)));
/// assert_eq!(classifier.observe(&succeeded), Verdict::Settled);
/// ```
#[derive(Debug)]
pub struct Classifier<'a, S: StateLabel> {
    spec: &'a WaitSpec<S>,
    goal: Goal,
    target_hits: u32,
    not_found_streak: u32,
}

impl<'a, S: StateLabel> Classifier<'a, S> {
    /// A fresh classifier with both streaks at zero.
    pub fn new(spec: &'a WaitSpec<S>, goal: Goal) -> Self {
        Self {
            spec,
            goal,
            target_hits: 0,
            not_found_streak: 0,
        }
    }

    /// Consecutive observations of the goal so far.
    pub fn target_hits(&self) -> u32 {
        self.target_hits
    }

    /// Consecutive not-found observations so far.
    pub fn not_found_streak(&self) -> u32 {
        self.not_found_streak
    }

    /// Classify one observation and update the streaks.
    pub fn observe<T>(&mut self, observation: &Observation<T, S>) -> Verdict<S> {
        match (self.goal, observation) {
            (Goal::Target, Observation::NotFound) => {
                self.target_hits = 0;
                self.not_found_streak = self.not_found_streak.saturating_add(1);
                if self.not_found_streak > self.spec.not_found_tolerance() {
                    Verdict::NotFound {
                        checks: self.not_found_streak,
                    }
                } else {
                    Verdict::Continue(Pace::Backoff)
                }
            }
            (Goal::Target, Observation::Found { state, .. }) => {
                self.not_found_streak = 0;
                if self.spec.target().contains(state) {
                    self.hit()
                } else {
                    self.miss(state)
                }
            }
            (Goal::Absence, Observation::NotFound) => self.hit(),
            (Goal::Absence, Observation::Found { state, .. }) => self.miss(state),
        }
    }

    fn hit(&mut self) -> Verdict<S> {
        self.target_hits = self.target_hits.saturating_add(1);
        if self.target_hits >= self.spec.required_target_hits() {
            Verdict::Settled
        } else {
            Verdict::Continue(Pace::Steady)
        }
    }

    fn miss(&mut self, state: &S) -> Verdict<S> {
        self.target_hits = 0;
        if self.spec.pending().contains(state) || !self.spec.unexpected_state_is_fatal() {
            Verdict::Continue(Pace::Backoff)
        } else {
            Verdict::Unexpected(state.clone())
        }
    }
}
