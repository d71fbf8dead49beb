//! State labels, label sets and the observation a refresh produces.
//!
//! Remote systems report progress as labels: `CREATE_IN_PROGRESS`,
//! `available`, `PENDING_ACCEPTANCE`. A waiter compares each observed label
//! against two caller-declared sets, *pending* and *target*. Labels can be
//! any type implementing [`StateLabel`], so a closed vocabulary can be an
//! enum while an open one stays a `String`.
//!
//! # Examples
//!
//! ```rust
//! use statewait::StateSet;
//!
//! let pending = StateSet::of(["CREATING", "MODIFYING"]);
//! assert!(pending.contains(&"CREATING"));
//! assert!(!pending.contains(&"AVAILABLE"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// A state label reported by a remote system.
///
/// Blanket-implemented for every type with the required bounds, so `String`,
/// `&'static str` and plain fieldless enums with a `Display` impl all work.
///
/// Labels need not be `'static`; spawning a wait onto its own task does
/// require it, as `tokio::spawn` does for everything the task owns.
pub trait StateLabel: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

impl<S> StateLabel for S where S: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

/// An unordered set of state labels.
///
/// Display renders the labels sorted by their `Display` form so messages are
/// stable regardless of hash order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSet<S: StateLabel> {
    labels: HashSet<S>,
}

impl<S: StateLabel> StateSet<S> {
    /// An empty set.
    pub fn empty() -> Self {
        Self {
            labels: HashSet::new(),
        }
    }

    /// Build a set from any collection of labels.
    pub fn of<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        Self {
            labels: labels.into_iter().collect(),
        }
    }

    /// Returns true if `label` is a member.
    pub fn contains(&self, label: &S) -> bool {
        self.labels.contains(label)
    }

    /// Returns true if the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Iterate over the labels in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.labels.iter()
    }

    /// The first label (in display order) shared with `other`, if any.
    pub fn first_overlap(&self, other: &Self) -> Option<&S> {
        let mut shared: Vec<&S> = self
            .labels
            .iter()
            .filter(|label| other.labels.contains(*label))
            .collect();
        shared.sort_by_key(|label| label.to_string());
        shared.into_iter().next()
    }

    /// Labels sorted by their display form.
    pub fn sorted(&self) -> Vec<S> {
        let mut labels: Vec<S> = self.labels.iter().cloned().collect();
        labels.sort_by_key(|label| label.to_string());
        labels
    }
}

impl<S: StateLabel> Default for StateSet<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: StateLabel> FromIterator<S> for StateSet<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::of(iter)
    }
}

impl<S: StateLabel> fmt::Display for StateSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.sorted();
        if labels.is_empty() {
            return write!(f, "<none>");
        }
        for (i, label) in labels.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

/// What a single refresh call saw.
///
/// `NotFound` is the "no object, no label" answer: the resource does not
/// exist yet (eventual consistency after a create) or no longer exists
/// (after a delete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T, S> {
    /// The object exists and reports `state`.
    Found {
        /// The object as last read from the remote system.
        object: T,
        /// Its current state label.
        state: S,
    },
    /// The object is not visible.
    NotFound,
}

impl<T, S> Observation<T, S> {
    /// Shorthand for `Observation::Found`.
    pub fn found(object: T, state: S) -> Self {
        Self::Found { object, state }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// The reported label, if the object was found.
    pub fn state(&self) -> Option<&S> {
        match self {
            Self::Found { state, .. } => Some(state),
            Self::NotFound => None,
        }
    }

    /// Split into object and label, if the object was found.
    pub fn into_parts(self) -> Option<(T, S)> {
        match self {
            Self::Found { object, state } => Some((object, state)),
            Self::NotFound => None,
        }
    }
}
