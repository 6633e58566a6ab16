//! Convergence loop bookkeeping.
//!
//! Deleted builds can keep matching the "expired" query for a while after
//! their deletion was requested, so a single sweep is not enough. The loop
//! re-enumerates until an enumeration, minus everything that already failed
//! in this pass, comes back empty.
//!
//! Termination: every round either ends the loop or attempts at least one
//! entity that is not in the failed set. For a fixed remote state where
//! successful deletions disappear from the listing, each entity is attempted
//! until it disappears or fails once, so there are at most (number of
//! distinct expirable entities) rounds that attempt anything.
//!
//! [`ConvergenceLoop::rounds`] counts enumerations, and that includes the
//! closing one which comes back empty after exclusion. It is therefore one
//! more than the number of attempting rounds: a lone permanently failing
//! entity is attempted in round 1 and the pass reports 2.

use std::collections::HashSet;
use std::hash::Hash;

/// State of one convergence loop. Owned by a single pass, never shared.
#[derive(Debug)]
pub struct ConvergenceLoop<T> {
    failed: HashSet<T>,
    rounds: usize,
}

impl<T: Eq + Hash + Clone> ConvergenceLoop<T> {
    pub fn new() -> Self {
        Self {
            failed: HashSet::new(),
            rounds: 0,
        }
    }

    /// Feed one enumeration and get the entities to attempt this round.
    ///
    /// `None` is the termination predicate: nothing left apart from entities
    /// that already failed.
    pub fn next_round(&mut self, enumerated: impl IntoIterator<Item = T>) -> Option<Vec<T>> {
        self.rounds += 1;
        let mut seen = HashSet::new();
        let remaining: Vec<T> = enumerated
            .into_iter()
            .filter(|item| !self.failed.contains(item))
            .filter(|item| seen.insert(item.clone()))
            .collect();
        (!remaining.is_empty()).then_some(remaining)
    }

    /// Exclude `item` from the remaining rounds.
    pub fn mark_failed(&mut self, item: T) {
        self.failed.insert(item);
    }

    /// Number of enumerations consumed so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn failed(&self) -> &HashSet<T> {
        &self.failed
    }

    pub fn into_failed(self) -> HashSet<T> {
        self.failed
    }
}

impl<T: Eq + Hash + Clone> Default for ConvergenceLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}
