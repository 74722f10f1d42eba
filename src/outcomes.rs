// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Aggregation of [`TestOutcome`]s recorded in one execution context.

use crate::{TestOutcome, TestResult};

/// Insertion-ordered collection of [`TestOutcome`]s, the last one being the
/// test currently in flight.
#[derive(Clone, Debug, Default)]
pub struct Outcomes {
    /// Recorded outcomes, in insertion order.
    outcomes: Vec<TestOutcome>,
}

impl Outcomes {
    /// Creates an empty [`Outcomes`] collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { outcomes: Vec::new() }
    }

    /// Appends a newly started [`TestOutcome`].
    pub fn push(&mut self, outcome: TestOutcome) {
        self.outcomes.push(outcome);
    }

    /// Returns the most recently added [`TestOutcome`].
    #[must_use]
    pub fn latest(&self) -> Option<&TestOutcome> {
        self.outcomes.last()
    }

    /// Returns the most recently added [`TestOutcome`] for modification.
    pub fn latest_mut(&mut self) -> Option<&mut TestOutcome> {
        self.outcomes.last_mut()
    }

    /// Removes the most recently added [`TestOutcome`], as if its test never
    /// ran.
    pub fn discard_latest(&mut self) -> Option<TestOutcome> {
        self.outcomes.pop()
    }

    /// Returns a snapshot of all outcomes, sorted by start time and then by
    /// name.
    ///
    /// Both are compared together as a `{millis}_{name}` string, which keeps
    /// the order total even for identical start times.
    #[must_use]
    pub fn sorted(&self) -> Vec<TestOutcome> {
        let mut outcomes = self.outcomes.clone();
        outcomes.sort_by_cached_key(TestOutcome::sort_key);
        outcomes
    }

    /// Iterates over the outcomes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, TestOutcome> {
        self.outcomes.iter()
    }

    /// Indicates whether the test in flight has failed already.
    #[must_use]
    pub fn a_step_has_failed(&self) -> bool {
        self.latest().is_some_and(|o| o.result().is_failure_or_error())
    }

    /// Returns the number of recorded outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Indicates whether no outcome has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Counts the outcomes resulting in the given `result`.
    #[must_use]
    pub fn count(&self, result: TestResult) -> usize {
        self.outcomes.iter().filter(|o| o.result() == result).count()
    }

    /// Removes all the outcomes.
    pub fn clear(&mut self) {
        self.outcomes.clear();
    }
}

impl<'a> IntoIterator for &'a Outcomes {
    type Item = &'a TestOutcome;
    type IntoIter = std::slice::Iter<'a, TestOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use rand::seq::SliceRandom as _;

    use super::*;
    use crate::step::FailureCause;

    fn at(millis: u64, name: &str) -> TestOutcome {
        TestOutcome::new(name, UNIX_EPOCH + Duration::from_millis(millis))
    }

    #[test]
    fn sorts_by_time_then_name() {
        let mut shuffled = vec![
            at(2000, "b"),
            at(1000, "zeta"),
            at(2000, "a"),
            at(1000, "alpha"),
        ];
        shuffled.shuffle(&mut rand::thread_rng());
        let mut outcomes = Outcomes::new();
        for o in shuffled {
            outcomes.push(o);
        }

        let names: Vec<_> =
            outcomes.sorted().iter().map(|o| o.name().to_owned()).collect();

        assert_eq!(names, ["alpha", "zeta", "a", "b"]);
    }

    #[test]
    fn discards_only_latest() {
        let mut outcomes = Outcomes::new();
        outcomes.push(at(1, "first"));
        outcomes.push(at(2, "second"));

        let discarded = outcomes.discard_latest();

        assert_eq!(discarded.map(|o| o.name().to_owned()).as_deref(), Some("second"));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes.latest().map(TestOutcome::name), Some("first"));
    }

    #[test]
    fn detects_failure_of_latest_only() {
        let mut outcomes = Outcomes::new();
        assert!(!outcomes.a_step_has_failed());

        let mut failed = at(1, "failed");
        failed.determine_test_failure_cause(FailureCause::assertion("nope"));
        outcomes.push(failed);
        assert!(outcomes.a_step_has_failed());
        assert_eq!(outcomes.count(TestResult::Failure), 1);

        outcomes.push(at(2, "fresh"));
        assert!(!outcomes.a_step_has_failed());
    }
}
