// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Results tests and steps have before they run.
//!
//! Test frameworks mark tests and steps as pending, ignored or manual in
//! their own ways. Each adapter supplies a [`DefaultResults`] describing
//! those marks, so tracking never inspects the framework itself.

use std::{collections::HashSet, fmt};

use crate::{StepDescription, TestResult};

/// Strategy providing default results of tests and steps.
pub trait DefaultResults: fmt::Debug + Send + Sync {
    /// Returns the result the named test has regardless of its execution.
    fn for_test(&self, test: &str) -> Option<TestResult>;

    /// Returns the result the described step has regardless of its execution.
    fn for_step(&self, step: &StepDescription) -> Option<TestResult>;

    /// Indicates whether the named test is executed by hand.
    fn is_manual(&self, test: &str) -> bool {
        let _ = test;
        false
    }
}

/// [`DefaultResults`] of a framework without any marks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDefaults;

impl DefaultResults for NoDefaults {
    fn for_test(&self, _: &str) -> Option<TestResult> {
        None
    }

    fn for_step(&self, _: &StepDescription) -> Option<TestResult> {
        None
    }
}

/// [`DefaultResults`] out of explicitly marked test and step names.
///
/// Steps are looked up by the method implementing them, or by their title.
///
/// ```rust
/// # use step_outcomes::{adapter::{Annotations, DefaultResults as _}, TestResult};
/// let marks = Annotations::default()
///     .pending("Checkout.pays_by_card")
///     .ignored("Checkout.pays_by_card")
///     .manual("Checkout.prints_receipt");
///
/// assert_eq!(marks.for_test("Checkout.pays_by_card"), Some(TestResult::Pending));
/// assert!(marks.is_manual("Checkout.prints_receipt"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Annotations {
    /// Names marked as not implemented yet.
    pending: HashSet<String>,

    /// Names marked as not to be run.
    ignored: HashSet<String>,

    /// Tests executed by hand.
    manual: HashSet<String>,
}

impl Annotations {
    /// Marks the named test or step as pending.
    #[must_use]
    pub fn pending(mut self, name: impl Into<String>) -> Self {
        let _ = self.pending.insert(name.into());
        self
    }

    /// Marks the named test or step as ignored.
    #[must_use]
    pub fn ignored(mut self, name: impl Into<String>) -> Self {
        let _ = self.ignored.insert(name.into());
        self
    }

    /// Marks the named test as executed by hand.
    #[must_use]
    pub fn manual(mut self, name: impl Into<String>) -> Self {
        let _ = self.manual.insert(name.into());
        self
    }
}

impl DefaultResults for Annotations {
    /// A test marked both ways is pending.
    fn for_test(&self, test: &str) -> Option<TestResult> {
        let mut result = None;
        if self.ignored.contains(test) {
            result = Some(TestResult::Ignored);
        }
        if self.pending.contains(test) {
            result = Some(TestResult::Pending);
        }
        result
    }

    /// A step marked both ways is ignored.
    fn for_step(&self, step: &StepDescription) -> Option<TestResult> {
        let name = step.method().or(step.title())?;
        let mut result = None;
        if self.pending.contains(name) {
            result = Some(TestResult::Pending);
        }
        if self.ignored.contains(name) {
            result = Some(TestResult::Ignored);
        }
        result
    }

    fn is_manual(&self, test: &str) -> bool {
        self.manual.contains(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_defaults_marks_nothing() {
        assert_eq!(NoDefaults.for_test("any"), None);
        assert_eq!(NoDefaults.for_step(&StepDescription::for_method("any")), None);
        assert!(!NoDefaults.is_manual("any"));
    }

    #[test]
    fn steps_resolve_by_method_then_title() {
        let marks = Annotations::default().pending("payByCard").ignored("Print receipt");

        assert_eq!(
            marks.for_step(&StepDescription::for_method("payByCard")),
            Some(TestResult::Pending),
        );
        assert_eq!(
            marks.for_step(&StepDescription::titled("Print receipt")),
            Some(TestResult::Ignored),
        );
        assert_eq!(marks.for_step(&StepDescription::default()), None);
    }

    #[test]
    fn ignored_wins_for_steps() {
        let marks = Annotations::default().pending("a").ignored("a");

        assert_eq!(marks.for_step(&StepDescription::for_method("a")), Some(TestResult::Ignored));
        assert_eq!(marks.for_test("a"), Some(TestResult::Pending));
    }
}
