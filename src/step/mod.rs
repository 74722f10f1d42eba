// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Steps of a test and their tree structure.
//!
//! A [`TestStep`] is either a leaf, or a group holding nested [`TestStep`]s.
//! Steps inside a [`TestOutcome`] are addressed by [`StepPath`]s.
//!
//! [`TestOutcome`]: crate::TestOutcome

pub mod description;
pub mod failure;

use std::time::{Duration, SystemTime};

use derive_more::with_trait::{Deref, Display};
use itertools::Itertools as _;

use crate::{ScreenshotAndHtmlSource, TestResult};

pub use self::{
    description::StepDescription,
    failure::{FailureCause, FailureKind, StackTraceSanitizer},
};

/// Position of a [`TestStep`] in a tree of steps: indices of its ancestors
/// and of itself among its siblings, from the top level down.
#[derive(Clone, Debug, Default, Deref, Display, Eq, Hash, PartialEq)]
#[display("{}", _0.iter().join("."))]
pub struct StepPath(Vec<usize>);

impl StepPath {
    /// Creates a [`StepPath`] of a top-level step at `index`.
    #[must_use]
    pub fn top_level(index: usize) -> Self {
        Self(vec![index])
    }

    /// Creates a [`StepPath`] of this step's child at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    /// Returns the nesting depth of the addressed step, top-level steps
    /// having depth `1`.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for StepPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

/// One reported unit of work inside a test.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TestStep {
    /// Reported description of this step.
    description: String,

    /// Result explicitly recorded for this step itself.
    result: Option<TestResult>,

    /// Time this step started at.
    started_at: SystemTime,

    /// Time this step took, once finished.
    duration: Option<Duration>,

    /// Screenshots taken during this step, in capture order.
    screenshots: Vec<ScreenshotAndHtmlSource>,

    /// Nested steps, making this step a group.
    children: Vec<TestStep>,

    /// Failure this step ended with.
    failure: Option<FailureCause>,
}

impl TestStep {
    /// Creates a new [`TestStep`] started at the given time.
    #[must_use]
    pub fn new(description: impl Into<String>, started_at: SystemTime) -> Self {
        Self {
            description: description.into(),
            result: None,
            started_at,
            duration: None,
            screenshots: Vec::new(),
            children: Vec::new(),
            failure: None,
        }
    }

    /// Returns the description of this step.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replaces the description of this step.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Returns the result of this step.
    ///
    /// A group results in the most severe of its own and its children's
    /// results. A step without any recorded result counts as a success.
    #[must_use]
    pub fn result(&self) -> TestResult {
        TestResult::overall(
            self.result
                .into_iter()
                .chain(self.children.iter().map(Self::result)),
        )
    }

    /// Returns the result recorded for this step itself, ignoring children.
    #[must_use]
    pub const fn own_result(&self) -> Option<TestResult> {
        self.result
    }

    /// Records the result of this step.
    ///
    /// An already recorded result is never replaced by a less severe one.
    pub fn set_result(&mut self, result: TestResult) {
        if self.result.map_or(true, |current| !result.is_less_severe_than(current)) {
            self.result = Some(result);
        }
    }

    /// Forces the result of this step and all its children, even to a less
    /// severe one.
    pub fn set_all_to(&mut self, result: TestResult) {
        self.result = Some(result);
        for child in &mut self.children {
            child.set_all_to(result);
        }
    }

    /// Returns the time this step started at.
    #[must_use]
    pub const fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Returns the time this step took, if it has finished.
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Records this step as finished at `now`.
    pub fn record_duration(&mut self, now: SystemTime) {
        self.duration = Some(now.duration_since(self.started_at).unwrap_or_default());
    }

    /// Records the failure this step ended with, along with its result.
    pub fn failed_with(&mut self, cause: FailureCause) {
        self.set_result(cause.result());
        self.failure = Some(cause);
    }

    /// Returns the failure this step ended with, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    /// Resets a failure of this step and its children back to a success.
    pub fn reset_failure(&mut self) {
        if self.failure.take().is_some()
            || self.result.is_some_and(TestResult::is_failure_or_error)
        {
            self.result = Some(TestResult::Success);
        }
        for child in &mut self.children {
            child.reset_failure();
        }
    }

    /// Returns the screenshots taken during this step.
    #[must_use]
    pub fn screenshots(&self) -> &[ScreenshotAndHtmlSource] {
        &self.screenshots
    }

    /// Returns the number of screenshots taken during this step.
    #[must_use]
    pub fn screenshot_count(&self) -> usize {
        self.screenshots.len()
    }

    /// Indicates whether any screenshot was taken during this step.
    #[must_use]
    pub fn has_screenshots(&self) -> bool {
        !self.screenshots.is_empty()
    }

    /// Returns the first screenshot of this step.
    #[must_use]
    pub fn first_screenshot(&self) -> Option<&ScreenshotAndHtmlSource> {
        self.screenshots.first()
    }

    /// Returns the last screenshot of this step.
    #[must_use]
    pub fn last_screenshot(&self) -> Option<&ScreenshotAndHtmlSource> {
        self.screenshots.last()
    }

    /// Appends a screenshot to this step.
    pub fn add_screenshot(&mut self, screenshot: ScreenshotAndHtmlSource) {
        self.screenshots.push(screenshot);
    }

    /// Removes the screenshot at `index`, if there is one.
    pub fn remove_screenshot(&mut self, index: usize) -> Option<ScreenshotAndHtmlSource> {
        (index < self.screenshots.len()).then(|| self.screenshots.remove(index))
    }

    /// Indicates whether this step has nested steps.
    #[must_use]
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns the nested steps of this step.
    #[must_use]
    pub fn children(&self) -> &[TestStep] {
        &self.children
    }

    /// Appends a nested step, returning its index among the children.
    pub fn add_child(&mut self, step: TestStep) -> usize {
        self.children.push(step);
        self.children.len() - 1
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<TestStep> {
        &mut self.children
    }

    /// Iterates over this step and all its descendants, depth first, parents
    /// before children.
    pub fn flatten(&self) -> impl Iterator<Item = &TestStep> + '_ {
        let mut pending = vec![self];
        std::iter::from_fn(move || {
            let step = pending.pop()?;
            pending.extend(step.children.iter().rev());
            Some(step)
        })
    }

    /// Returns the number of leaf steps in this step's tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        if self.is_group() {
            self.children.iter().map(Self::leaf_count).sum()
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    fn step(description: &str) -> TestStep {
        TestStep::new(description, UNIX_EPOCH)
    }

    #[test]
    fn results_are_never_weakened() {
        let mut s = step("a");
        s.set_result(TestResult::Failure);
        s.set_result(TestResult::Success);

        assert_eq!(s.result(), TestResult::Failure);

        s.set_result(TestResult::Error);

        assert_eq!(s.result(), TestResult::Error);
    }

    #[test]
    fn group_result_is_worst_of_children() {
        let mut group = step("group");
        group.set_result(TestResult::Success);
        let mut failing = step("child");
        failing.set_result(TestResult::Failure);
        let _ = group.add_child(step("ok"));
        let _ = group.add_child(failing);

        assert!(group.is_group());
        assert_eq!(group.own_result(), Some(TestResult::Success));
        assert_eq!(group.result(), TestResult::Failure);
        assert_eq!(group.leaf_count(), 2);
    }

    #[test]
    fn flatten_is_preorder() {
        let mut root = step("1");
        let mut inner = step("1.1");
        let _ = inner.add_child(step("1.1.1"));
        let _ = root.add_child(inner);
        let _ = root.add_child(step("1.2"));

        let order: Vec<_> = root.flatten().map(TestStep::description).collect();

        assert_eq!(order, ["1", "1.1", "1.1.1", "1.2"]);
    }

    #[test]
    fn reset_failure_restores_success() {
        let mut s = step("a");
        s.failed_with(FailureCause::assertion("nope"));
        assert_eq!(s.result(), TestResult::Failure);

        s.reset_failure();

        assert_eq!(s.result(), TestResult::Success);
        assert!(s.failure().is_none());
    }

    #[test]
    fn removing_out_of_range_screenshot_is_noop() {
        let mut s = step("a");
        s.add_screenshot(ScreenshotAndHtmlSource::new("x.png"));

        assert!(s.remove_screenshot(3).is_none());
        assert!(s.remove_screenshot(0).is_some());
        assert!(!s.has_screenshots());
    }

    #[test]
    fn paths_display_dotted() {
        assert_eq!(StepPath::top_level(2).child(0).to_string(), "2.0");
        assert_eq!(StepPath::top_level(1).depth(), 1);
    }
}
