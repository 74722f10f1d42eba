// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Recorded result of a single test execution.

use std::time::{Duration, SystemTime};

use crate::{
    clock::epoch_millis,
    step::{FailureCause, StepPath, TestStep},
    DataTable, ScreenshotAndHtmlSource, TestResult, TestTag,
};

/// One execution of a test method or scenario, along with its tree of
/// [`TestStep`]s.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TestOutcome {
    /// Name of the test.
    name: String,

    /// Suite (story) this test belongs to.
    suite: Option<String>,

    /// Top-level steps, in recording order.
    steps: Vec<TestStep>,

    /// Result forced upon this test, taking precedence over the observed one.
    annotated_result: Option<TestResult>,

    /// First failure recorded for this test.
    failure_cause: Option<FailureCause>,

    /// Session of the browser used by this test.
    session_id: Option<String>,

    /// Name of the browser driver used by this test.
    driver: Option<String>,

    /// Time this test started at.
    start_time: SystemTime,

    /// Time this test took, once finished.
    duration: Option<Duration>,

    /// Tags of this test, without duplicates.
    tags: Vec<TestTag>,

    /// Issues this test relates to, without duplicates.
    issues: Vec<String>,

    /// Examples of a data-driven test.
    data_table: Option<DataTable>,

    /// Whether this test is executed by hand.
    manual: bool,
}

impl TestOutcome {
    /// Creates a new [`TestOutcome`] of a test started at the given time.
    #[must_use]
    pub fn new(name: impl Into<String>, start_time: SystemTime) -> Self {
        Self {
            name: name.into(),
            suite: None,
            steps: Vec::new(),
            annotated_result: None,
            failure_cause: None,
            session_id: None,
            driver: None,
            start_time,
            duration: None,
            tags: Vec::new(),
            issues: Vec::new(),
            data_table: None,
            manual: false,
        }
    }

    /// Attaches this outcome to the given suite.
    #[must_use]
    pub fn in_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    /// Returns the name of the test.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the suite this test belongs to.
    #[must_use]
    pub fn suite(&self) -> Option<&str> {
        self.suite.as_deref()
    }

    /// Returns the time this test started at.
    #[must_use]
    pub const fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Returns the time this test took, if it has finished.
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Records this test as finished at `now`.
    pub fn record_duration(&mut self, now: SystemTime) {
        self.duration = Some(now.duration_since(self.start_time).unwrap_or_default());
    }

    /// Returns the key outcomes are ordered by: start time in milliseconds
    /// since the epoch, followed by the name.
    #[must_use]
    pub fn sort_key(&self) -> String {
        format!("{}_{}", epoch_millis(self.start_time), self.name)
    }

    /// Returns the top-level steps.
    #[must_use]
    pub fn steps(&self) -> &[TestStep] {
        &self.steps
    }

    /// Returns the number of top-level steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the number of leaf steps of the whole tree.
    #[must_use]
    pub fn leaf_step_count(&self) -> usize {
        self.steps.iter().map(TestStep::leaf_count).sum()
    }

    /// Iterates over all steps, parents before their children.
    pub fn flattened_steps(&self) -> impl Iterator<Item = &TestStep> + '_ {
        self.steps.iter().flat_map(TestStep::flatten)
    }

    /// Returns paths of all steps, in the order of
    /// [`TestOutcome::flattened_steps()`].
    #[must_use]
    pub fn flattened_paths(&self) -> Vec<StepPath> {
        fn walk(steps: &[TestStep], prefix: Option<&StepPath>, out: &mut Vec<StepPath>) {
            for (i, step) in steps.iter().enumerate() {
                let path = prefix.map_or_else(|| StepPath::top_level(i), |p| p.child(i));
                out.push(path.clone());
                walk(step.children(), Some(&path), out);
            }
        }

        let mut paths = Vec::new();
        walk(&self.steps, None, &mut paths);
        paths
    }

    /// Returns the step at `path`.
    #[must_use]
    pub fn step(&self, path: &StepPath) -> Option<&TestStep> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.steps.get(*first)?, |step, i| step.children().get(*i))
    }

    /// Returns the step at `path` for modification.
    pub fn step_mut(&mut self, path: &StepPath) -> Option<&mut TestStep> {
        let (first, rest) = path.split_first()?;
        let mut step = self.steps.get_mut(*first)?;
        for i in rest {
            step = step.children_mut().get_mut(*i)?;
        }
        Some(step)
    }

    /// Returns the step recorded right before the one at `path`, in the
    /// order of [`TestOutcome::flattened_steps()`].
    #[must_use]
    pub fn step_before(&self, path: &StepPath) -> Option<&TestStep> {
        let paths = self.flattened_paths();
        let index = paths.iter().position(|p| p == path)?;
        self.step(paths.get(index.checked_sub(1)?)?)
    }

    /// Returns the most recently recorded leaf-most step.
    #[must_use]
    pub fn last_step(&self) -> Option<&TestStep> {
        self.flattened_steps().last()
    }

    /// Records the given `step` as the last child of the `parent` step, or as
    /// the last top-level step if there is no `parent`.
    ///
    /// Returns the [`StepPath`] of the recorded step. A `parent` missing from
    /// this outcome records the `step` at the top level.
    pub fn record_step(&mut self, step: TestStep, parent: Option<&StepPath>) -> StepPath {
        if let Some(path) = parent {
            if let Some(group) = self.step_mut(path) {
                let index = group.add_child(step);
                return path.child(index);
            }
        }
        self.steps.push(step);
        StepPath::top_level(self.steps.len() - 1)
    }

    /// Returns the result of this test.
    ///
    /// A forced result always wins. Otherwise this is the most severe of the
    /// step results and the result of the [`FailureCause`].
    #[must_use]
    pub fn result(&self) -> TestResult {
        if let Some(result) = self.annotated_result {
            return result;
        }
        TestResult::overall(
            self.steps
                .iter()
                .map(TestStep::result)
                .chain(self.failure_cause.as_ref().map(FailureCause::result)),
        )
    }

    /// Returns the result forced upon this test, if any.
    #[must_use]
    pub const fn annotated_result(&self) -> Option<TestResult> {
        self.annotated_result
    }

    /// Forces the result of this test.
    pub fn set_annotated_result(&mut self, result: TestResult) {
        self.annotated_result = Some(result);
    }

    /// Removes a forced result, so the observed one applies again.
    pub fn clear_annotated_result(&mut self) {
        self.annotated_result = None;
    }

    /// Forces the result of every step.
    pub fn set_all_steps_to(&mut self, result: TestResult) {
        for step in &mut self.steps {
            step.set_all_to(result);
        }
    }

    /// Returns the failure this test failed with.
    #[must_use]
    pub const fn failure_cause(&self) -> Option<&FailureCause> {
        self.failure_cause.as_ref()
    }

    /// Records the failure this test failed with, unless one is recorded
    /// already.
    pub fn determine_test_failure_cause(&mut self, cause: FailureCause) {
        if self.failure_cause.is_none() {
            self.failure_cause = Some(cause);
        }
    }

    /// Resets failing steps back to successes when the test failed with an
    /// error of the expected type.
    ///
    /// Returns whether anything was reset.
    pub fn reset_failing_steps_caused_by(&mut self, error_type: &str) -> bool {
        fn reset(steps: &mut [TestStep], error_type: &str) {
            for step in steps {
                if step.failure().is_some_and(|f| f.error_type == error_type) {
                    step.reset_failure();
                } else {
                    reset(step.children_mut(), error_type);
                }
            }
        }

        if !self.failure_cause.as_ref().is_some_and(|f| f.error_type == error_type) {
            return false;
        }
        self.failure_cause = None;
        reset(&mut self.steps, error_type);
        true
    }

    /// Marks the last recorded step as failed with the given `cause`.
    pub fn last_step_failed_with(&mut self, cause: FailureCause) {
        if let Some(path) = self.flattened_paths().pop() {
            if let Some(step) = self.step_mut(&path) {
                step.failed_with(cause.clone());
            }
        }
        self.determine_test_failure_cause(cause);
    }

    /// Returns all screenshots, in step order.
    #[must_use]
    pub fn screenshots(&self) -> Vec<&ScreenshotAndHtmlSource> {
        self.flattened_steps().flat_map(TestStep::screenshots).collect()
    }

    /// Returns the last screenshot taken during this test.
    #[must_use]
    pub fn last_screenshot(&self) -> Option<&ScreenshotAndHtmlSource> {
        self.flattened_steps().filter_map(TestStep::last_screenshot).last()
    }

    /// Returns the session of the browser used by this test.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Records the session of the browser used by this test.
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    /// Returns the name of the browser driver used by this test.
    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Records the name of the browser driver used by this test.
    pub fn set_driver(&mut self, driver: impl Into<String>) {
        self.driver = Some(driver.into());
    }

    /// Returns the tags of this test.
    #[must_use]
    pub fn tags(&self) -> &[TestTag] {
        &self.tags
    }

    /// Adds the given tags, skipping already present ones.
    pub fn add_tags(&mut self, tags: impl IntoIterator<Item = TestTag>) {
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Returns the issues this test relates to.
    #[must_use]
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    /// Adds the given issues, skipping already present ones.
    pub fn add_issues<I, S>(&mut self, issues: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for issue in issues.into_iter().map(Into::into) {
            if !self.issues.contains(&issue) {
                self.issues.push(issue);
            }
        }
    }

    /// Returns the examples of a data-driven test.
    #[must_use]
    pub const fn data_table(&self) -> Option<&DataTable> {
        self.data_table.as_ref()
    }

    /// Returns the examples of a data-driven test for modification.
    pub fn data_table_mut(&mut self) -> Option<&mut DataTable> {
        self.data_table.as_mut()
    }

    /// Indicates whether this is a data-driven test.
    #[must_use]
    pub const fn is_data_driven(&self) -> bool {
        self.data_table.is_some()
    }

    /// Replaces the examples of this test.
    pub fn use_examples_from(&mut self, table: DataTable) {
        self.data_table = Some(table);
    }

    /// Adds the examples of the given `table` to the ones of this test.
    pub fn add_new_examples_from(&mut self, table: DataTable) {
        match &mut self.data_table {
            Some(existing) => existing.append(table),
            None => self.data_table = Some(table),
        }
    }

    /// Records the result of a step of the example being executed.
    pub fn update_current_row_result(&mut self, result: TestResult) {
        if let Some(table) = &mut self.data_table {
            table.update_current_row_result(result);
        }
    }

    /// Indicates whether this test is executed by hand.
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        self.manual
    }

    /// Marks this test as executed by hand.
    pub fn as_manual_test(&mut self) {
        self.manual = true;
        self.add_tags([TestTag::manual()]);
    }

    /// Merges another invocation of this data-driven test into this outcome.
    ///
    /// Steps of the `other` invocation are appended, example results merged,
    /// and the most severe forced result kept. The first failure cause wins.
    pub fn merge_invocation(&mut self, other: Self) {
        self.steps.extend(other.steps);
        if let Some(theirs) = other.data_table {
            if let Some(mine) = self.data_table.as_mut() {
                mine.merge_results(&theirs);
            } else {
                self.data_table = Some(theirs);
            }
        }
        self.annotated_result = self.annotated_result.max(other.annotated_result);
        if self.failure_cause.is_none() {
            self.failure_cause = other.failure_cause;
        }
        self.duration = match (self.duration, other.duration) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        if self.session_id.is_none() {
            self.session_id = other.session_id;
        }
        if self.driver.is_none() {
            self.driver = other.driver;
        }
        self.add_tags(other.tags);
        self.add_issues(other.issues);
        self.manual |= other.manual;
    }
}
