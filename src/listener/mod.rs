// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tracking of steps and outcomes of the tests run in one execution context.
//!
//! A [`StepListener`] receives lifecycle events of one test at a time and
//! maintains its [`TestOutcome`]:
//! - nested steps turn the enclosing step into a group;
//! - fluent call chains are merged into single steps (see [`fluent`]);
//! - screenshots are captured at step boundaries (see [`screenshots`]).
//!
//! Events arriving with no test started are rejected with a
//! [`TrackerError`].

pub mod fluent;
pub mod screenshots;
pub mod stack;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    adapter::{DefaultResults, NoDefaults},
    clock::{Clock, SystemClock},
    config::{Configuration, TakeScreenshots},
    data_table::{format_example, ExampleData},
    dispatch::ContextKey,
    driver::{DriverProvider, NoDriver},
    error::{TrackerError, TrackerResult},
    event::Lifecycle,
    outcomes::Outcomes,
    step::{description::uncapitalize, FailureCause, FailureKind, StepPath, TestStep},
    DataTable, ScreenshotAndHtmlSource, StepDescription, TestOutcome, TestResult,
    TestTag,
};

use self::{
    fluent::{Boundary, FluentCoalescer},
    screenshots::{CaptureGate, ScreenshotType},
    stack::StepStack,
};

/// Tracker of the steps and outcomes of tests run in one execution context.
#[derive(Debug)]
pub struct StepListener {
    /// Execution context this listener tracks.
    key: ContextKey,

    /// Shared settings.
    config: Arc<Configuration>,

    /// Source of step and test timings.
    clock: Arc<dyn Clock>,

    /// Browser drivers of execution contexts.
    drivers: Arc<dyn DriverProvider>,

    /// Results tests and steps have before they run.
    defaults: Arc<dyn DefaultResults>,

    /// Outcomes of the tests run so far, the last one being in flight.
    outcomes: Outcomes,

    /// Open steps of the test in flight.
    stack: StepStack,

    /// Fluent sequence of the test in flight.
    fluent: FluentCoalescer,

    /// Suite the tests belong to.
    suite: Option<String>,

    /// Issues applying to every test of the suite.
    story_issues: Vec<String>,

    /// Tags applying to every test of the suite.
    story_tags: Vec<TestTag>,

    /// Whether the test in flight stopped executing steps.
    suspended: bool,

    /// Number of the last started example.
    current_example: usize,
}

impl StepListener {
    /// Creates a new [`StepListener`] of the given execution context, using
    /// the system clock and no browser.
    #[must_use]
    pub fn new(key: ContextKey, config: Arc<Configuration>) -> Self {
        Self {
            key,
            config,
            clock: Arc::new(SystemClock),
            drivers: Arc::new(NoDriver),
            defaults: Arc::new(NoDefaults),
            outcomes: Outcomes::new(),
            stack: StepStack::default(),
            fluent: FluentCoalescer::default(),
            suite: None,
            story_issues: Vec::new(),
            story_tags: Vec::new(),
            suspended: false,
            current_example: 0,
        }
    }

    /// Replaces the [`Clock`] timing steps and tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the [`DriverProvider`] screenshots are taken with.
    #[must_use]
    pub fn with_drivers(mut self, drivers: Arc<dyn DriverProvider>) -> Self {
        self.drivers = drivers;
        self
    }

    /// Replaces the [`DefaultResults`] of tests and steps.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Arc<dyn DefaultResults>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the execution context this listener tracks.
    #[must_use]
    pub const fn key(&self) -> &ContextKey {
        &self.key
    }

    /// Returns the shared settings.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Returns the [`DefaultResults`] of tests and steps.
    #[must_use]
    pub fn defaults(&self) -> &dyn DefaultResults {
        &*self.defaults
    }

    /// Applies the given lifecycle `event`.
    ///
    /// # Errors
    ///
    /// If the `event` requires a test in progress, but there is none.
    pub fn handle(&mut self, event: Lifecycle) -> TrackerResult<()> {
        trace!("[{}] {event}", self.key);
        match event {
            Lifecycle::SuiteStarted(name) => self.test_suite_started(name),
            Lifecycle::SuiteFinished => self.test_suite_finished(),
            Lifecycle::SuiteIssues(issues) => self.add_issues_to_current_story(issues),
            Lifecycle::SuiteTags(tags) => self.add_tags_to_current_story(tags),
            Lifecycle::TestStarted(name) => self.test_started(name),
            Lifecycle::TestFinished => return self.test_finished(),
            Lifecycle::TestRetried => return self.test_retried(),
            Lifecycle::TestFailed(cause) => return self.test_failed(cause),
            Lifecycle::ResultOverridden(result) => return self.override_result_to(result),
            Lifecycle::TestIsManual => return self.test_is_manual(),
            Lifecycle::StepStarted(step) => return self.step_started(step),
            Lifecycle::SkippedStepStarted(step) => return self.skipped_step_started(step),
            Lifecycle::StepFinished => return self.step_finished(),
            Lifecycle::StepFailed(cause) => return self.step_failed(cause),
            Lifecycle::StepIgnored => return self.step_ignored(),
            Lifecycle::StepPending => return self.step_pending(),
            Lifecycle::UseExamples(table) => return self.use_examples_from(table),
            Lifecycle::ExampleStarted(data) => return self.example_started(data),
            Lifecycle::ExampleFinished => return self.example_finished(),
            Lifecycle::TakeScreenshot => self.take_screenshot(),
            Lifecycle::ScreenChanged => self.notify_screen_change(),
        }
        Ok(())
    }

    // Suites.

    /// Starts a suite of tests, forgetting suite-wide issues and tags.
    pub fn test_suite_started(&mut self, name: impl Into<String>) {
        let name = name.into();
        debug!("[{}] Suite `{name}` started", self.key);
        self.suite = Some(name);
        self.story_issues.clear();
        self.story_tags.clear();
    }

    /// Finishes the current suite.
    pub fn test_suite_finished(&mut self) {
        self.suite = None;
        self.story_issues.clear();
        self.story_tags.clear();
    }

    /// Adds issues every following test of the suite relates to.
    pub fn add_issues_to_current_story<I, S>(&mut self, issues: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.story_issues.extend(issues.into_iter().map(Into::into));
    }

    /// Adds tags every following test of the suite has.
    pub fn add_tags_to_current_story(&mut self, tags: impl IntoIterator<Item = TestTag>) {
        self.story_tags.extend(tags);
    }

    // Tests.

    /// Starts a new test, applying its default result.
    pub fn test_started(&mut self, name: impl Into<String>) {
        self.stack.clear();
        self.fluent.reset();
        self.suspended = false;

        let mut outcome = TestOutcome::new(name, self.clock.now());
        if let Some(suite) = &self.suite {
            outcome = outcome.in_suite(suite.clone());
        }
        if let Some(session) = self.drivers.session_id(&self.key) {
            outcome.set_session_id(session);
        }
        if let Some(result) = self.defaults.for_test(outcome.name()) {
            outcome.set_annotated_result(result);
        }
        debug!("[{}] Test `{}` started", self.key, outcome.name());
        self.outcomes.push(outcome);
    }

    /// Finishes the test in flight, attaching suite-wide issues and tags, and
    /// the driver if a browser was used.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_finished(&mut self) -> TrackerResult<()> {
        let now = self.clock.now();
        let driver = self.drivers.current_driver(&self.key);
        let outcome = self.outcomes.latest_mut().ok_or(TrackerError::no_test("test_finished"))?;

        outcome.record_duration(now);
        outcome.add_issues(self.story_issues.iter().cloned());
        outcome.add_tags(self.story_tags.iter().cloned());
        if let Some(driver) = driver {
            outcome.set_driver(driver.name());
        }
        debug!("[{}] Test `{}` finished: {}", self.key, outcome.name(), outcome.result());

        self.stack.clear();
        Ok(())
    }

    /// Discards the test in flight, so it can be started again.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_retried(&mut self) -> TrackerResult<()> {
        self.stack.clear();
        self.fluent.reset();
        let discarded =
            self.outcomes.discard_latest().ok_or(TrackerError::no_test("test_retried"))?;
        debug!("[{}] Discarded `{}` to retry it", self.key, discarded.name());
        Ok(())
    }

    /// Records the failure of the test in flight, unless one is recorded
    /// already.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_failed(&mut self, cause: FailureCause) -> TrackerResult<()> {
        let cause = self.config.sanitizer().sanitize_cause(cause);
        self.outcome_mut("test_failed")?.determine_test_failure_cause(cause);
        Ok(())
    }

    /// Forces the test in flight to be [`TestResult::Ignored`].
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_ignored(&mut self) -> TrackerResult<()> {
        self.override_result_to(TestResult::Ignored)
    }

    /// Forces the test in flight to be [`TestResult::Skipped`].
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_skipped(&mut self) -> TrackerResult<()> {
        self.override_result_to(TestResult::Skipped)
    }

    /// Forces the test in flight to be [`TestResult::Pending`].
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_pending(&mut self) -> TrackerResult<()> {
        self.override_result_to(TestResult::Pending)
    }

    /// Forces the result of the test in flight.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn override_result_to(&mut self, result: TestResult) -> TrackerResult<()> {
        self.outcome_mut("override_result_to")?.set_annotated_result(result);
        Ok(())
    }

    /// Removes a forced result of the test in flight.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn clear_forced_result(&mut self) -> TrackerResult<()> {
        self.outcome_mut("clear_forced_result")?.clear_annotated_result();
        Ok(())
    }

    /// Returns the result forced upon the test in flight.
    #[must_use]
    pub fn forced_result(&self) -> Option<TestResult> {
        self.outcomes.latest().and_then(TestOutcome::annotated_result)
    }

    /// Forces the result of the test in flight and of all its steps.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn set_all_steps_to(&mut self, result: TestResult) -> TrackerResult<()> {
        let outcome = self.outcome_mut("set_all_steps_to")?;
        outcome.set_annotated_result(result);
        outcome.set_all_steps_to(result);
        Ok(())
    }

    /// Marks the test in flight as executed by hand, with the configured
    /// manual result.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn test_is_manual(&mut self) -> TrackerResult<()> {
        let result = self.config.manual_test_result();
        let outcome = self.outcome_mut("test_is_manual")?;
        outcome.as_manual_test();
        outcome.set_annotated_result(result);
        Ok(())
    }

    /// Records the result of a test executed by hand.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn record_manual_test_result(&mut self, result: TestResult) -> TrackerResult<()> {
        self.override_result_to(result)
    }

    /// Resets the failures of the test in flight if it failed with an error
    /// of the expected type.
    ///
    /// Returns whether anything was reset.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn exception_expected(&mut self, error_type: &str) -> TrackerResult<bool> {
        Ok(self
            .outcome_mut("exception_expected")?
            .reset_failing_steps_caused_by(error_type))
    }

    /// Stops executing steps of the test in flight. Following steps are
    /// reported without running, and no screenshots are taken.
    pub fn suspend_test(&mut self) {
        self.suspended = true;
    }

    /// Indicates whether the test in flight stopped executing steps.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Adds issues the test in flight relates to.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn add_issues_to_current_test<I, S>(&mut self, issues: I) -> TrackerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outcome_mut("add_issues_to_current_test")?.add_issues(issues);
        Ok(())
    }

    /// Adds tags to the test in flight.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn add_tags_to_current_test(
        &mut self,
        tags: impl IntoIterator<Item = TestTag>,
    ) -> TrackerResult<()> {
        self.outcome_mut("add_tags_to_current_test")?.add_tags(tags);
        Ok(())
    }

    // Steps.

    /// Starts a step, nested into the open step if there is one.
    ///
    /// A step continuing a fluent sequence extends the step in flight
    /// instead.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn step_started(&mut self, description: StepDescription) -> TrackerResult<()> {
        self.record_step(&description, "step_started")?;
        self.take_screenshot_at(TakeScreenshots::BeforeAndAfterEachStep);
        self.update_session_id();
        Ok(())
    }

    /// Starts a step which isn't going to be executed.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn skipped_step_started(&mut self, description: StepDescription) -> TrackerResult<()> {
        self.record_step(&description, "skipped_step_started")
    }

    /// Renames the open step, or starts one with the given `title` if none
    /// is open.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn update_current_step_title(&mut self, title: impl Into<String>) -> TrackerResult<()> {
        let title = title.into();
        match self.current_step_mut("update_current_step_title") {
            Ok(step) => {
                step.set_description(title);
                Ok(())
            }
            Err(TrackerError::NoStepInProgress { .. }) => {
                self.step_started(StepDescription::titled(title))
            }
            Err(e) => Err(e),
        }
    }

    /// Finishes the open step successfully.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn step_finished(&mut self) -> TrackerResult<()> {
        self.update_session_id();
        self.take_end_of_step_screenshot_for(TestResult::Success);
        self.current_step_done(Some(TestResult::Success), "step_finished")?;
        self.pause_if_required();
        Ok(())
    }

    /// Finishes the open step with the given failure, which also becomes the
    /// failure of the test unless it has one already.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn step_failed(&mut self, cause: FailureCause) -> TrackerResult<()> {
        self.take_end_of_step_screenshot_for(TestResult::Failure);
        let cause = self.config.sanitizer().sanitize_cause(cause);
        let result = cause.result();

        self.outcome_mut("step_failed")?.determine_test_failure_cause(cause.clone());
        if let Ok(step) = self.current_step_mut("step_failed") {
            step.failed_with(cause);
        }
        self.current_step_done(Some(result), "step_failed")
    }

    /// Marks the last recorded step as failed, once it's finished already.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn last_step_failed(&mut self, cause: FailureCause) -> TrackerResult<()> {
        self.take_end_of_step_screenshot_for(TestResult::Failure);
        let cause = self.config.sanitizer().sanitize_cause(cause);
        self.outcome_mut("last_step_failed")?.last_step_failed_with(cause);
        Ok(())
    }

    /// Records the failure of the open step, or of the last recorded one if
    /// none is open.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn update_current_step_failure_cause(&mut self, cause: FailureCause) -> TrackerResult<()> {
        let cause = self.config.sanitizer().sanitize_cause(cause);
        if let Ok(step) = self.current_step_mut("update_current_step_failure_cause") {
            step.failed_with(cause.clone());
            self.outcome_mut("update_current_step_failure_cause")?
                .determine_test_failure_cause(cause);
        } else {
            self.outcome_mut("update_current_step_failure_cause")?
                .last_step_failed_with(cause);
        }
        Ok(())
    }

    /// Finishes the open step as not executed.
    ///
    /// Once a step of the test has failed, the step is recorded as
    /// [`TestResult::Skipped`] rather than [`TestResult::Ignored`].
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn step_ignored(&mut self) -> TrackerResult<()> {
        let result = if self.a_step_has_failed() {
            TestResult::Skipped
        } else {
            TestResult::Ignored
        };
        self.current_step_done(Some(result), "step_ignored")
    }

    /// Finishes the open step as not implemented yet.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn step_pending(&mut self) -> TrackerResult<()> {
        self.current_step_done(Some(TestResult::Pending), "step_pending")
    }

    /// Finishes the open step as not implemented yet, for the given reason.
    ///
    /// # Errors
    ///
    /// If no test or no step is in progress.
    pub fn step_pending_with(&mut self, message: impl Into<String>) -> TrackerResult<()> {
        self.current_step_mut("step_pending_with")?.failed_with(FailureCause::new(
            FailureKind::Pending,
            "PendingStep",
            message,
        ));
        self.step_pending()
    }

    /// Stops the test in flight because some assumption of it doesn't hold.
    ///
    /// The open step, if any, is aborted, and the test becomes
    /// [`TestResult::Ignored`].
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn assumption_violated(&mut self, message: impl Into<String>) -> TrackerResult<()> {
        let cause = FailureCause::new(FailureKind::Aborted, "AssumptionViolated", message);
        if let Ok(step) = self.current_step_mut("assumption_violated") {
            step.failed_with(cause);
            self.step_ignored()?;
        }
        self.test_ignored()
    }

    // Screenshots.

    /// Takes a screenshot now, keeping it even if nothing changed.
    pub fn take_screenshot(&mut self) {
        self.take(ScreenshotType::Mandatory);
    }

    /// Takes a screenshot after an action, if screenshots of every action are
    /// enabled.
    pub fn notify_screen_change(&mut self) {
        self.take_screenshot_at(TakeScreenshots::ForEachAction);
    }

    // Data-driven tests.

    /// Makes the test in flight run with the given examples.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn use_examples_from(&mut self, table: DataTable) -> TrackerResult<()> {
        self.current_example = table.current_row();
        self.outcome_mut("use_examples_from")?.use_examples_from(table);
        Ok(())
    }

    /// Adds examples to the ones the test in flight runs with.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn add_new_examples_from(&mut self, table: DataTable) -> TrackerResult<()> {
        self.current_example = 0;
        self.outcome_mut("add_new_examples_from")?.add_new_examples_from(table);
        Ok(())
    }

    /// Starts a row of examples, as a step titled `[n] {column=value, ...}`.
    ///
    /// A row not known beforehand is added to the examples.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn example_started(&mut self, data: ExampleData) -> TrackerResult<()> {
        let outcome = self.outcome_mut("example_started")?;
        outcome.clear_annotated_result();
        if let Some(table) = outcome.data_table_mut() {
            if !table.is_predefined() {
                table.add_row(data.clone());
            }
        }
        self.current_example += 1;
        let title = format!("[{}] {}", self.current_example, format_example(&data));
        self.step_started(StepDescription::titled(title))
    }

    /// Finishes the row of examples in flight, recording the result of its
    /// step into the row, and moves on to the next row.
    ///
    /// # Errors
    ///
    /// If no test is in progress.
    pub fn example_finished(&mut self) -> TrackerResult<()> {
        let result = self.current_step().map(TestStep::result);
        self.current_step_done(None, "example_finished")?;
        if let Some(table) = self.outcome_mut("example_finished")?.data_table_mut() {
            if let Some(result) = result {
                table.update_current_row_result(result);
            }
            table.move_to_next_row();
        }
        Ok(())
    }

    // Queries.

    /// Returns a snapshot of the outcomes of all the tests run so far,
    /// sorted by start time and name.
    #[must_use]
    pub fn test_outcomes(&self) -> Vec<TestOutcome> {
        self.outcomes.sorted()
    }

    /// Returns the outcomes in the order their tests started in.
    #[must_use]
    pub const fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    /// Returns the outcome of the test in flight.
    #[must_use]
    pub fn current_outcome(&self) -> Option<&TestOutcome> {
        self.outcomes.latest()
    }

    /// Forgets all the recorded outcomes.
    pub fn clear_test_outcomes(&mut self) {
        self.outcomes.clear();
        self.stack.clear();
        self.fluent.reset();
    }

    /// Indicates whether the test in flight has failed already.
    #[must_use]
    pub fn a_step_has_failed(&self) -> bool {
        self.outcomes.a_step_has_failed()
    }

    /// Returns the path of the open step.
    #[must_use]
    pub fn current_step_path(&self) -> Option<&StepPath> {
        self.stack.current_step()
    }

    /// Returns the number of open steps.
    #[must_use]
    pub fn step_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Returns the number of screenshots of the open step.
    #[must_use]
    pub fn current_step_screenshot_count(&self) -> usize {
        self.current_step().map_or(0, TestStep::screenshot_count)
    }

    /// Returns the last screenshot of the step recorded before the open one.
    #[must_use]
    pub fn previous_step_last_screenshot(&self) -> Option<&ScreenshotAndHtmlSource> {
        let outcome = self.outcomes.latest()?;
        outcome
            .step_before(self.stack.current_step()?)
            .and_then(TestStep::last_screenshot)
    }

    // Internals.

    fn outcome_mut(&mut self, operation: &'static str) -> TrackerResult<&mut TestOutcome> {
        self.outcomes.latest_mut().ok_or(TrackerError::no_test(operation))
    }

    fn current_step(&self) -> Option<&TestStep> {
        self.outcomes.latest()?.step(self.stack.current_step()?)
    }

    fn current_step_mut(&mut self, operation: &'static str) -> TrackerResult<&mut TestStep> {
        let outcome = self.outcomes.latest_mut().ok_or(TrackerError::no_test(operation))?;
        let path = self.stack.current_step().ok_or(TrackerError::no_step(operation))?;
        outcome.step_mut(path).ok_or(TrackerError::no_step(operation))
    }

    /// Records a step, or extends the step in flight with it when continuing
    /// a fluent sequence.
    fn record_step(
        &mut self,
        description: &StepDescription,
        operation: &'static str,
    ) -> TrackerResult<()> {
        let now = self.clock.now();
        let name = description.name();
        let outcome = self.outcomes.latest_mut().ok_or(TrackerError::no_test(operation))?;

        if self.fluent.step_started(description) == Boundary::Append {
            if let Some(step) = self.stack.current_step().and_then(|p| outcome.step_mut(p)) {
                let merged = format!("{} {}", step.description(), uncapitalize(&name));
                step.set_description(merged);
                return Ok(());
            }
        }

        let parent = self.stack.parent_for_new_step();
        let mut step = TestStep::new(name, now);
        if let Some(result) = self.defaults.for_step(description) {
            step.set_result(result);
        }
        let path = outcome.record_step(step, parent.as_ref());
        trace!("[{}] Step {path} started", self.key);
        self.stack.push(path);
        Ok(())
    }

    /// Closes the open step, unless a fluent sequence is in flight, and
    /// records the `result` of the step and of the current example.
    fn current_step_done(
        &mut self,
        result: Option<TestResult>,
        operation: &'static str,
    ) -> TrackerResult<()> {
        let now = self.clock.now();
        let outcome = self.outcomes.latest_mut().ok_or(TrackerError::no_test(operation))?;

        if self.fluent.closes_step() {
            if let Some(path) = self.stack.pop() {
                if let Some(step) = outcome.step_mut(&path) {
                    step.record_duration(now);
                    if let Some(result) = result {
                        step.set_result(result);
                    }
                }
            }
        }
        if let Some(result) = result {
            outcome.update_current_row_result(result);
        }
        Ok(())
    }

    fn pause_if_required(&self) {
        if !self.config.step_delay.is_zero() {
            self.clock.pause_for(self.config.step_delay);
        }
    }

    fn update_session_id(&mut self) {
        if let Some(session) = self.drivers.session_id(&self.key) {
            if let Some(outcome) = self.outcomes.latest_mut() {
                outcome.set_session_id(session);
            }
        }
    }

    fn take_end_of_step_screenshot_for(&mut self, result: TestResult) {
        let level = if result == TestResult::Failure {
            TakeScreenshots::ForFailures
        } else {
            TakeScreenshots::AfterEachStep
        };
        self.take_screenshot_at(level);
    }

    fn take_screenshot_at(&mut self, level: TakeScreenshots) {
        if self.config.screenshot_permission().allows(level) {
            self.take(ScreenshotType::Optional);
        }
    }

    fn take(&mut self, kind: ScreenshotType) {
        let gate = CaptureGate {
            step_open: !self.stack.is_empty(),
            browser_open: self.drivers.is_driver_instantiated(&self.key),
            step_failed: self.a_step_has_failed(),
            dry_run: self.config.dry_run,
            suspended: self.suspended,
        };
        if !gate.allows_capture() {
            return;
        }
        let Some(driver) = self.drivers.current_driver(&self.key) else {
            return;
        };
        match screenshots::capture(
            &*driver,
            &*self.clock,
            self.config.screenshot_timeout,
            self.config.store_html_source,
        ) {
            Ok(Some(screenshot)) => self.store_screenshot(kind, screenshot),
            Ok(None) => {}
            Err(e) => tracing::warn!("[{}] Failed to take screenshot: {e}", self.key),
        }
    }

    /// Attaches the `screenshot` to the open step if it's worth keeping, and
    /// drops the step's first screenshot if it repeats the previous step's
    /// last one.
    fn store_screenshot(&mut self, kind: ScreenshotType, screenshot: ScreenshotAndHtmlSource) {
        let Some(path) = self.stack.current_step().cloned() else {
            return;
        };
        let Some(outcome) = self.outcomes.latest_mut() else {
            return;
        };

        let count = outcome.step(&path).map_or(0, TestStep::screenshot_count);
        if screenshots::should_store(kind, count, outcome.last_screenshot(), &screenshot) {
            if let Some(step) = outcome.step_mut(&path) {
                step.add_screenshot(screenshot);
            }
        }

        let current = outcome.step(&path);
        let duplicate = screenshots::leading_duplicate(
            current.map_or(0, TestStep::screenshot_count),
            outcome.step_before(&path).and_then(TestStep::last_screenshot),
            current.and_then(TestStep::first_screenshot),
        );
        if duplicate {
            if let Some(step) = outcome.step_mut(&path) {
                drop(step.remove_screenshot(0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{adapter::Annotations, clock::ManualClock};

    fn listener() -> StepListener {
        StepListener::new(ContextKey::from("test"), Arc::new(Configuration::default()))
            .with_clock(Arc::new(ManualClock::at_millis(1_000)))
    }

    fn descriptions(outcome: &TestOutcome) -> Vec<String> {
        outcome.steps().iter().map(|s| s.description().to_owned()).collect()
    }

    #[test]
    fn flat_steps_are_recorded_in_order() {
        let mut l = listener();
        l.test_started("flat");
        for name in ["one", "two", "three"] {
            l.step_started(StepDescription::titled(name)).unwrap();
            l.step_finished().unwrap();
        }

        let outcome = l.current_outcome().unwrap();
        assert_eq!(descriptions(outcome), ["one", "two", "three"]);
        assert!(outcome.steps().iter().all(|s| !s.is_group()));
        assert_eq!(l.step_depth(), 0);
    }

    #[test]
    fn nested_step_turns_parent_into_group() {
        let mut l = listener();
        l.test_started("nested");
        l.step_started(StepDescription::titled("outer")).unwrap();
        l.step_started(StepDescription::titled("inner 1")).unwrap();
        l.step_finished().unwrap();
        l.step_started(StepDescription::titled("inner 2")).unwrap();
        l.step_finished().unwrap();
        l.step_finished().unwrap();
        l.step_started(StepDescription::titled("after")).unwrap();
        l.step_finished().unwrap();

        let outcome = l.current_outcome().unwrap();
        assert_eq!(descriptions(outcome), ["outer", "after"]);
        let group = &outcome.steps()[0];
        assert!(group.is_group());
        let children: Vec<_> = group.children().iter().map(TestStep::description).collect();
        assert_eq!(children, ["inner 1", "inner 2"]);
    }

    #[test]
    fn step_events_require_a_test() {
        let mut l = listener();

        assert_eq!(
            l.step_started(StepDescription::titled("x")),
            Err(TrackerError::no_test("step_started")),
        );
        assert_eq!(l.step_finished(), Err(TrackerError::no_test("step_finished")));
        assert_eq!(l.test_retried(), Err(TrackerError::no_test("test_retried")));
    }

    #[test]
    fn pending_message_requires_a_step() {
        let mut l = listener();
        l.test_started("t");

        assert_eq!(
            l.step_pending_with("later"),
            Err(TrackerError::no_step("step_pending_with")),
        );
    }

    #[test]
    fn failure_becomes_test_failure_cause() {
        let mut l = listener();
        l.test_started("t");
        l.step_started(StepDescription::titled("a")).unwrap();
        l.step_failed(FailureCause::assertion("expected 1")).unwrap();
        l.step_started(StepDescription::titled("b")).unwrap();
        l.step_failed(FailureCause::new(FailureKind::Error, "Io", "later")).unwrap();

        let outcome = l.current_outcome().unwrap();
        assert_eq!(outcome.failure_cause().map(|c| c.message.as_str()), Some("expected 1"));
        assert_eq!(outcome.steps()[0].result(), TestResult::Failure);
        assert_eq!(outcome.result(), TestResult::Error);
        assert!(l.a_step_has_failed());
    }

    #[test]
    fn default_step_results_are_applied() {
        let mut l = listener().with_defaults(Arc::new(Annotations::default().pending("later")));
        l.test_started("t");
        l.step_started(StepDescription::for_method("later")).unwrap();
        l.step_finished().unwrap();

        assert_eq!(l.current_outcome().unwrap().result(), TestResult::Pending);
    }

    #[test]
    fn default_test_results_are_applied() {
        let mut l = listener().with_defaults(Arc::new(Annotations::default().ignored("t")));
        l.test_started("t");

        assert_eq!(l.forced_result(), Some(TestResult::Ignored));
    }

    #[test]
    fn assumption_violation_ignores_test() {
        let mut l = listener();
        l.test_started("t");
        l.step_started(StepDescription::titled("a")).unwrap();
        l.assumption_violated("no network").unwrap();

        let outcome = l.current_outcome().unwrap();
        assert_eq!(outcome.result(), TestResult::Ignored);
        assert_eq!(outcome.steps()[0].result(), TestResult::Aborted);
        assert_eq!(l.step_depth(), 0);
    }

    #[test]
    fn suite_issues_and_tags_are_attached_on_finish() {
        let mut l = listener();
        l.test_suite_started("Checkout");
        l.add_issues_to_current_story(["#12"]);
        l.add_tags_to_current_story([TestTag::new("payments", "feature")]);
        l.test_started("t");
        l.test_finished().unwrap();

        let outcome = l.current_outcome().unwrap();
        assert_eq!(outcome.suite(), Some("Checkout"));
        assert_eq!(outcome.issues(), ["#12"]);
        assert_eq!(outcome.tags(), [TestTag::new("payments", "feature")]);
    }

    #[test]
    fn step_delay_pauses_on_clock() {
        let clock = ManualClock::at_millis(0);
        let config = Configuration {
            step_delay: Duration::from_millis(250),
            ..Configuration::default()
        };
        let mut l = StepListener::new(ContextKey::from("t"), Arc::new(config))
            .with_clock(Arc::new(clock.clone()));
        l.test_started("t");
        l.step_started(StepDescription::titled("a")).unwrap();
        l.step_finished().unwrap();

        assert_eq!(clock.elapsed_since(std::time::UNIX_EPOCH), Duration::from_millis(250));
    }

    #[test]
    fn updating_title_without_step_starts_one() {
        let mut l = listener();
        l.test_started("t");
        l.update_current_step_title("made up").unwrap();
        l.update_current_step_title("renamed").unwrap();

        assert_eq!(descriptions(l.current_outcome().unwrap()), ["renamed"]);
    }

    #[test]
    fn manual_tests_get_configured_result() {
        let config = Configuration {
            manual_test_result: Some("success".into()),
            ..Configuration::default()
        };
        let mut l = StepListener::new(ContextKey::from("t"), Arc::new(config));
        l.test_started("t");
        l.test_is_manual().unwrap();

        let outcome = l.current_outcome().unwrap();
        assert!(outcome.is_manual());
        assert_eq!(outcome.result(), TestResult::Success);
        assert!(outcome.tags().contains(&TestTag::manual()));
    }

    #[test]
    fn examples_track_row_results() {
        let mut l = listener();
        l.test_started("t");
        l.use_examples_from(DataTable::new(["n"], [["1"], ["2"]])).unwrap();
        for (n, fails) in [("1", false), ("2", true)] {
            let row: ExampleData = [("n".to_owned(), n.to_owned())].into_iter().collect();
            l.example_started(row).unwrap();
            l.step_started(StepDescription::titled("check")).unwrap();
            if fails {
                l.step_failed(FailureCause::assertion("odd")).unwrap();
            } else {
                l.step_finished().unwrap();
            }
            l.example_finished().unwrap();
        }

        let outcome = l.current_outcome().unwrap();
        assert_eq!(descriptions(outcome), ["[1] {n=1}", "[2] {n=2}"]);
        let table = outcome.data_table().unwrap();
        assert_eq!(table.row(0).and_then(|r| r.result()), Some(TestResult::Success));
        assert_eq!(table.row(1).and_then(|r| r.result()), Some(TestResult::Failure));
    }

    #[test]
    fn handles_lifecycle_events() {
        let mut l = listener();
        for event in [
            Lifecycle::TestStarted("t".into()),
            Lifecycle::StepStarted(StepDescription::titled("a")),
            Lifecycle::StepFinished,
            Lifecycle::ResultOverridden(TestResult::Compromised),
            Lifecycle::TestFinished,
        ] {
            l.handle(event).unwrap();
        }

        assert_eq!(l.test_outcomes().len(), 1);
        assert_eq!(l.current_outcome().unwrap().result(), TestResult::Compromised);
    }
}
