// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Listener of a test platform reporting the execution of a test plan.
//!
//! The platform reports containers (test classes, parametrized test
//! templates) and tests (methods, parametrized invocations) by their
//! [`TestIdentifier`]s. Events of one test class share an execution context,
//! keyed by the identifier with its method suffix dropped.

use std::{collections::HashMap, sync::Arc};

use tracing::trace;

use crate::{
    dispatch::ContextKey, error::TrackerResult, step::FailureCause, DataTable, Dispatcher,
    StepListener, TestOutcome, TestResult,
};

/// Kind of a node of a test plan.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestType {
    /// Groups other nodes.
    Container,

    /// Executes a test.
    Test,
}

/// Source code a node of a test plan comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestSource {
    /// A test class.
    Class {
        /// Name of the class.
        class: String,
    },

    /// A test method.
    Method {
        /// Name of the class declaring the method.
        class: String,

        /// Name of the method.
        method: String,
    },
}

/// Node of a test plan, as reported by the test platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestIdentifier {
    /// Identifier unique across the test plan.
    pub unique_id: String,

    /// Human-readable name.
    pub display_name: String,

    /// Kind of this node.
    pub kind: TestType,

    /// Source code of this node, if known.
    pub source: Option<TestSource>,
}

impl TestIdentifier {
    /// Creates a [`TestIdentifier`] of a test class.
    #[must_use]
    pub fn class(unique_id: impl Into<String>, class: impl Into<String>) -> Self {
        let class = class.into();
        Self {
            unique_id: unique_id.into(),
            display_name: class.clone(),
            kind: TestType::Container,
            source: Some(TestSource::Class { class }),
        }
    }

    /// Creates a [`TestIdentifier`] of a test method.
    #[must_use]
    pub fn method(
        unique_id: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        let method = method.into();
        Self {
            unique_id: unique_id.into(),
            display_name: format!("{method}()"),
            kind: TestType::Test,
            source: Some(TestSource::Method { class: class.into(), method }),
        }
    }

    /// Creates a [`TestIdentifier`] of a parametrized test method, grouping
    /// its invocations.
    #[must_use]
    pub fn template(
        unique_id: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self { kind: TestType::Container, ..Self::method(unique_id, class, method) }
    }

    /// Replaces the human-readable name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Returns the `Class.method` name of a method node.
    fn method_key(&self) -> Option<String> {
        match &self.source {
            Some(TestSource::Method { class, method }) => Some(format!("{class}.{method}")),
            _ => None,
        }
    }

    /// Returns the test name of a method node.
    fn test_name(&self) -> &str {
        match &self.source {
            Some(TestSource::Method { method, .. }) => method.as_str(),
            _ => self.display_name.as_str(),
        }
    }

    /// Returns the display name without trailing parentheses.
    fn bare_display_name(&self) -> &str {
        self.display_name.strip_suffix("()").unwrap_or(&self.display_name)
    }

    fn class_name(&self) -> Option<&str> {
        match &self.source {
            Some(TestSource::Class { class } | TestSource::Method { class, .. }) => {
                Some(class.as_str())
            }
            None => None,
        }
    }

    fn is_class_container(&self) -> bool {
        self.kind == TestType::Container
            && matches!(self.source, Some(TestSource::Class { .. }))
    }

    fn is_method(&self) -> bool {
        matches!(self.source, Some(TestSource::Method { .. }))
    }
}

/// Final status of an executed node.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionStatus {
    /// Completed without problems.
    Successful,

    /// Stopped before completion, e.g. by a violated assumption.
    Aborted(Option<FailureCause>),

    /// Failed with the given cause.
    Failed(Option<FailureCause>),
}

impl ExecutionStatus {
    fn cause(&self) -> Option<&FailureCause> {
        match self {
            Self::Successful => None,
            Self::Aborted(cause) | Self::Failed(cause) => cause.as_ref(),
        }
    }
}

/// Counters of the executed nodes of a test plan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionSummary {
    /// Number of containers completed without problems.
    pub containers_succeeded: usize,

    /// Number of aborted containers.
    pub containers_aborted: usize,

    /// Number of failed containers.
    pub containers_failed: usize,

    /// Number of tests completed without problems.
    pub tests_succeeded: usize,

    /// Number of aborted tests.
    pub tests_aborted: usize,

    /// Number of failed tests.
    pub tests_failed: usize,

    /// Failures by the unique identifier of the failed node.
    pub failures: Vec<(String, FailureCause)>,
}

impl ExecutionSummary {
    /// Returns the total number of executed tests.
    #[must_use]
    pub const fn tests_executed(&self) -> usize {
        self.tests_succeeded + self.tests_aborted + self.tests_failed
    }

    /// Indicates whether anything failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.tests_failed + self.containers_failed > 0
    }

    fn record(&mut self, id: &TestIdentifier, status: &ExecutionStatus) {
        let (containers, tests) = match status {
            ExecutionStatus::Successful => {
                (&mut self.containers_succeeded, &mut self.tests_succeeded)
            }
            ExecutionStatus::Aborted(_) => {
                (&mut self.containers_aborted, &mut self.tests_aborted)
            }
            ExecutionStatus::Failed(_) => (&mut self.containers_failed, &mut self.tests_failed),
        };
        match id.kind {
            TestType::Container => *containers += 1,
            TestType::Test => *tests += 1,
        }
        if let ExecutionStatus::Failed(Some(cause)) = status {
            self.failures.push((id.unique_id.clone(), cause.clone()));
        }
    }
}

/// Listener translating test platform events into [`StepListener`] calls.
#[derive(Debug)]
pub struct ExecutionListener {
    /// Registry of the context listeners.
    dispatcher: Arc<Dispatcher>,

    /// Examples of parametrized methods, keyed by `Class.method`.
    data_tables: HashMap<String, DataTable>,

    /// Index of the invocation of the parametrized method being executed.
    parameter_set: usize,

    /// Counters of the executed nodes.
    summary: ExecutionSummary,

    /// Error types the test being executed is expected to fail with.
    expected_errors: Vec<String>,
}

impl ExecutionListener {
    /// Creates a new [`ExecutionListener`] reporting to the given
    /// [`Dispatcher`].
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            data_tables: HashMap::new(),
            parameter_set: 0,
            summary: ExecutionSummary::default(),
            expected_errors: Vec::new(),
        }
    }

    /// Registers the examples of the parametrized `Class.method`.
    #[must_use]
    pub fn with_data_table(mut self, method: impl Into<String>, table: DataTable) -> Self {
        drop(self.data_tables.insert(method.into(), table));
        self
    }

    /// Expects the test being executed to fail with the given error type.
    /// Such failures are reset when the test finishes.
    pub fn expect_error(&mut self, error_type: impl Into<String>) {
        self.expected_errors.push(error_type.into());
    }

    /// Returns the counters of the executed nodes.
    #[must_use]
    pub const fn summary(&self) -> &ExecutionSummary {
        &self.summary
    }

    /// Returns the outcomes of all the executed tests.
    #[must_use]
    pub fn test_outcomes(&self) -> Vec<TestOutcome> {
        self.dispatcher.test_outcomes()
    }

    /// Starts a new test plan, resetting the counters.
    pub fn test_plan_execution_started(&mut self) {
        self.summary = ExecutionSummary::default();
    }

    /// Handles the start of a node.
    ///
    /// # Errors
    ///
    /// If the node can't be applied to the state of its context.
    pub fn execution_started(&mut self, id: &TestIdentifier) -> TrackerResult<()> {
        if id.source.is_none() {
            trace!("Nothing to start for `{}` without source", id.unique_id);
            return Ok(());
        }
        let key = ContextKey::for_test_id(&id.unique_id);

        if id.is_class_container() {
            let class = id.class_name().unwrap_or_default().to_owned();
            self.dispatcher.with(&key, |l| {
                l.clear_test_outcomes();
                l.test_suite_started(class);
            });
        }

        if id.is_method() {
            if id.kind == TestType::Test {
                self.start_test(&key, id, id.test_name());
            }
            let table = id.method_key().and_then(|m| self.data_tables.get(&m).cloned());
            if let Some(table) = table {
                match id.kind {
                    TestType::Container => self.parameter_set = 0,
                    TestType::Test => {
                        let row = table.row(self.parameter_set).map(|r| r.values().clone());
                        let table = table.starting_at_row(self.parameter_set);
                        self.dispatcher.with(&key, |l| {
                            l.use_examples_from(table)?;
                            l.example_started(row.unwrap_or_default())
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Handles the completion of a node.
    ///
    /// # Errors
    ///
    /// If the node can't be applied to the state of its context.
    pub fn execution_finished(
        &mut self,
        id: &TestIdentifier,
        status: ExecutionStatus,
    ) -> TrackerResult<()> {
        if id.source.is_none() {
            return Ok(());
        }
        let key = ContextKey::for_test_id(&id.unique_id);

        if id.is_class_container() {
            self.dispatcher.with(&key, StepListener::test_suite_finished);
        }
        if id.kind == TestType::Test && id.is_method() {
            self.reconcile(&key, id, &status)?;
            let data_driven =
                id.method_key().is_some_and(|m| self.data_tables.contains_key(&m));
            if data_driven {
                self.dispatcher.with(&key, StepListener::example_finished)?;
                self.parameter_set += 1;
            }
            self.dispatcher.with(&key, StepListener::test_finished)?;
        }

        self.summary.record(id, &status);
        let result = match status {
            ExecutionStatus::Failed(Some(cause)) => {
                self.dispatcher.with(&key, |l| l.test_failed(cause))
            }
            _ => Ok(()),
        };
        self.expected_errors.clear();
        result
    }

    /// Handles a node the test platform decided not to execute, recording a
    /// test method as [`TestResult::Ignored`].
    ///
    /// # Errors
    ///
    /// If the node can't be applied to the state of its context.
    pub fn execution_skipped(&mut self, id: &TestIdentifier, reason: &str) -> TrackerResult<()> {
        if !id.is_method() {
            return Ok(());
        }
        trace!("Skipping `{}`: {reason}", id.unique_id);
        let key = ContextKey::for_test_id(&id.unique_id);
        self.start_test(&key, id, id.bare_display_name());
        self.dispatcher.with(&key, |l| {
            l.test_ignored()?;
            l.test_finished()
        })
    }

    fn start_test(&self, key: &ContextKey, id: &TestIdentifier, name: &str) {
        let class = id.class_name().unwrap_or_default().to_owned();
        self.dispatcher.with(key, |l| {
            l.test_suite_started(class);
            l.test_started(name);
        });
    }

    /// Reconciles the status reported by the platform with the outcome of
    /// the test in flight.
    fn reconcile(
        &self,
        key: &ContextKey,
        id: &TestIdentifier,
        status: &ExecutionStatus,
    ) -> TrackerResult<()> {
        let manual = self.dispatcher.defaults().is_manual(id.test_name());
        self.dispatcher.with(key, |l| {
            if manual {
                l.test_is_manual()?;
            }
            for error_type in &self.expected_errors {
                let _ = l.exception_expected(error_type)?;
            }

            let result = l.current_outcome().map_or(TestResult::Success, TestOutcome::result);
            match status {
                ExecutionStatus::Aborted(cause) if result == TestResult::Success => {
                    if let Some(cause) = cause {
                        l.update_current_step_failure_cause(cause.clone())?;
                    }
                    l.override_result_to(TestResult::Aborted)?;
                }
                ExecutionStatus::Failed(_) if result.is_less_severe_than(TestResult::Failure) => {
                    if let Some(cause) = status.cause() {
                        l.update_current_step_failure_cause(cause.clone())?;
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }
}

/// Merges the outcomes of the invocations of each parametrized test into a
/// single outcome per test method, placed where its first invocation was.
///
/// Outcomes of non-parametrized tests are left as they are.
#[must_use]
pub fn aggregate_by_test_method(
    outcomes: impl IntoIterator<Item = TestOutcome>,
) -> Vec<TestOutcome> {
    let mut aggregated: Vec<TestOutcome> = Vec::new();
    let mut positions = HashMap::<_, usize>::new();
    for outcome in outcomes {
        if !outcome.is_data_driven() {
            aggregated.push(outcome);
            continue;
        }
        let key = (outcome.suite().map(ToOwned::to_owned), outcome.name().to_owned());
        match positions.get(&key) {
            Some(&at) => aggregated[at].merge_invocation(outcome),
            None => {
                drop(positions.insert(key, aggregated.len()));
                aggregated.push(outcome);
            }
        }
    }
    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{step::FailureKind, StepDescription};

    const CLASS_ID: &str = "[engine:junit-jupiter]/[class:Checkout]";

    fn listener() -> ExecutionListener {
        ExecutionListener::new(Arc::new(Dispatcher::new(Arc::default())))
    }

    fn method(name: &str) -> TestIdentifier {
        TestIdentifier::method(format!("{CLASS_ID}/[method:{name}()]"), "Checkout", name)
    }

    fn class() -> TestIdentifier {
        TestIdentifier::class(CLASS_ID, "Checkout")
    }

    #[test]
    fn records_tests_of_a_class() {
        let mut l = listener();
        l.test_plan_execution_started();
        l.execution_started(&class()).unwrap();

        l.execution_started(&method("pays")).unwrap();
        l.dispatcher.with(&ContextKey::for_test_id(CLASS_ID), |s| {
            s.step_started(StepDescription::titled("Pay")).unwrap();
            s.step_finished().unwrap();
        });
        l.execution_finished(&method("pays"), ExecutionStatus::Successful).unwrap();

        l.execution_started(&method("refunds")).unwrap();
        l.execution_finished(
            &method("refunds"),
            ExecutionStatus::Failed(Some(FailureCause::assertion("no refund"))),
        )
        .unwrap();
        l.execution_finished(&class(), ExecutionStatus::Successful).unwrap();

        let outcomes = l.test_outcomes();
        assert_eq!(outcomes.len(), 2);
        let refunds = outcomes.iter().find(|o| o.name() == "refunds").unwrap();
        assert_eq!(refunds.result(), TestResult::Failure);
        assert_eq!(refunds.suite(), Some("Checkout"));

        let summary = l.summary();
        assert_eq!(summary.tests_succeeded, 1);
        assert_eq!(summary.tests_failed, 1);
        assert_eq!(summary.containers_succeeded, 1);
        assert_eq!(summary.tests_executed(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn aborted_test_is_recorded_as_aborted() {
        let mut l = listener();
        l.execution_started(&class()).unwrap();
        l.execution_started(&method("needs_network")).unwrap();
        l.execution_finished(
            &method("needs_network"),
            ExecutionStatus::Aborted(Some(FailureCause::new(
                FailureKind::Aborted,
                "TestAbortedException",
                "offline",
            ))),
        )
        .unwrap();

        let outcomes = l.test_outcomes();
        assert_eq!(outcomes[0].result(), TestResult::Aborted);
        assert_eq!(l.summary().tests_aborted, 1);
    }

    #[test]
    fn expected_errors_are_reset() {
        let mut l = listener();
        l.execution_started(&class()).unwrap();
        l.execution_started(&method("times_out")).unwrap();
        l.expect_error("Timeout");
        l.dispatcher.with(&ContextKey::for_test_id(CLASS_ID), |s| {
            s.step_started(StepDescription::titled("Wait")).unwrap();
            s.step_failed(FailureCause::new(FailureKind::Error, "Timeout", "slow")).unwrap();
        });
        l.execution_finished(&method("times_out"), ExecutionStatus::Successful).unwrap();

        assert_eq!(l.test_outcomes()[0].result(), TestResult::Success);
    }

    #[test]
    fn skipped_methods_are_ignored() {
        let mut l = listener();
        l.execution_skipped(&method("disabled"), "@Disabled").unwrap();
        l.execution_skipped(&class(), "@Disabled").unwrap();

        let outcomes = l.test_outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name(), "disabled");
        assert_eq!(outcomes[0].result(), TestResult::Ignored);
    }

    #[test]
    fn parametrized_invocations_aggregate() {
        let table = DataTable::new(["n"], [["1"], ["2"]]);
        let mut l = listener().with_data_table("Checkout.counts", table);
        let template_id = format!("{CLASS_ID}/[test-template:counts(int)]");
        let template = TestIdentifier::template(&template_id, "Checkout", "counts");

        l.execution_started(&class()).unwrap();
        l.execution_started(&template).unwrap();
        let statuses = [
            ExecutionStatus::Successful,
            ExecutionStatus::Failed(Some(FailureCause::assertion("odd"))),
        ];
        for (n, status) in (1..).zip(statuses) {
            let invocation = TestIdentifier::method(
                format!("{template_id}/[test-template-invocation:#{n}]"),
                "Checkout",
                "counts",
            )
            .with_display_name(format!("[{n}] {n}"));
            l.execution_started(&invocation).unwrap();
            l.execution_finished(&invocation, status).unwrap();
        }
        l.execution_finished(&template, ExecutionStatus::Successful).unwrap();

        let outcomes = aggregate_by_test_method(l.test_outcomes());
        assert_eq!(outcomes.len(), 1);
        let counts = &outcomes[0];
        let steps: Vec<_> = counts.steps().iter().map(|s| s.description()).collect();
        assert_eq!(steps, ["[1] {n=1}", "[2] {n=2}"]);
        let rows = counts.data_table().unwrap().rows();
        assert_eq!(rows[0].result(), Some(TestResult::Success));
        assert_eq!(rows[1].result(), Some(TestResult::Failure));
        assert_eq!(counts.result(), TestResult::Failure);
    }
}
