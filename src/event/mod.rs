// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Key occurrences in the lifecycle of a test run.
//!
//! Framework adapters translate whatever their framework reports into
//! [`Lifecycle`] events, which a [`StepListener`] applies to its model.
//!
//! Within one test the events follow this order:
//! `TestStarted`, then any number of steps opened by `StepStarted` and
//! closed by one of `StepFinished`, `StepFailed`, `StepIgnored` or
//! `StepPending`, then `TestFinished`. `TestRetried` discards the test as if
//! it never started, and `ExampleStarted`/`ExampleFinished` bracket the rows
//! of a data-driven test.
//!
//! [`StepListener`]: crate::StepListener

pub mod retries;

use derive_more::with_trait::Display;

use crate::{
    data_table::ExampleData, step::FailureCause, DataTable, StepDescription,
    TestResult, TestTag,
};

pub use self::retries::Retries;

/// Canonical lifecycle event of a test run.
#[derive(Clone, Debug, Display)]
pub enum Lifecycle {
    /// A suite of tests started.
    #[display("suite `{_0}` started")]
    SuiteStarted(String),

    /// The current suite finished.
    #[display("suite finished")]
    SuiteFinished,

    /// Issues apply to every test of the current suite.
    #[display("suite issues added")]
    SuiteIssues(Vec<String>),

    /// Tags apply to every test of the current suite.
    #[display("suite tags added")]
    SuiteTags(Vec<TestTag>),

    /// A test started.
    #[display("test `{_0}` started")]
    TestStarted(String),

    /// The current test finished.
    #[display("test finished")]
    TestFinished,

    /// The current test is discarded to be run again.
    #[display("test retried")]
    TestRetried,

    /// The current test failed outside of any step.
    #[display("test failed: {_0}")]
    TestFailed(FailureCause),

    /// The result of the current test is forced.
    #[display("test result forced to {_0}")]
    ResultOverridden(TestResult),

    /// The current test is executed by hand.
    #[display("test is manual")]
    TestIsManual,

    /// A step started.
    #[display("step `{}` started", _0.name())]
    StepStarted(StepDescription),

    /// A step started, but isn't going to be executed.
    #[display("skipped step `{}` started", _0.name())]
    SkippedStepStarted(StepDescription),

    /// The current step finished successfully.
    #[display("step finished")]
    StepFinished,

    /// The current step failed.
    #[display("step failed: {_0}")]
    StepFailed(FailureCause),

    /// The current step was not executed.
    #[display("step ignored")]
    StepIgnored,

    /// The current step isn't implemented yet.
    #[display("step pending")]
    StepPending,

    /// The current test runs with the given examples.
    #[display("examples provided")]
    UseExamples(DataTable),

    /// A row of examples started.
    #[display("example started")]
    ExampleStarted(ExampleData),

    /// The current row of examples finished.
    #[display("example finished")]
    ExampleFinished,

    /// A screenshot must be taken now.
    #[display("screenshot requested")]
    TakeScreenshot,

    /// An action changed what the browser shows.
    #[display("screen changed")]
    ScreenChanged,
}
