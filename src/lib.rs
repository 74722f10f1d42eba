// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tracking of test and step outcomes.
//!
//! A [`StepListener`] receives the lifecycle of tests and their steps, as
//! reported by a test framework adapter or by [`instrument::run_step()`], and
//! builds a [`TestOutcome`] per executed test: a tree of [`TestStep`]s with
//! their [`TestResult`]s, durations, failure causes and screenshots.
//!
//! Concurrently running tests are kept apart by the [`Dispatcher`], holding
//! one [`StepListener`] per execution context.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use step_outcomes::{
//! #     instrument::run_step, Configuration, Dispatcher, StepDescription, TestResult,
//! # };
//! let dispatcher = Dispatcher::new(Arc::new(Configuration::default()));
//! dispatcher.with(&Default::default(), |l| l.test_started("login"));
//!
//! run_step(&dispatcher, StepDescription::for_method("openHomePage"), || ()).unwrap();
//! run_step(&dispatcher, StepDescription::for_method("clickLogin").fluent(), || ()).unwrap();
//! run_step(&dispatcher, StepDescription::for_method("enterPassword"), || ()).unwrap();
//!
//! dispatcher.with(&Default::default(), |l| l.test_finished()).unwrap();
//! let outcomes = dispatcher.test_outcomes();
//! assert_eq!(outcomes[0].result(), TestResult::Success);
//! assert_eq!(outcomes[0].step_count(), 2);
//! ```

pub mod adapter;
pub mod clock;
pub mod config;
pub mod data_table;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod event;
pub mod instrument;
pub mod listener;
pub mod logging;
pub mod outcome;
pub mod outcomes;
pub mod result;
pub mod screenshot;
pub mod step;
pub mod tag;

#[doc(inline)]
pub use self::{
    config::Configuration,
    data_table::{DataTable, DataTableRow},
    dispatch::{ContextKey, Dispatcher},
    error::{ConfigError, ScreenshotError, TrackerError, TrackerResult},
    event::Lifecycle,
    listener::StepListener,
    outcome::TestOutcome,
    outcomes::Outcomes,
    result::TestResult,
    screenshot::ScreenshotAndHtmlSource,
    step::{FailureCause, StepDescription, StepPath, TestStep},
    tag::TestTag,
};
