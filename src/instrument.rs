// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reporting step boundaries around plain Rust code.
//!
//! Step implementations wrap their bodies into [`run_step()`], which reports
//! the step start and its outcome, catches panics as failures, and doesn't
//! run the body at all once the test can't continue.
//!
//! ```rust
//! # use std::sync::{Arc, Mutex};
//! # use step_outcomes::{
//! #     instrument::run_step, Configuration, ContextKey, StepDescription, StepListener,
//! #     TestResult,
//! # };
//! let listener = Mutex::new(StepListener::new(
//!     ContextKey::from("docs"),
//!     Arc::new(Configuration::default()),
//! ));
//! listener.lock().unwrap().test_started("checkout");
//!
//! let total = run_step(&listener, StepDescription::for_method("addToCart"), || 2 + 2);
//! run_step(&listener, StepDescription::for_method("pay"), || assert_eq!(1, 2)).unwrap();
//! let skipped = run_step(&listener, StepDescription::for_method("printReceipt"), || 1);
//!
//! assert_eq!(total, Ok(Some(4)));
//! assert_eq!(skipped, Ok(None));
//! let listener = listener.lock().unwrap();
//! let steps = listener.current_outcome().unwrap().steps();
//! assert_eq!(steps[1].result(), TestResult::Failure);
//! assert_eq!(steps[2].result(), TestResult::Skipped);
//! ```

use std::{
    convert::Infallible,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
};

use crate::{
    dispatch::ContextKey, error::TrackerResult, event::Lifecycle, step::FailureCause,
    Dispatcher, StepDescription, StepListener, TestResult,
};

/// How a step is reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepMode {
    /// The step is executed.
    Run,

    /// The step isn't implemented yet, so isn't executed.
    Pending,

    /// The step is marked as ignored, or the test can't continue.
    Ignore,

    /// Steps are recorded as successful without being executed.
    DryRun,
}

impl StepMode {
    /// Decides how the described step is reported by the given `listener`.
    #[must_use]
    pub fn of(listener: &StepListener, step: &StepDescription) -> Self {
        match listener.defaults().for_step(step) {
            Some(TestResult::Pending) => Self::Pending,
            Some(TestResult::Ignored) => Self::Ignore,
            _ if listener.a_step_has_failed() || listener.is_suspended() => Self::Ignore,
            _ if listener.config().dry_run => Self::DryRun,
            _ => Self::Run,
        }
    }
}

/// Something step boundaries are reported to.
///
/// Implementations must not hold any lock between calls, as steps may nest.
pub trait StepBoundary {
    /// Decides how the described step is reported.
    fn step_mode(&self, step: &StepDescription) -> StepMode;

    /// Reports the given lifecycle `event`.
    ///
    /// # Errors
    ///
    /// If the `event` can't be applied to the tracked test.
    fn notify(&self, event: Lifecycle) -> TrackerResult<()>;
}

impl StepBoundary for Mutex<StepListener> {
    fn step_mode(&self, step: &StepDescription) -> StepMode {
        StepMode::of(&self.lock().unwrap_or_else(PoisonError::into_inner), step)
    }

    fn notify(&self, event: Lifecycle) -> TrackerResult<()> {
        self.lock().unwrap_or_else(PoisonError::into_inner).handle(event)
    }
}

/// Reports to the [`StepListener`] of the current thread.
impl StepBoundary for Dispatcher {
    fn step_mode(&self, step: &StepDescription) -> StepMode {
        self.with(&ContextKey::current_thread(), |l| StepMode::of(l, step))
    }

    fn notify(&self, event: Lifecycle) -> TrackerResult<()> {
        self.dispatch(&ContextKey::current_thread(), event)
    }
}

/// Runs the `body` of the described step, reporting its boundaries to the
/// given `boundary`.
///
/// Returns [`None`] if the `body` panicked or wasn't executed.
///
/// # Errors
///
/// If no test is in progress.
pub fn run_step<B, T>(
    boundary: &B,
    step: StepDescription,
    body: impl FnOnce() -> T,
) -> TrackerResult<Option<T>>
where
    B: StepBoundary + ?Sized,
{
    run_fallible_step(boundary, step, || Ok::<_, Infallible>(body()))
}

/// Runs the fallible `body` of the described step, reporting its boundaries
/// to the given `boundary`.
///
/// An [`Err`] returned by the `body` fails the step with
/// [`FailureCause::from_error()`].
///
/// Returns [`None`] if the `body` failed or wasn't executed.
///
/// # Errors
///
/// If no test is in progress.
pub fn run_fallible_step<B, T, E>(
    boundary: &B,
    step: StepDescription,
    body: impl FnOnce() -> Result<T, E>,
) -> TrackerResult<Option<T>>
where
    B: StepBoundary + ?Sized,
    E: fmt::Display,
{
    let mode = boundary.step_mode(&step);
    if mode != StepMode::Run {
        boundary.notify(Lifecycle::SkippedStepStarted(step))?;
        boundary.notify(match mode {
            StepMode::Pending => Lifecycle::StepPending,
            StepMode::Ignore => Lifecycle::StepIgnored,
            StepMode::DryRun | StepMode::Run => Lifecycle::StepFinished,
        })?;
        return Ok(None);
    }

    boundary.notify(Lifecycle::StepStarted(step))?;
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => {
            boundary.notify(Lifecycle::StepFinished)?;
            Ok(Some(value))
        }
        Ok(Err(e)) => {
            boundary.notify(Lifecycle::StepFailed(FailureCause::from_error(&e)))?;
            Ok(None)
        }
        Err(payload) => {
            boundary.notify(Lifecycle::StepFailed(FailureCause::from_panic(&*payload)))?;
            Ok(None)
        }
    }
}
