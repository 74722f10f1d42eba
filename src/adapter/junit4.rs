// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runner executing test bodies one at a time, retrying failing ones.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use tracing::warn;

use crate::{
    dispatch::ContextKey, error::TrackerResult, event::Retries, step::FailureCause, Dispatcher,
    StepListener, TestResult,
};

/// Runner of tests in a single execution context.
///
/// Each test body gets the [`StepListener`] of the context, so its steps can
/// be reported with [`run_step()`]. A failing test is run again up to
/// [`Configuration::max_retries`] times, only the last attempt being kept.
///
/// [`Configuration::max_retries`]: crate::Configuration::max_retries
/// [`run_step()`]: crate::instrument::run_step
#[derive(Debug)]
pub struct RetryingRunner {
    /// Registry of the context listeners.
    dispatcher: Arc<Dispatcher>,

    /// Context the tests run in.
    key: ContextKey,
}

impl RetryingRunner {
    /// Creates a new [`RetryingRunner`] of the current thread.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::in_context(dispatcher, ContextKey::current_thread())
    }

    /// Creates a new [`RetryingRunner`] of the given context.
    #[must_use]
    pub const fn in_context(dispatcher: Arc<Dispatcher>, key: ContextKey) -> Self {
        Self { dispatcher, key }
    }

    /// Returns the context the tests run in.
    #[must_use]
    pub const fn key(&self) -> &ContextKey {
        &self.key
    }

    /// Runs the named test `body`, returning the result of its last attempt.
    ///
    /// Manual, pending and ignored tests are recorded without running.
    /// A panic of the `body` outside of any step fails the test.
    ///
    /// # Errors
    ///
    /// If the `body` reports steps in a state they can't be applied in.
    pub fn run_test<F>(&self, name: &str, mut body: F) -> TrackerResult<TestResult>
    where
        F: FnMut(&Mutex<StepListener>),
    {
        let listener = self.dispatcher.listener(&self.key);
        let defaults = self.dispatcher.defaults();

        if defaults.is_manual(name) {
            return Self::record(&listener, name, StepListener::test_is_manual);
        }
        match defaults.for_test(name) {
            Some(TestResult::Pending) => {
                return Self::record(&listener, name, StepListener::test_pending);
            }
            Some(TestResult::Ignored) => {
                return Self::record(&listener, name, StepListener::test_ignored);
            }
            _ => {}
        }

        let mut retries = Retries::initial(self.dispatcher.config().max_retries);
        loop {
            if retries.current > 0 {
                warn!(
                    "{name} failed, making attempt number {} out of 1 base call + {} retries",
                    retries.current,
                    retries.max(),
                );
                lock(&listener).test_retried()?;
            }

            let result = Self::attempt(&listener, name, &mut body)?;
            if !result.is_failure_or_error() {
                return Ok(result);
            }
            match retries.next_try() {
                Some(next) => retries = next,
                None => return Ok(result),
            }
        }
    }

    /// Runs a single attempt of the test `body`.
    fn attempt<F>(
        listener: &Mutex<StepListener>,
        name: &str,
        body: &mut F,
    ) -> TrackerResult<TestResult>
    where
        F: FnMut(&Mutex<StepListener>),
    {
        lock(listener).test_started(name);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body(listener))) {
            lock(listener).test_failed(FailureCause::from_panic(&*payload))?;
        }
        let mut listener = lock(listener);
        listener.test_finished()?;
        Ok(listener.current_outcome().map_or(TestResult::Success, |o| o.result()))
    }

    /// Records the named test without running it.
    fn record(
        listener: &Mutex<StepListener>,
        name: &str,
        mark: fn(&mut StepListener) -> TrackerResult<()>,
    ) -> TrackerResult<TestResult> {
        let mut listener = lock(listener);
        listener.test_started(name);
        mark(&mut *listener)?;
        listener.test_finished()?;
        Ok(listener.current_outcome().map_or(TestResult::Success, |o| o.result()))
    }
}

fn lock(listener: &Mutex<StepListener>) -> std::sync::MutexGuard<'_, StepListener> {
    listener.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{adapter::Annotations, instrument::run_step, Configuration, StepDescription};

    fn runner(max_retries: usize, marks: Annotations) -> RetryingRunner {
        let config = Configuration { max_retries, ..Configuration::default() };
        let dispatcher = Dispatcher::new(Arc::new(config)).with_defaults(Arc::new(marks));
        RetryingRunner::in_context(Arc::new(dispatcher), ContextKey::from("junit4"))
    }

    fn outcomes(runner: &RetryingRunner) -> Vec<crate::TestOutcome> {
        runner.dispatcher.with(runner.key(), |l| l.test_outcomes())
    }

    #[test]
    fn flaky_test_is_kept_once() {
        let runner = runner(2, Annotations::default());
        let attempts = Cell::new(0);

        let result = runner
            .run_test("flaky", |l| {
                attempts.set(attempts.get() + 1);
                run_step(l, StepDescription::titled("check"), || {
                    assert!(attempts.get() > 1, "assertion failed: first attempt");
                })
                .unwrap();
            })
            .unwrap();

        assert_eq!(result, TestResult::Success);
        assert_eq!(attempts.get(), 2);
        assert_eq!(outcomes(&runner).len(), 1);
    }

    #[test]
    fn retries_are_bounded() {
        let runner = runner(1, Annotations::default());
        let attempts = Cell::new(0);

        let result = runner
            .run_test("broken", |_| {
                attempts.set(attempts.get() + 1);
                panic!("assertion failed: always");
            })
            .unwrap();

        assert_eq!(result, TestResult::Failure);
        assert_eq!(attempts.get(), 2);
        assert_eq!(outcomes(&runner).len(), 1);
    }

    #[test]
    fn marked_tests_are_not_run() {
        let runner = runner(
            0,
            Annotations::default().pending("later").ignored("off").manual("by hand"),
        );

        for name in ["later", "off", "by hand"] {
            let _ = runner.run_test(name, |_| unreachable!("must not run")).unwrap();
        }

        let outcomes = outcomes(&runner);
        let result_of = |name: &str| {
            outcomes.iter().find(|o| o.name() == name).map(crate::TestOutcome::result)
        };
        assert_eq!(result_of("later"), Some(TestResult::Pending));
        assert_eq!(result_of("off"), Some(TestResult::Ignored));
        assert_eq!(result_of("by hand"), Some(TestResult::Pending));
        assert!(outcomes.iter().any(crate::TestOutcome::is_manual));
    }
}
