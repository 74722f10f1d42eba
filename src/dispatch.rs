// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Routing of lifecycle events to the [`StepListener`] of their execution
//! context.
//!
//! Tests may run concurrently, each on its own thread or under its own test
//! identifier. Every such execution context gets its own [`StepListener`],
//! so events of one test never leak into another one.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use step_outcomes::{Configuration, ContextKey, Dispatcher, Lifecycle, StepDescription};
//! let dispatcher = Dispatcher::new(Arc::new(Configuration::default()));
//! let key = ContextKey::from("worker-1");
//!
//! dispatcher.dispatch(&key, Lifecycle::TestStarted("checkout".into())).unwrap();
//! dispatcher
//!     .dispatch(&key, Lifecycle::StepStarted(StepDescription::titled("Pay")))
//!     .unwrap();
//! dispatcher.dispatch(&key, Lifecycle::StepFinished).unwrap();
//! dispatcher.dispatch(&key, Lifecycle::TestFinished).unwrap();
//!
//! assert_eq!(dispatcher.test_outcomes().len(), 1);
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
};

use derive_more::with_trait::Display;
use lazy_regex::{regex, Lazy, Regex};
use tracing::debug;

use crate::{
    adapter::{DefaultResults, NoDefaults},
    clock::{Clock, SystemClock},
    driver::{DriverProvider, NoDriver},
    error::TrackerResult,
    event::Lifecycle,
    Configuration, StepListener, TestOutcome,
};

/// Identifier of an execution context, keying its [`StepListener`].
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ContextKey(String);

impl ContextKey {
    /// Creates a [`ContextKey`] of the current thread.
    ///
    /// Threads of a pool often share a name, so the name only prefixes the
    /// [`thread::ThreadId`].
    #[must_use]
    pub fn current_thread() -> Self {
        let current = thread::current();
        Self(match current.name() {
            Some(name) => format!("{name}-{:?}", current.id()),
            None => format!("{:?}", current.id()),
        })
    }

    /// Creates a [`ContextKey`] out of the unique identifier of a test,
    /// dropping any method or template invocation suffix, so all the
    /// invocations of a parametrized test share one context.
    #[must_use]
    pub fn for_test_id(id: &str) -> Self {
        static INVOCATION_SUFFIX: &Lazy<Regex> = regex!(r"/\[(?:method|test-template):.*$");

        Self(INVOCATION_SUFFIX.replace(id, "").into_owned())
    }

    /// Returns this key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextKey {
    fn default() -> Self {
        Self::current_thread()
    }
}

impl From<String> for ContextKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ContextKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Registry of [`StepListener`]s, one per execution context.
///
/// Listeners are created on the first event of their context, sharing the
/// [`Configuration`], [`Clock`], [`DriverProvider`] and [`DefaultResults`]
/// of this [`Dispatcher`].
#[derive(Debug)]
pub struct Dispatcher {
    /// Shared settings.
    config: Arc<Configuration>,

    /// Shared clock.
    clock: Arc<dyn Clock>,

    /// Shared browser drivers.
    drivers: Arc<dyn DriverProvider>,

    /// Shared default results.
    defaults: Arc<dyn DefaultResults>,

    /// Listeners of the known contexts.
    listeners: Mutex<HashMap<ContextKey, Arc<Mutex<StepListener>>>>,
}

impl Dispatcher {
    /// Creates a new [`Dispatcher`] with the given settings, using the
    /// system clock and no browser.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            drivers: Arc::new(NoDriver),
            defaults: Arc::new(NoDefaults),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the [`Clock`] of the listeners created from now on.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the [`DriverProvider`] of the listeners created from now on.
    #[must_use]
    pub fn with_drivers(mut self, drivers: Arc<dyn DriverProvider>) -> Self {
        self.drivers = drivers;
        self
    }

    /// Replaces the [`DefaultResults`] of the listeners created from now on.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Arc<dyn DefaultResults>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the shared settings.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Returns the shared [`DefaultResults`].
    #[must_use]
    pub fn defaults(&self) -> &dyn DefaultResults {
        &*self.defaults
    }

    /// Returns the [`StepListener`] of the given context, creating it on
    /// first use.
    pub fn listener(&self, key: &ContextKey) -> Arc<Mutex<StepListener>> {
        let mut listeners = self.lock();
        if let Some(listener) = listeners.get(key) {
            return Arc::clone(listener);
        }
        debug!("Registering step listener of `{key}`");
        let listener = Arc::new(Mutex::new(
            StepListener::new(key.clone(), Arc::clone(&self.config))
                .with_clock(Arc::clone(&self.clock))
                .with_drivers(Arc::clone(&self.drivers))
                .with_defaults(Arc::clone(&self.defaults)),
        ));
        drop(listeners.insert(key.clone(), Arc::clone(&listener)));
        listener
    }

    /// Returns the [`StepListener`] of the current thread.
    pub fn current(&self) -> Arc<Mutex<StepListener>> {
        self.listener(&ContextKey::current_thread())
    }

    /// Runs `f` against the [`StepListener`] of the given context.
    pub fn with<T>(&self, key: &ContextKey, f: impl FnOnce(&mut StepListener) -> T) -> T {
        let listener = self.listener(key);
        let mut guard = listener.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Applies the `event` to the [`StepListener`] of the given context.
    ///
    /// # Errors
    ///
    /// If the `event` can't be applied in the current state of the context.
    pub fn dispatch(&self, key: &ContextKey, event: Lifecycle) -> TrackerResult<()> {
        self.with(key, |listener| listener.handle(event))
    }

    /// Returns the outcomes of all the contexts, sorted by start time and
    /// name.
    #[must_use]
    pub fn test_outcomes(&self) -> Vec<TestOutcome> {
        let listeners: Vec<_> = self.lock().values().map(Arc::clone).collect();
        let mut outcomes: Vec<_> = listeners
            .iter()
            .flat_map(|l| l.lock().unwrap_or_else(PoisonError::into_inner).test_outcomes())
            .collect();
        outcomes.sort_by_cached_key(TestOutcome::sort_key);
        outcomes
    }

    /// Returns the known contexts.
    #[must_use]
    pub fn keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Forgets the [`StepListener`] of the given context, returning it.
    pub fn remove(&self, key: &ContextKey) -> Option<Arc<Mutex<StepListener>>> {
        self.lock().remove(key)
    }

    /// Forgets all the [`StepListener`]s.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContextKey, Arc<Mutex<StepListener>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{clock::ManualClock, StepDescription};

    #[test]
    fn test_ids_drop_invocation_suffix() {
        assert_eq!(
            ContextKey::for_test_id("[engine:junit]/[class:Checkout]/[method:pays()]").as_str(),
            "[engine:junit]/[class:Checkout]",
        );
        assert_eq!(
            ContextKey::for_test_id("[class:A]/[test-template:t(int)]/[invocation:#2]").as_str(),
            "[class:A]",
        );
        assert_eq!(ContextKey::for_test_id("[class:A]").as_str(), "[class:A]");
    }

    #[test]
    fn listeners_are_created_once_per_context() {
        let dispatcher = Dispatcher::new(Arc::default());
        let key = ContextKey::from("a");

        let first = dispatcher.listener(&key);
        let second = dispatcher.listener(&key);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(dispatcher.keys(), [key]);
    }

    #[test]
    fn contexts_are_isolated() {
        let dispatcher = Dispatcher::new(Arc::default());
        let (a, b) = (ContextKey::from("a"), ContextKey::from("b"));

        dispatcher.dispatch(&a, Lifecycle::TestStarted("in a".into())).unwrap();
        dispatcher
            .dispatch(&a, Lifecycle::StepStarted(StepDescription::titled("step")))
            .unwrap();

        assert!(dispatcher.dispatch(&b, Lifecycle::StepFinished).is_err());
        assert_eq!(dispatcher.with(&a, |l| l.step_depth()), 1);
        assert_eq!(dispatcher.with(&b, |l| l.outcomes().len()), 0);
    }

    #[test]
    fn current_thread_key_differs_across_threads() {
        let here = ContextKey::current_thread();
        let there = thread::spawn(ContextKey::current_thread).join().unwrap();

        assert_ne!(here, there);
    }

    #[test]
    fn same_named_threads_get_own_contexts() {
        let dispatcher = Arc::new(Dispatcher::new(Arc::default()));

        let workers: Vec<_> = (0..2)
            .map(|n| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::Builder::new()
                    .name("pool-worker".into())
                    .spawn(move || {
                        let key = ContextKey::current_thread();
                        dispatcher.dispatch(&key, Lifecycle::TestStarted(format!("test {n}"))).unwrap();
                        dispatcher
                            .dispatch(
                                &key,
                                Lifecycle::StepStarted(StepDescription::titled(format!("step of {n}"))),
                            )
                            .unwrap();
                        dispatcher.dispatch(&key, Lifecycle::StepFinished).unwrap();
                        dispatcher.dispatch(&key, Lifecycle::TestFinished).unwrap();
                        key
                    })
                    .unwrap()
            })
            .collect();
        let keys: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_ne!(keys[0], keys[1]);
        assert!(keys[0].as_str().starts_with("pool-worker-"));
        assert_eq!(dispatcher.keys().len(), 2);
        for outcome in dispatcher.test_outcomes() {
            let n = outcome.name().trim_start_matches("test ");
            let steps: Vec<_> = outcome.steps().iter().map(|s| s.description()).collect();
            assert_eq!(steps, [format!("step of {n}")]);
        }
    }

    #[test]
    fn outcomes_are_sorted_across_contexts() {
        let clock = ManualClock::at_millis(1_000);
        let dispatcher = Dispatcher::new(Arc::default()).with_clock(Arc::new(clock.clone()));
        let (late_key, early_key) = (ContextKey::from("a-thread"), ContextKey::from("z-thread"));

        dispatcher.dispatch(&early_key, Lifecycle::TestStarted("early".into())).unwrap();
        clock.advance(Duration::from_secs(5));
        dispatcher.dispatch(&late_key, Lifecycle::TestStarted("late".into())).unwrap();

        let names: Vec<_> =
            dispatcher.test_outcomes().iter().map(|o| o.name().to_owned()).collect();
        assert_eq!(names, ["early", "late"]);
    }
}
