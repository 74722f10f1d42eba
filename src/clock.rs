// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Time source used for step timings and step delays.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Source of the current time, able to pause the calling thread.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current time.
    #[must_use]
    fn now(&self) -> SystemTime;

    /// Blocks the current thread for the given `duration`.
    fn pause_for(&self, duration: Duration);

    /// Returns the time elapsed since `earlier`, or zero if `earlier` is in
    /// the future.
    #[must_use]
    fn elapsed_since(&self, earlier: SystemTime) -> Duration {
        self.now().duration_since(earlier).unwrap_or_default()
    }
}

/// [`Clock`] backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn pause_for(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Deterministic [`Clock`] which only moves when told to.
///
/// [`Clock::pause_for()`] advances the time instead of sleeping, so code
/// waiting on this clock never blocks.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// Creates a [`ManualClock`] frozen at `at`.
    #[must_use]
    pub fn starting_at(at: SystemTime) -> Self {
        Self { now: Arc::new(Mutex::new(at)) }
    }

    /// Creates a [`ManualClock`] frozen at the given number of milliseconds
    /// after the Unix epoch.
    #[must_use]
    pub fn at_millis(millis: u64) -> Self {
        Self::starting_at(UNIX_EPOCH + Duration::from_millis(millis))
    }

    /// Moves this clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pause_for(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Milliseconds since the Unix epoch, saturating at zero for earlier times.
#[must_use]
pub fn epoch_millis(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
