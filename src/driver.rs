// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Browser drivers, as seen by outcome tracking.
//!
//! Driving a browser is left to the test code. Tracking only needs to know
//! whether a browser is open in some execution context, and to ask it for
//! screenshots.

use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{dispatch::ContextKey, error::ScreenshotError};

/// Browser session able to capture what it currently shows.
pub trait Photographer: fmt::Debug + Send + Sync {
    /// Name of the driver, recorded on outcomes of tests using it.
    fn name(&self) -> String;

    /// Identifier of the browser session, if the driver has one.
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Saves a screenshot and returns the file it's written to.
    ///
    /// [`None`] means the driver can't take screenshots right now.
    ///
    /// # Errors
    ///
    /// If the driver failed to take the screenshot.
    fn take_screenshot(&self) -> Result<Option<PathBuf>, ScreenshotError>;

    /// Returns the HTML source of the current page.
    ///
    /// # Errors
    ///
    /// If the driver failed to provide the source.
    fn page_source(&self) -> Result<String, ScreenshotError>;

    /// Closes the browser session.
    fn quit(&self) {}
}

/// Lookup of the browser driver used in each execution context.
pub trait DriverProvider: fmt::Debug + Send + Sync {
    /// Returns the driver of the context, if any.
    fn current_driver(&self, key: &ContextKey) -> Option<Arc<dyn Photographer>>;

    /// Indicates whether the context has opened a browser.
    fn is_driver_instantiated(&self, key: &ContextKey) -> bool {
        self.current_driver(key).is_some()
    }

    /// Returns the browser session of the context, if any.
    fn session_id(&self, key: &ContextKey) -> Option<String> {
        self.current_driver(key).and_then(|d| d.session_id())
    }
}

/// [`DriverProvider`] of test runs not using any browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDriver;

impl DriverProvider for NoDriver {
    fn current_driver(&self, _: &ContextKey) -> Option<Arc<dyn Photographer>> {
        None
    }
}

/// All the browser drivers known across execution contexts.
///
/// Contexts run on different threads, so this is the one piece of state
/// shared between them.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    /// Drivers keyed by the context using them.
    drivers: Mutex<HashMap<ContextKey, Arc<dyn Photographer>>>,
}

impl DriverRegistry {
    /// Creates an empty [`DriverRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the driver of the given context, returning the one it
    /// replaces.
    pub fn register(
        &self,
        key: ContextKey,
        driver: Arc<dyn Photographer>,
    ) -> Option<Arc<dyn Photographer>> {
        self.lock().insert(key, driver)
    }

    /// Quits and forgets the driver of the given context.
    ///
    /// Returns whether there was one.
    pub fn close(&self, key: &ContextKey) -> bool {
        let Some(driver) = self.lock().remove(key) else {
            return false;
        };
        driver.quit();
        true
    }

    /// Quits and forgets every known driver.
    pub fn close_all(&self) {
        let drivers: Vec<_> = self.lock().drain().map(|(_, d)| d).collect();
        if !drivers.is_empty() {
            tracing::debug!("Closing {} browser drivers", drivers.len());
        }
        for driver in drivers {
            driver.quit();
        }
    }

    /// Returns the number of active drivers.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ContextKey, Arc<dyn Photographer>>> {
        self.drivers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DriverProvider for DriverRegistry {
    fn current_driver(&self, key: &ContextKey) -> Option<Arc<dyn Photographer>> {
        self.lock().get(key).cloned()
    }
}
