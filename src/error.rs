// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types of outcome tracking.
//!
//! - [`TrackerError`] signals a broken integration: an event arrived in a
//!   state it's not valid in. These always propagate.
//! - [`ScreenshotError`] only degrades the evidence collected for a step, so
//!   it's logged and swallowed where screenshots are taken.
//! - [`ConfigError`] is returned while building a [`Configuration`].
//!
//! [`Configuration`]: crate::Configuration

use std::{io, path::PathBuf, time::Duration};

use derive_more::with_trait::{Display, Error, From};

/// Lifecycle event received in a state it can't be applied to.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
pub enum TrackerError {
    /// An operation requiring a started test was called before any test
    /// started (or after the only one was retried away).
    #[display("`{operation}` requires a test in progress, but none was started")]
    NoTestInProgress {
        /// Name of the rejected operation.
        #[error(not(source))]
        operation: &'static str,
    },

    /// An operation requiring an open step was called with no step open.
    #[display("`{operation}` requires a step in progress, but none is open")]
    NoStepInProgress {
        /// Name of the rejected operation.
        #[error(not(source))]
        operation: &'static str,
    },
}

impl TrackerError {
    /// Creates a new [`TrackerError::NoTestInProgress`].
    #[must_use]
    pub const fn no_test(operation: &'static str) -> Self {
        Self::NoTestInProgress { operation }
    }

    /// Creates a new [`TrackerError::NoStepInProgress`].
    #[must_use]
    pub const fn no_step(operation: &'static str) -> Self {
        Self::NoStepInProgress { operation }
    }
}

/// Result type alias using [`TrackerError`].
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Failure to capture a screenshot or its HTML source.
#[derive(Debug, Display, Error, From)]
pub enum ScreenshotError {
    /// Reading or writing a screenshot file failed.
    #[display("Screenshot I/O failed: {_0}")]
    Io(io::Error),

    /// The browser driver refused to produce a screenshot.
    #[display("Driver failed to take a screenshot: {message}")]
    #[from(ignore)]
    Driver {
        /// Message reported by the driver.
        #[error(not(source))]
        message: String,
    },

    /// The screenshot file didn't appear in time.
    #[display(
        "Screenshot file `{}` didn't appear within {}",
        path.display(),
        humantime::format_duration(*waited),
    )]
    #[from(ignore)]
    Timeout {
        /// Expected location of the screenshot.
        #[error(not(source))]
        path: PathBuf,

        /// How long it was waited for.
        waited: Duration,
    },
}

impl ScreenshotError {
    /// Creates a new [`ScreenshotError::Driver`].
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver { message: message.into() }
    }
}

/// Invalid configuration.
#[derive(Debug, Display, Error, From)]
pub enum ConfigError {
    /// Command-line style arguments were rejected.
    #[display("Invalid configuration arguments: {_0}")]
    Arguments(clap::Error),
}
