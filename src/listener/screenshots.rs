// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Deciding when screenshots are captured and which ones are kept.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    clock::Clock, driver::Photographer, error::ScreenshotError,
    ScreenshotAndHtmlSource,
};

/// Interval between checks for a screenshot file to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether a screenshot request may be dropped when it shows nothing new.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScreenshotType {
    /// Kept only if it differs from the previous screenshot.
    Optional,

    /// Always kept.
    Mandatory,
}

/// State a screenshot request is evaluated against.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureGate {
    /// A step is open to attach the screenshot to.
    pub step_open: bool,

    /// A browser is open to take the screenshot of.
    pub browser_open: bool,

    /// A step of the test has failed already.
    pub step_failed: bool,

    /// Steps are recorded without being executed.
    pub dry_run: bool,

    /// The test has been suspended.
    pub suspended: bool,
}

impl CaptureGate {
    /// Indicates whether a screenshot may be taken at all.
    #[must_use]
    pub const fn allows_capture(&self) -> bool {
        self.step_open
            && self.browser_open
            && !self.step_failed
            && !self.dry_run
            && !self.suspended
    }
}

/// Decides whether a freshly taken screenshot is stored into the current
/// step.
///
/// Mandatory screenshots always are. Optional ones are stored if they're the
/// first of the step, or if they differ from the last screenshot stored so
/// far in the test.
#[must_use]
pub fn should_store(
    kind: ScreenshotType,
    step_screenshot_count: usize,
    last_screenshot: Option<&ScreenshotAndHtmlSource>,
    new: &ScreenshotAndHtmlSource,
) -> bool {
    kind == ScreenshotType::Mandatory
        || step_screenshot_count == 0
        || last_screenshot.is_some_and(|last| !last.has_identical_screenshot_as(new))
}

/// Indicates whether the first screenshot of the current step repeats the
/// last one of the previous step, and so should be removed.
///
/// A step's only screenshot is never removed.
#[must_use]
pub fn leading_duplicate(
    step_screenshot_count: usize,
    previous_step_last: Option<&ScreenshotAndHtmlSource>,
    current_step_first: Option<&ScreenshotAndHtmlSource>,
) -> bool {
    step_screenshot_count > 1
        && previous_step_last
            .zip(current_step_first)
            .is_some_and(|(prev, first)| prev.has_identical_screenshot_as(first))
}

/// Takes a screenshot with the given `photographer`, along with the page's
/// HTML source if `store_html_source` is set.
///
/// Waits up to `timeout` for the screenshot file to appear. A failure to
/// store the HTML source only loses the source.
///
/// # Errors
///
/// If the driver failed, or the screenshot file never appeared.
pub fn capture(
    photographer: &dyn Photographer,
    clock: &dyn Clock,
    timeout: Duration,
    store_html_source: bool,
) -> Result<Option<ScreenshotAndHtmlSource>, ScreenshotError> {
    let Some(path) = photographer.take_screenshot()? else {
        return Ok(None);
    };
    wait_for_file(&path, clock, timeout)?;

    let screenshot = ScreenshotAndHtmlSource::new(&path);
    if !store_html_source {
        return Ok(Some(screenshot));
    }
    match store_page_source(photographer, &path) {
        Ok(html) => Ok(Some(screenshot.with_html_source(html))),
        Err(e) => {
            tracing::warn!("Failed to store HTML source of `{}`: {e}", path.display());
            Ok(Some(screenshot))
        }
    }
}

/// Writes the page source next to the screenshot, as `<screenshot>.html`.
fn store_page_source(
    photographer: &dyn Photographer,
    screenshot: &Path,
) -> Result<PathBuf, ScreenshotError> {
    let source = photographer.page_source()?;
    let mut html = OsString::from(screenshot.as_os_str());
    html.push(".html");
    let html = PathBuf::from(html);
    fs::write(&html, source)?;
    Ok(html)
}

/// Polls for the file at `path` until it exists or `timeout` elapses.
fn wait_for_file(
    path: &Path,
    clock: &dyn Clock,
    timeout: Duration,
) -> Result<(), ScreenshotError> {
    let started = clock.now();
    while !path.exists() {
        if clock.elapsed_since(started) >= timeout {
            return Err(ScreenshotError::Timeout {
                path: path.to_path_buf(),
                waited: timeout,
            });
        }
        clock.pause_for(POLL_INTERVAL);
    }
    Ok(())
}
