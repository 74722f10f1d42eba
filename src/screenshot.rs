// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Screenshots attached to steps.

use std::{
    fs,
    io::{self, Read as _},
    path::{Path, PathBuf},
};

/// A screenshot image together with the HTML source of the page it was taken
/// of.
///
/// Two [`ScreenshotAndHtmlSource`]s are equal when their screenshot files
/// have identical contents, regardless of where the files are.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScreenshotAndHtmlSource {
    /// Screenshot image file.
    screenshot: PathBuf,

    /// HTML source file, if it was stored.
    html_source: Option<PathBuf>,
}

impl ScreenshotAndHtmlSource {
    /// Creates a new [`ScreenshotAndHtmlSource`] without HTML source.
    #[must_use]
    pub fn new(screenshot: impl Into<PathBuf>) -> Self {
        Self { screenshot: screenshot.into(), html_source: None }
    }

    /// Attaches the given HTML source file.
    #[must_use]
    pub fn with_html_source(mut self, html_source: impl Into<PathBuf>) -> Self {
        self.html_source = Some(html_source.into());
        self
    }

    /// Returns the screenshot image file.
    #[must_use]
    pub fn screenshot(&self) -> &Path {
        &self.screenshot
    }

    /// Returns the HTML source file, if any.
    #[must_use]
    pub fn html_source(&self) -> Option<&Path> {
        self.html_source.as_deref()
    }

    /// Returns the file name of the screenshot.
    #[must_use]
    pub fn screenshot_name(&self) -> Option<&str> {
        self.screenshot.file_name().and_then(|n| n.to_str())
    }

    /// Returns the file name of the HTML source, if any.
    #[must_use]
    pub fn html_source_name(&self) -> Option<&str> {
        self.html_source
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }

    /// Indicates whether both screenshot files hold the same bytes.
    ///
    /// Unreadable files are never identical to anything except themselves.
    #[must_use]
    pub fn has_identical_screenshot_as(&self, other: &Self) -> bool {
        if self.screenshot == other.screenshot {
            return true;
        }
        same_contents(&self.screenshot, &other.screenshot).unwrap_or(false)
    }
}

impl PartialEq for ScreenshotAndHtmlSource {
    fn eq(&self, other: &Self) -> bool {
        self.has_identical_screenshot_as(other)
    }
}

/// Compares contents of two files, bailing out early on differing lengths.
fn same_contents(lhs: &Path, rhs: &Path) -> io::Result<bool> {
    if fs::metadata(lhs)?.len() != fs::metadata(rhs)?.len() {
        return Ok(false);
    }

    let (mut lhs, mut rhs) = (fs::File::open(lhs)?, fs::File::open(rhs)?);
    let (mut lbuf, mut rbuf) = ([0; 8192], [0; 8192]);
    loop {
        let read = lhs.read(&mut lbuf)?;
        if read == 0 {
            return Ok(true);
        }
        rhs.read_exact(&mut rbuf[..read])?;
        if lbuf[..read] != rbuf[..read] {
            return Ok(false);
        }
    }
}
