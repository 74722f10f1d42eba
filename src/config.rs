// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration of outcome tracking.
//!
//! [`Cli`] may be flattened into a test binary's own [`clap`] options, and
//! turned into a [`Configuration`] afterwards:
//!
//! ```rust
//! # use step_outcomes::{config::TakeScreenshots, Configuration};
//! let config = Configuration::from_args([
//!     "tests",
//!     "--take-screenshots",
//!     "for-failures",
//!     "--step-delay",
//!     "250ms",
//! ])
//! .unwrap();
//!
//! assert!(config.screenshot_permission().allows(TakeScreenshots::ForFailures));
//! assert!(!config.screenshot_permission().allows(TakeScreenshots::AfterEachStep));
//! ```

use std::time::Duration;

use clap::Parser as _;
use smart_default::SmartDefault;

use crate::{error::ConfigError, step::StackTraceSanitizer, TestResult};

/// Default time to wait for a screenshot file to appear.
pub const DEFAULT_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(30);

/// Levels of screenshot verbosity, from the most verbose to none at all.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, clap::ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TakeScreenshots {
    /// Screenshot after every action changing the screen.
    ForEachAction,

    /// Screenshot when a step starts and when it finishes.
    BeforeAndAfterEachStep,

    /// Screenshot when a step finishes.
    AfterEachStep,

    /// Screenshot only when a step fails.
    ForFailures,

    /// Never take optional screenshots.
    Disabled,
}

/// Resolved screenshot verbosity, answering whether screenshots of some
/// [`TakeScreenshots`] level are taken.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScreenshotPermission {
    /// Configured level.
    level: TakeScreenshots,
}

impl ScreenshotPermission {
    /// Creates a new [`ScreenshotPermission`] of the given `level`.
    #[must_use]
    pub const fn new(level: TakeScreenshots) -> Self {
        Self { level }
    }

    /// Returns the configured level.
    #[must_use]
    pub const fn level(self) -> TakeScreenshots {
        self.level
    }

    /// Indicates whether screenshots of the given `level` are taken, that is
    /// whether the configured level is at least as verbose.
    #[must_use]
    pub fn allows(self, level: TakeScreenshots) -> bool {
        self.level <= level
    }
}

/// CLI options of outcome tracking.
#[derive(Clone, Debug, Default, clap::Args)]
#[group(skip)]
pub struct Cli {
    /// When to take screenshots of the browser.
    #[arg(long, value_name = "level", global = true)]
    pub take_screenshots: Option<TakeScreenshots>,

    /// Only keep screenshots of failing steps.
    ///
    /// Ignored when `--take-screenshots` is given.
    #[arg(long, global = true)]
    pub only_save_failing_screenshots: bool,

    /// Take a screenshot after every action.
    ///
    /// Ignored when `--take-screenshots` is given.
    #[arg(long, global = true)]
    pub verbose_screenshots: bool,

    /// Pause after each step, to follow a run by eye.
    ///
    /// Duration is represented in a human-readable format like `1s500ms`.
    #[arg(
        long,
        value_name = "duration",
        value_parser = humantime::parse_duration,
        global = true,
    )]
    pub step_delay: Option<Duration>,

    /// Store the HTML source of the page along with each screenshot.
    #[arg(long, global = true)]
    pub store_html_source: bool,

    /// Number of times a failing test is re-run.
    #[arg(long, value_name = "int", global = true)]
    pub max_retries: Option<usize>,

    /// Result recorded for tests executed by hand.
    #[arg(long, value_name = "result", global = true)]
    pub manual_test_result: Option<String>,

    /// Record steps without executing them or taking screenshots.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// How long to wait for a screenshot file to appear.
    #[arg(
        long,
        value_name = "duration",
        value_parser = humantime::parse_duration,
        global = true,
    )]
    pub screenshot_timeout: Option<Duration>,

    /// Keep runtime frames in the stack traces of failures.
    #[arg(long, global = true)]
    pub full_stack_traces: bool,
}

#[derive(clap::Parser)]
struct Command {
    #[command(flatten)]
    cli: Cli,
}

/// Settings shared by every execution context.
#[derive(Clone, Debug, SmartDefault)]
pub struct Configuration {
    /// Explicit screenshot level.
    pub take_screenshots: Option<TakeScreenshots>,

    /// Only keep screenshots of failing steps, unless an explicit level is
    /// set.
    pub only_save_failing_screenshots: bool,

    /// Screenshot every action, unless an explicit level is set.
    pub verbose_screenshots: bool,

    /// Pause after each finished step.
    pub step_delay: Duration,

    /// Store the HTML source along with each screenshot.
    pub store_html_source: bool,

    /// Number of re-runs of a failing test.
    pub max_retries: usize,

    /// Configured result of manual tests, not validated yet.
    pub manual_test_result: Option<String>,

    /// Record steps without executing them.
    pub dry_run: bool,

    /// How long to wait for a screenshot file to appear.
    #[default(DEFAULT_SCREENSHOT_TIMEOUT)]
    pub screenshot_timeout: Duration,

    /// Keep runtime frames in stack traces.
    pub full_stack_traces: bool,
}

impl Configuration {
    /// Parses a [`Configuration`] out of command-line style arguments, the
    /// first one being the binary name.
    ///
    /// # Errors
    ///
    /// If the arguments are invalid.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Command::try_parse_from(args)?.cli.into())
    }

    /// Resolves the screenshot verbosity.
    ///
    /// An explicit level wins. Otherwise only failures are captured when
    /// `only_save_failing_screenshots` is set, every action when
    /// `verbose_screenshots` is set, and step boundaries by default.
    #[must_use]
    pub fn screenshot_permission(&self) -> ScreenshotPermission {
        ScreenshotPermission::new(self.take_screenshots.unwrap_or(
            if self.only_save_failing_screenshots {
                TakeScreenshots::ForFailures
            } else if self.verbose_screenshots {
                TakeScreenshots::ForEachAction
            } else {
                TakeScreenshots::BeforeAndAfterEachStep
            },
        ))
    }

    /// Returns the result recorded for manual tests.
    ///
    /// Unset or unrecognized values fall back to [`TestResult::Pending`].
    #[must_use]
    pub fn manual_test_result(&self) -> TestResult {
        let Some(value) = self.manual_test_result.as_deref() else {
            return TestResult::Pending;
        };
        value.parse().unwrap_or_else(|e| {
            tracing::warn!("{e}, recording manual tests as {}", TestResult::Pending);
            TestResult::Pending
        })
    }

    /// Returns the [`StackTraceSanitizer`] applied to recorded failures.
    #[must_use]
    pub const fn sanitizer(&self) -> StackTraceSanitizer {
        StackTraceSanitizer::new(!self.full_stack_traces)
    }
}

impl From<Cli> for Configuration {
    fn from(cli: Cli) -> Self {
        Self {
            take_screenshots: cli.take_screenshots,
            only_save_failing_screenshots: cli.only_save_failing_screenshots,
            verbose_screenshots: cli.verbose_screenshots,
            step_delay: cli.step_delay.unwrap_or_default(),
            store_html_source: cli.store_html_source,
            max_retries: cli.max_retries.unwrap_or_default(),
            manual_test_result: cli.manual_test_result,
            dry_run: cli.dry_run,
            screenshot_timeout: cli.screenshot_timeout.unwrap_or(DEFAULT_SCREENSHOT_TIMEOUT),
            full_stack_traces: cli.full_stack_traces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Configuration::default();

        assert_eq!(config.screenshot_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 0);
        assert_eq!(
            config.screenshot_permission().level(),
            TakeScreenshots::BeforeAndAfterEachStep,
        );
        assert_eq!(config.manual_test_result(), TestResult::Pending);
    }

    #[test]
    fn explicit_level_wins_over_flags() {
        let config = Configuration {
            take_screenshots: Some(TakeScreenshots::AfterEachStep),
            only_save_failing_screenshots: true,
            verbose_screenshots: true,
            ..Configuration::default()
        };

        assert_eq!(config.screenshot_permission().level(), TakeScreenshots::AfterEachStep);
    }

    #[test]
    fn flags_resolve_permission() {
        let failing = Configuration {
            only_save_failing_screenshots: true,
            verbose_screenshots: true,
            ..Configuration::default()
        };
        let verbose = Configuration { verbose_screenshots: true, ..Configuration::default() };

        assert_eq!(failing.screenshot_permission().level(), TakeScreenshots::ForFailures);
        assert_eq!(verbose.screenshot_permission().level(), TakeScreenshots::ForEachAction);
    }

    #[test]
    fn permission_follows_verbosity() {
        let steps = ScreenshotPermission::new(TakeScreenshots::BeforeAndAfterEachStep);

        assert!(!steps.allows(TakeScreenshots::ForEachAction));
        assert!(steps.allows(TakeScreenshots::BeforeAndAfterEachStep));
        assert!(steps.allows(TakeScreenshots::AfterEachStep));
        assert!(steps.allows(TakeScreenshots::ForFailures));

        let disabled = ScreenshotPermission::new(TakeScreenshots::Disabled);
        assert!(!disabled.allows(TakeScreenshots::ForFailures));
    }

    #[test]
    fn parses_arguments() {
        let config = Configuration::from_args([
            "tests",
            "--max-retries",
            "2",
            "--screenshot-timeout",
            "5s",
            "--manual-test-result",
            "success",
            "--store-html-source",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(config.max_retries, 2);
        assert_eq!(config.screenshot_timeout, Duration::from_secs(5));
        assert_eq!(config.manual_test_result(), TestResult::Success);
        assert!(config.store_html_source);
        assert!(config.dry_run);
    }

    #[test]
    fn malformed_manual_result_falls_back_to_pending() {
        let config = Configuration {
            manual_test_result: Some("sorta-passed".into()),
            ..Configuration::default()
        };

        assert_eq!(config.manual_test_result(), TestResult::Pending);
    }

    #[test]
    fn rejects_unknown_levels() {
        let err = Configuration::from_args(["tests", "--take-screenshots", "always"])
            .unwrap_err();

        assert!(matches!(err, ConfigError::Arguments(_)));
    }
}
