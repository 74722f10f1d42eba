// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Results of [`TestStep`]s and [`TestOutcome`]s.
//!
//! [`TestOutcome`]: crate::TestOutcome
//! [`TestStep`]: crate::TestStep

use std::str::FromStr;

use derive_more::with_trait::{Display, Error};

/// Result of a step or a whole test, ordered by severity.
///
/// Variants are declared from the least to the most severe one, so the
/// derived [`Ord`] is the severity ordering.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TestResult {
    /// Completed without problems.
    #[display("SUCCESS")]
    Success,

    /// Deliberately not executed.
    #[display("IGNORED")]
    Ignored,

    /// Not executed because something earlier went wrong.
    #[display("SKIPPED")]
    Skipped,

    /// Not implemented yet.
    #[display("PENDING")]
    Pending,

    /// Stopped by the test framework before completion.
    #[display("ABORTED")]
    Aborted,

    /// An assertion didn't hold.
    #[display("FAILURE")]
    Failure,

    /// An unexpected error occurred.
    #[display("ERROR")]
    Error,

    /// The test environment itself was broken.
    #[display("COMPROMISED")]
    Compromised,
}

impl TestResult {
    /// All the [`TestResult`]s, from the least to the most severe one.
    pub const ALL: [Self; 8] = [
        Self::Success,
        Self::Ignored,
        Self::Skipped,
        Self::Pending,
        Self::Aborted,
        Self::Failure,
        Self::Error,
        Self::Compromised,
    ];

    /// Indicates whether this [`TestResult`] is strictly less severe than the
    /// `other` one.
    #[must_use]
    pub fn is_less_severe_than(self, other: Self) -> bool {
        self < other
    }

    /// Indicates whether this [`TestResult`] is as severe as `other` or worse.
    #[must_use]
    pub fn is_at_least(self, other: Self) -> bool {
        self >= other
    }

    /// Indicates whether this [`TestResult`] is a [`Failure`] or an
    /// [`Error`].
    ///
    /// [`Error`]: TestResult::Error
    /// [`Failure`]: TestResult::Failure
    #[must_use]
    pub const fn is_failure_or_error(self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }

    /// Returns the most severe of the given [`TestResult`]s, or [`Success`]
    /// if there are none.
    ///
    /// [`Success`]: TestResult::Success
    #[must_use]
    pub fn overall(results: impl IntoIterator<Item = Self>) -> Self {
        results.into_iter().max().unwrap_or(Self::Success)
    }
}

/// Error of parsing an unknown [`TestResult`] name.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display("Unknown test result `{value}`, expected one of: {}", expected())]
pub struct ParseTestResultError {
    /// The value that couldn't be parsed.
    #[error(not(source))]
    pub value: String,
}

fn expected() -> String {
    TestResult::ALL.map(|r| r.to_string()).join(", ")
}

impl FromStr for TestResult {
    type Err = ParseTestResultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|r| r.to_string() == normalized)
            .ok_or_else(|| ParseTestResultError { value: s.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_a_strict_total_order() {
        for (i, lhs) in TestResult::ALL.iter().enumerate() {
            for (j, rhs) in TestResult::ALL.iter().enumerate() {
                assert_eq!(lhs.is_less_severe_than(*rhs), i < j, "{lhs} vs {rhs}");
            }
        }
    }

    #[test]
    fn overall_picks_worst() {
        use TestResult::*;

        assert_eq!(TestResult::overall([]), Success);
        assert_eq!(TestResult::overall([Success, Pending, Ignored]), Pending);
        assert_eq!(TestResult::overall([Failure, Error, Skipped]), Error);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("pending".parse(), Ok(TestResult::Pending));
        assert_eq!(" Failure ".parse(), Ok(TestResult::Failure));
        assert_eq!("COMPROMISED".parse(), Ok(TestResult::Compromised));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "maybe".parse::<TestResult>().unwrap_err();

        assert_eq!(err.value, "maybe");
        assert!(err.to_string().contains("SUCCESS, IGNORED"));
    }
}
