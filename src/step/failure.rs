// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Failures of steps and their classification.

use std::{any::Any, fmt};

use derive_more::with_trait::Display;

use crate::TestResult;

/// Kind of a failure, determining the [`TestResult`] it results in.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FailureKind {
    /// Some assertion didn't hold.
    #[display("assertion")]
    Assertion,

    /// An unexpected error happened.
    #[display("error")]
    Error,

    /// The step isn't implemented yet.
    #[display("pending")]
    Pending,

    /// The environment the test runs in is broken.
    #[display("compromised")]
    Compromised,

    /// Execution was aborted, e.g. by a violated assumption.
    #[display("aborted")]
    Aborted,
}

impl FailureKind {
    /// Returns the [`TestResult`] a failure of this kind results in.
    #[must_use]
    pub const fn result(self) -> TestResult {
        match self {
            Self::Assertion => TestResult::Failure,
            Self::Error => TestResult::Error,
            Self::Pending => TestResult::Pending,
            Self::Compromised => TestResult::Compromised,
            Self::Aborted => TestResult::Aborted,
        }
    }
}

/// Cause of a failed step or test.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FailureCause {
    /// Classification of this failure.
    pub kind: FailureKind,

    /// Name of the error type which caused this failure.
    pub error_type: String,

    /// Human-readable message of this failure.
    pub message: String,

    /// Frames of the stack trace, outermost last.
    pub stack_trace: Vec<String>,
}

impl FailureCause {
    /// Creates a new [`FailureCause`] without a stack trace.
    #[must_use]
    pub fn new(
        kind: FailureKind,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            error_type: error_type.into(),
            message: message.into(),
            stack_trace: Vec::new(),
        }
    }

    /// Creates an [`FailureKind::Assertion`] [`FailureCause`].
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Assertion, "AssertionError", message)
    }

    /// Creates an [`FailureKind::Error`] [`FailureCause`] out of the given
    /// `error`, recording its type name.
    #[must_use]
    pub fn from_error<E: fmt::Display + ?Sized>(error: &E) -> Self {
        Self::new(FailureKind::Error, std::any::type_name::<E>(), error.to_string())
    }

    /// Creates a [`FailureCause`] out of a payload caught from a panic.
    ///
    /// A [`FailureCause`] payload (raised with [`std::panic::panic_any()`])
    /// is used as is. Messages of standard assertion macros are classified
    /// as [`FailureKind::Assertion`], anything else as
    /// [`FailureKind::Error`].
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(cause) = payload.downcast_ref::<Self>() {
            return cause.clone();
        }
        let message = coerce_panic_message(payload);
        if message.starts_with("assertion") {
            Self::new(FailureKind::Assertion, "AssertionError", message)
        } else {
            Self::new(FailureKind::Error, "panic", message)
        }
    }

    /// Attaches the given stack trace frames.
    #[must_use]
    pub fn with_stack_trace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack_trace = frames.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the [`TestResult`] this failure results in.
    #[must_use]
    pub const fn result(&self) -> TestResult {
        self.kind.result()
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// Extracts a message out of a panic payload.
#[must_use]
pub fn coerce_panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(string) = payload.downcast_ref::<String>() {
        string.clone()
    } else if let Some(&string) = payload.downcast_ref::<&str>() {
        string.to_owned()
    } else {
        "(Could not resolve panic payload)".to_owned()
    }
}

/// Frame prefixes of runtime and harness code, hidden from simplified stack
/// traces.
const MASKED_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "__rust",
    "rust_begin_unwind",
    "step_outcomes::",
];

/// Strips runtime and harness frames out of stack traces.
#[derive(Clone, Copy, Debug)]
pub struct StackTraceSanitizer {
    /// Whether stack traces are simplified at all.
    simplified: bool,
}

impl StackTraceSanitizer {
    /// Creates a new [`StackTraceSanitizer`], which leaves stack traces
    /// untouched unless `simplified` is set.
    #[must_use]
    pub const fn new(simplified: bool) -> Self {
        Self { simplified }
    }

    /// Returns the frames worth displaying.
    #[must_use]
    pub fn sanitize(&self, frames: &[String]) -> Vec<String> {
        if !self.simplified {
            return frames.to_vec();
        }
        frames
            .iter()
            .filter(|frame| Self::should_display(frame))
            .cloned()
            .collect()
    }

    /// Applies [`StackTraceSanitizer::sanitize()`] to the given
    /// [`FailureCause`].
    #[must_use]
    pub fn sanitize_cause(&self, mut cause: FailureCause) -> FailureCause {
        cause.stack_trace = self.sanitize(&cause.stack_trace);
        cause
    }

    fn should_display(frame: &str) -> bool {
        let frame = frame.trim_start();
        if frame.contains("{{closure}}") {
            return false;
        }
        // `<T as Trait>::method` frames are masked by the type they're on.
        let frame = frame.strip_prefix('<').unwrap_or(frame);
        !MASKED_PREFIXES.iter().any(|p| frame.starts_with(p))
    }
}
