// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Descriptions of steps being reported.

use inflector::cases::sentencecase::to_sentence_case;
use itertools::Itertools as _;

/// Description of a step about to be executed, as reported by a step
/// implementation.
///
/// A step is either titled explicitly, or named after the method
/// implementing it, in which case the name is made human readable:
///
/// ```rust
/// # use step_outcomes::StepDescription;
/// let step = StepDescription::for_method("enterCredentials")
///     .with_arguments(["alice", "secret"]);
///
/// assert_eq!(step.name(), "Enter credentials: alice, secret");
/// assert_eq!(StepDescription::titled("Open the home page").name(), "Open the home page");
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StepDescription {
    /// Explicit title, taking precedence over the [`method`].
    ///
    /// [`method`]: StepDescription::method
    title: Option<String>,

    /// Name of the method implementing this step.
    method: Option<String>,

    /// Readable forms of the arguments passed to the step.
    arguments: Vec<String>,

    /// Whether this step is a part of a fluent call chain.
    fluent: bool,
}

impl StepDescription {
    /// Creates a [`StepDescription`] with an explicit title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    /// Creates a [`StepDescription`] named after the given method.
    #[must_use]
    pub fn for_method(method: impl Into<String>) -> Self {
        Self { method: Some(method.into()), ..Self::default() }
    }

    /// Attaches readable forms of the step arguments.
    #[must_use]
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.arguments = arguments.into_iter().map(|a| a.to_string()).collect();
        self
    }

    /// Marks this step as a part of a fluent call chain.
    #[must_use]
    pub fn fluent(mut self) -> Self {
        self.fluent = true;
        self
    }

    /// Indicates whether this step is a part of a fluent call chain.
    #[must_use]
    pub const fn is_fluent(&self) -> bool {
        self.fluent
    }

    /// Returns the method implementing this step, if known.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Returns the explicit title of this step, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the name this step is reported under.
    #[must_use]
    pub fn name(&self) -> String {
        let base = match (&self.title, &self.method) {
            (Some(title), _) => title.clone(),
            (None, Some(method)) => to_sentence_case(method),
            (None, None) => String::new(),
        };
        if self.arguments.is_empty() {
            base
        } else {
            format!("{base}: {}", self.arguments.iter().join(", "))
        }
    }
}

/// Lower-cases the first character of `name`, leaving the rest intact.
#[must_use]
pub fn uncapitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_humanized() {
        assert_eq!(StepDescription::for_method("clickButton").name(), "Click button");
        assert_eq!(
            StepDescription::for_method("user_logs_in").name(),
            "User logs in",
        );
    }

    #[test]
    fn title_wins_over_method() {
        let step = StepDescription {
            title: Some("Custom".into()),
            method: Some("ignored".into()),
            ..StepDescription::default()
        };

        assert_eq!(step.name(), "Custom");
    }

    #[test]
    fn fluent_flag() {
        assert!(!StepDescription::titled("a").is_fluent());
        assert!(StepDescription::titled("a").fluent().is_fluent());
    }

    #[test]
    fn uncapitalize_only_touches_first_char() {
        assert_eq!(uncapitalize("Wait for Page"), "wait for Page");
        assert_eq!(uncapitalize(""), "");
        assert_eq!(uncapitalize("x"), "x");
    }
}
