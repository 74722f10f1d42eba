// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Merging of fluent call chains into single steps.
//!
//! A chain like `click_button().wait_for_page().assert_visible()` reports
//! three steps, the first two flagged as fluent. They're displayed as one
//! step: `Click button wait for page assert visible`.

use crate::StepDescription;

/// What a started step amounts to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Boundary {
    /// A new step is recorded.
    NewStep,

    /// The step's name is appended to the step in flight.
    Append,
}

/// Tracks whether a fluent sequence is in flight.
#[derive(Clone, Copy, Debug, Default)]
pub struct FluentCoalescer {
    /// Whether the last started step was fluent.
    in_fluent_sequence: bool,
}

impl FluentCoalescer {
    /// Decides what a step starting with the given `description` amounts to.
    ///
    /// Steps following a fluent one are appended to it, the first non-fluent
    /// one closing the sequence.
    pub fn step_started(&mut self, description: &StepDescription) -> Boundary {
        let boundary = if self.in_fluent_sequence {
            Boundary::Append
        } else {
            Boundary::NewStep
        };
        self.in_fluent_sequence = description.is_fluent();
        boundary
    }

    /// Indicates whether a finishing step closes the step in flight, which
    /// doesn't happen in the middle of a fluent sequence.
    #[must_use]
    pub const fn closes_step(&self) -> bool {
        !self.in_fluent_sequence
    }

    /// Indicates whether a fluent sequence is in flight.
    #[must_use]
    pub const fn in_fluent_sequence(&self) -> bool {
        self.in_fluent_sequence
    }

    /// Leaves any fluent sequence.
    pub fn reset(&mut self) {
        self.in_fluent_sequence = false;
    }
}
