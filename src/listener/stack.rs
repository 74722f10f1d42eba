// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Open steps and open groups of the test in flight.

use crate::step::StepPath;

/// Two stacks of [`StepPath`]s: steps not finished yet, and the groups among
/// them.
///
/// Every open group is an open step too, and it's closed exactly when its
/// step is popped.
#[derive(Clone, Debug, Default)]
pub struct StepStack {
    /// Open steps, innermost last.
    steps: Vec<StepPath>,

    /// Open groups, innermost last.
    groups: Vec<StepPath>,
}

impl StepStack {
    /// Returns the innermost open step.
    #[must_use]
    pub fn current_step(&self) -> Option<&StepPath> {
        self.steps.last()
    }

    /// Returns the innermost open group.
    #[must_use]
    pub fn current_group(&self) -> Option<&StepPath> {
        self.groups.last()
    }

    /// Returns the number of open steps.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    /// Indicates whether no step is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Prepares for a step nested into the innermost open step, turning that
    /// step into a group the first time.
    ///
    /// Returns the group the new step belongs to, if any.
    pub fn parent_for_new_step(&mut self) -> Option<StepPath> {
        if let Some(current) = self.steps.last() {
            if self.groups.last() != Some(current) {
                self.groups.push(current.clone());
            }
        }
        self.groups.last().cloned()
    }

    /// Opens the step at `path`.
    pub fn push(&mut self, path: StepPath) {
        self.steps.push(path);
    }

    /// Closes the innermost open step, along with its group.
    pub fn pop(&mut self) -> Option<StepPath> {
        let path = self.steps.pop()?;
        if self.groups.last() == Some(&path) {
            drop(self.groups.pop());
        }
        Some(path)
    }

    /// Forgets all open steps and groups.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_opens_group_once() {
        let mut stack = StepStack::default();
        assert_eq!(stack.parent_for_new_step(), None);
        stack.push(StepPath::top_level(0));

        let parent = stack.parent_for_new_step();
        assert_eq!(parent, Some(StepPath::top_level(0)));
        stack.push(StepPath::top_level(0).child(0));
        drop(stack.pop());

        // The group stays open for the next sibling.
        assert_eq!(stack.parent_for_new_step(), Some(StepPath::top_level(0)));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn popping_group_step_closes_group() {
        let mut stack = StepStack::default();
        stack.push(StepPath::top_level(0));
        let _ = stack.parent_for_new_step();
        stack.push(StepPath::top_level(0).child(0));

        assert_eq!(stack.pop(), Some(StepPath::top_level(0).child(0)));
        assert_eq!(stack.current_group(), Some(&StepPath::top_level(0)));
        assert_eq!(stack.pop(), Some(StepPath::top_level(0)));
        assert_eq!(stack.current_group(), None);
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }
}
