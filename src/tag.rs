// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tags classifying tests.

use derive_more::with_trait::Display;

/// Named and typed tag attached to a [`TestOutcome`].
///
/// [`TestOutcome`]: crate::TestOutcome
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[display("{kind}:{name}")]
pub struct TestTag {
    /// Type of this tag, e.g. `feature` or `issue`.
    pub kind: String,

    /// Name of this tag.
    pub name: String,
}

impl TestTag {
    /// Creates a new [`TestTag`].
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), name: name.into() }
    }

    /// Tag marking tests executed by hand.
    #[must_use]
    pub fn manual() -> Self {
        Self::new("Manual", "External Tests")
    }
}
