// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Adapters of test frameworks.
//!
//! An adapter translates what its framework reports into [`StepListener`]
//! calls, and describes the framework marks of tests and steps with a
//! [`DefaultResults`] strategy.
//!
//! [`StepListener`]: crate::StepListener

pub mod annotations;
pub mod junit4;
pub mod junit5;

#[doc(inline)]
pub use self::{
    annotations::{Annotations, DefaultResults, NoDefaults},
    junit4::RetryingRunner,
    junit5::{aggregate_by_test_method, ExecutionListener, ExecutionStatus, TestIdentifier},
};
