// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`tracing`] subscriber installation.

use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    Layer as _,
};

/// Installs a global [`tracing::Subscriber`] printing events up to the
/// given `level` with a default [`fmt::Layer`].
///
/// Returns `false` if a global subscriber is installed already, leaving it
/// in place.
pub fn init_tracing(level: LevelFilter) -> bool {
    tracing_subscriber::registry()
        .with(level.and_then(fmt::layer()))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_only_once() {
        let _ = init_tracing(LevelFilter::DEBUG);

        assert!(!init_tracing(LevelFilter::INFO));
    }
}
