// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::{sync::Arc, thread};

use rand::seq::SliceRandom as _;
use step_outcomes::{
    clock::ManualClock, instrument::run_step, Configuration, ContextKey, Dispatcher, Lifecycle,
    StepDescription, TestResult,
};

#[test]
fn concurrent_tests_are_tracked_apart() {
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(Configuration::default())));

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::Builder::new()
                .name(format!("worker-{n}"))
                .spawn(move || {
                    let key = ContextKey::current_thread();
                    dispatcher.with(&key, |l| l.test_started(format!("test {n}")));
                    for step in 0..=n {
                        run_step(&*dispatcher, StepDescription::titled(format!("step {step}")), || {
                            assert!(step < 3, "assertion failed: step {step}");
                        })
                        .unwrap();
                    }
                    dispatcher.with(&key, |l| l.test_finished()).unwrap();
                })
                .unwrap()
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(dispatcher.keys().len(), 4);
    let outcomes = dispatcher.test_outcomes();
    let mut summary: Vec<_> =
        outcomes.iter().map(|o| (o.name(), o.step_count(), o.result())).collect();
    summary.sort_by_key(|(name, ..)| *name);
    assert_eq!(
        summary,
        [
            ("test 0", 1, TestResult::Success),
            ("test 1", 2, TestResult::Success),
            ("test 2", 3, TestResult::Success),
            ("test 3", 4, TestResult::Failure),
        ],
    );
}

#[test]
fn ignored_steps_become_skipped_after_a_failure() {
    let dispatcher = Dispatcher::new(Arc::default());
    let key = ContextKey::from("skips");
    let send = |event| dispatcher.dispatch(&key, event).unwrap();

    send(Lifecycle::TestStarted("checkout".into()));
    send(Lifecycle::SkippedStepStarted(StepDescription::titled("before")));
    send(Lifecycle::StepIgnored);
    send(Lifecycle::StepStarted(StepDescription::titled("pay")));
    send(Lifecycle::StepFailed(step_outcomes::FailureCause::assertion("declined")));
    send(Lifecycle::SkippedStepStarted(StepDescription::titled("after")));
    send(Lifecycle::StepIgnored);
    send(Lifecycle::TestFinished);

    let outcomes = dispatcher.test_outcomes();
    let results: Vec<_> = outcomes[0].steps().iter().map(|s| s.result()).collect();
    assert_eq!(results, [TestResult::Ignored, TestResult::Failure, TestResult::Skipped]);
    assert_eq!(outcomes[0].result(), TestResult::Failure);
}

#[test]
fn outcomes_starting_together_are_ordered_by_name() {
    let clock = ManualClock::at_millis(5_000);
    let dispatcher = Dispatcher::new(Arc::default()).with_clock(Arc::new(clock));
    let key = ContextKey::from("sorting");

    let mut names = vec!["delta", "alpha", "charlie", "bravo"];
    names.shuffle(&mut rand::thread_rng());
    for name in names {
        dispatcher.dispatch(&key, Lifecycle::TestStarted(name.into())).unwrap();
        dispatcher.dispatch(&key, Lifecycle::TestFinished).unwrap();
    }

    let sorted: Vec<_> =
        dispatcher.test_outcomes().iter().map(|o| o.name().to_owned()).collect();
    assert_eq!(sorted, ["alpha", "bravo", "charlie", "delta"]);
}

#[test]
fn severity_order_is_strict() {
    for pair in TestResult::ALL.windows(2) {
        assert!(pair[0].is_less_severe_than(pair[1]), "{} < {}", pair[0], pair[1]);
        assert!(!pair[1].is_less_severe_than(pair[0]));
    }

    let mut shuffled = TestResult::ALL.to_vec();
    shuffled.shuffle(&mut rand::thread_rng());
    assert_eq!(TestResult::overall(shuffled), TestResult::Compromised);
}
