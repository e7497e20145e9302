//! Phase barrier: ordering within and across observers.

use std::time::Duration;

use crate::helpers::stub_observer::*;
use crate::helpers::{marker, test_inputs, test_options};

use tokio_util::sync::CancellationToken;
use watchpost_core::lifecycle::{LifecycleOptions, LifecycleOrchestrator, Phase};
use watchpost_core::registry::ObserverRegistry;

/// No observer's phase N overlaps its phase N+1, while the same phase of
/// different observers runs concurrently.
#[tokio::test(start_paused = true)]
async fn test_phases_never_overlap_within_observer() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register(
            "slow",
            "Team",
            StubObserver::new("slow", &log).with_delay(Duration::from_millis(300)),
        )
        .expect("register");
    registry
        .register(
            "fast",
            "Team",
            StubObserver::new("fast", &log).with_delay(Duration::from_millis(10)),
        )
        .expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    LifecycleOrchestrator::new(registry, test_options())
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run");

    let phases = [
        Phase::StartCollection,
        Phase::CollectData,
        Phase::ConstructIntervals,
        Phase::EvaluateTests,
        Phase::WriteStorage,
    ];

    for pair in phases.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        for name in ["slow", "fast"] {
            let exit = log.seq_of(name, current, Mark::Exit).expect("exit");
            let enter = log.seq_of(name, next, Mark::Enter).expect("enter");
            assert!(exit < enter, "{name}: {current} overlapped {next}");
        }

        // Barrier: the fast observer waits for the slow one before moving on.
        let slow_exit = log.seq_of("slow", current, Mark::Exit).expect("exit");
        let fast_next = log.seq_of("fast", next, Mark::Enter).expect("enter");
        assert!(slow_exit < fast_next, "fast entered {next} before slow left {current}");
    }

    // Same phase of different observers overlaps.
    for phase in phases {
        let fast_enter = log.seq_of("fast", phase, Mark::Enter).expect("enter");
        let slow_exit = log.seq_of("slow", phase, Mark::Exit).expect("exit");
        assert!(fast_enter < slow_exit, "{phase} was serialized");
    }
}

/// Every observer's phase 3 sees the union of all phase-2 intervals.
#[tokio::test]
async fn test_phase_three_receives_union_of_raw_intervals() {
    let log = CallLog::new();
    let producer_x = StubObserver::new("producer-x", &log).emitting(marker(10, "producer-x", "X"));
    let producer_y = StubObserver::new("producer-y", &log).emitting(marker(20, "producer-y", "Y"));
    let consumer = StubObserver::new("consumer", &log);

    let seen_by_x = producer_x.seen_starting();
    let seen_by_consumer = consumer.seen_starting();

    let mut registry = ObserverRegistry::new();
    registry.register("producer-x", "Team", producer_x).expect("register");
    registry.register("producer-y", "Team", producer_y).expect("register");
    registry.register("consumer", "Team", consumer).expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    LifecycleOrchestrator::new(registry, test_options())
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run");

    for seen in [seen_by_consumer, seen_by_x] {
        let starting = seen.lock().expect("lock").clone().expect("phase 3 ran");
        let messages: Vec<&str> = starting.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"X"), "missing X: {messages:?}");
        assert!(messages.contains(&"Y"), "missing Y: {messages:?}");
    }
}

/// A hanging observer is marked failed-by-timeout and the phase advances.
#[tokio::test(start_paused = true)]
async fn test_timeout_force_advances_phase() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register(
            "stuck",
            "Team",
            StubObserver::new("stuck", &log).hanging_on(Phase::ConstructIntervals),
        )
        .expect("register");
    registry
        .register("healthy", "Team", StubObserver::new("healthy", &log))
        .expect("register");

    let options = LifecycleOptions {
        phase_timeout: Duration::from_secs(30),
        ..test_options()
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let started = tokio::time::Instant::now();
    let report = LifecycleOrchestrator::new(registry, options)
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run");

    assert!(started.elapsed() < Duration::from_secs(60));
    let timeout = report
        .results_from("stuck")
        .find(|r| r.is_failure())
        .expect("timeout record");
    assert_eq!(timeout.name, "[Team] invariant test stuck interval construction");
    assert!(
        timeout
            .failure
            .as_deref()
            .is_some_and(|f| f.contains("within 30s"))
    );

    // Both observers reached the later phases, and cleanup ran for the stuck one.
    assert_eq!(log.entries("stuck", Phase::EvaluateTests), 1);
    assert_eq!(log.entries("healthy", Phase::WriteStorage), 1);
    assert_eq!(log.entries("stuck", Phase::Cleanup), 1);
}
