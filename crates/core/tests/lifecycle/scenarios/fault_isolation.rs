//! Failure isolation: observer errors become attributed failing records.

use crate::helpers::stub_observer::*;
use crate::helpers::{marker, test_inputs, test_options};

use tokio_util::sync::CancellationToken;
use watchpost_core::lifecycle::{LifecycleOrchestrator, LifecycleState, Phase};
use watchpost_core::registry::ObserverRegistry;

/// One CollectData failure among three leaves the other two intact.
#[tokio::test]
async fn test_collect_failure_is_isolated() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register(
            "alpha",
            "Team A",
            StubObserver::new("alpha", &log).emitting(marker(10, "alpha", "alpha-raw")),
        )
        .expect("register");
    registry
        .register(
            "broken",
            "Team B",
            StubObserver::new("broken", &log)
                .emitting(marker(20, "broken", "never-seen"))
                .failing_on(Phase::CollectData),
        )
        .expect("register");
    registry
        .register(
            "gamma",
            "Team C",
            StubObserver::new("gamma", &log).emitting(marker(30, "gamma", "gamma-raw")),
        )
        .expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    let report = LifecycleOrchestrator::new(registry, test_options())
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run completes");

    // Then: exactly one failing record, attributed to the broken observer
    let failures: Vec<_> = report.results.iter().filter(|r| r.is_failure()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source, "broken");
    assert_eq!(failures[0].owner, "Team B");
    assert_eq!(failures[0].name, "[Team B] invariant test broken collection");

    // Then: the other observers' intervals and results are unaffected
    let messages: Vec<&str> = report.intervals.iter().map(|i| i.message.as_str()).collect();
    assert_eq!(messages, vec!["alpha-raw", "gamma-raw"]);
    assert_eq!(report.results_from("alpha").count(), 1);
    assert_eq!(report.results_from("gamma").count(), 1);

    // Then: the failing observer still took part in later phases
    assert_eq!(log.entries("broken", Phase::EvaluateTests), 1);
    assert_eq!(report.results_from("broken").count(), 2);
}

/// A setup failure does not remove the observer from later phases.
#[tokio::test]
async fn test_setup_failure_still_participates() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register(
            "flaky-setup",
            "Team",
            StubObserver::new("flaky-setup", &log)
                .failing_on(Phase::StartCollection)
                .emitting(marker(5, "flaky-setup", "still-collected")),
        )
        .expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    let report = LifecycleOrchestrator::new(registry, test_options())
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run completes");

    assert_eq!(log.phases_of("flaky-setup"), Phase::ALL.to_vec());
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.passed, 1);
    assert_eq!(report.intervals.len(), 1);
    assert_eq!(report.state, LifecycleState::CleanedUp);
}
