//! End-to-end run with three stub observers.

use crate::helpers::stub_observer::*;
use crate::helpers::{marker, test_inputs, test_options};

use tokio_util::sync::CancellationToken;
use watchpost_core::lifecycle::{LifecycleOrchestrator, LifecycleState, Phase};
use watchpost_core::registry::ObserverRegistry;
use watchpost_core::result::Outcome;

/// Observer 2 fails only at evaluation: the run completes with 2 passing and
/// 1 failing record, and storage is written for all 3.
#[tokio::test]
async fn test_evaluation_failure_in_one_of_three() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register(
            "observer-1",
            "Team 1",
            StubObserver::new("observer-1", &log).emitting(marker(1, "observer-1", "one")),
        )
        .expect("register");
    registry
        .register(
            "observer-2",
            "Team 2",
            StubObserver::new("observer-2", &log).failing_on(Phase::EvaluateTests),
        )
        .expect("register");
    registry
        .register(
            "observer-3",
            "Team 3",
            StubObserver::new("observer-3", &log).emitting(marker(3, "observer-3", "three")),
        )
        .expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    let report = LifecycleOrchestrator::new(registry, test_options())
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run completes");

    assert_eq!(report.state, LifecycleState::CleanedUp);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.counts.passed, 2);
    assert_eq!(report.counts.failed, 1);

    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.outcome == Outcome::Fail)
        .collect();
    assert_eq!(failed[0].source, "observer-2");
    assert_eq!(failed[0].owner, "Team 2");
    assert_eq!(
        failed[0].name,
        "[Team 2] invariant test observer-2 test evaluation"
    );

    for name in ["observer-1", "observer-2", "observer-3"] {
        assert_eq!(log.entries(name, Phase::WriteStorage), 1, "{name}");
        assert_eq!(log.entries(name, Phase::Cleanup), 1, "{name}");
    }

    // Results keep registry order.
    let sources: Vec<&str> = report.results.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["observer-1", "observer-2", "observer-3"]);

    // Intervals are sorted by start time.
    let messages: Vec<&str> = report.intervals.iter().map(|i| i.message.as_str()).collect();
    assert_eq!(messages, vec!["one", "three"]);
}

/// The report serializes to JSON for the external reporting collaborator.
#[tokio::test]
async fn test_report_serializes() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register("only", "Team", StubObserver::new("only", &log))
        .expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    let report = LifecycleOrchestrator::new(registry, test_options())
        .run(&CancellationToken::new(), &test_inputs(dir.path()), async {})
        .await
        .expect("run");

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["state"], "cleaned_up");
    assert_eq!(json["counts"]["passed"], 1);
    assert_eq!(json["results"][0]["outcome"], "pass");
    assert_eq!(json["results"][0]["owner"], "Team");
}
