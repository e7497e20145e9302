//! Cancellation: in-flight calls return within the grace period and every
//! started observer is cleaned up.

use std::time::Duration;

use crate::helpers::stub_observer::*;
use crate::helpers::{test_inputs, test_options, test_window};

use tokio_util::sync::CancellationToken;
use watchpost_core::lifecycle::{LifecycleOptions, LifecycleOrchestrator, LifecycleState, Phase};
use watchpost_core::observer::ResourceSnapshot;
use watchpost_core::registry::ObserverRegistry;

/// Cancel in the middle of CollectData.
#[tokio::test(start_paused = true)]
async fn test_cancel_mid_phase_returns_within_grace() {
    let log = CallLog::new();
    let polite = StubObserver::new("polite", &log).waiting_for_cancel_on(Phase::CollectData);
    let stubborn = StubObserver::new("stubborn", &log).hanging_on(Phase::CollectData);
    let polite_effects = polite.cleanup_effects();
    let stubborn_effects = stubborn.cleanup_effects();

    let mut registry = ObserverRegistry::new();
    registry.register("polite", "Team A", polite).expect("register");
    registry.register("stubborn", "Team B", stubborn).expect("register");

    let options = LifecycleOptions {
        phase_timeout: Duration::from_secs(600),
        cancel_grace: Duration::from_secs(2),
        ..test_options()
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = test_inputs(dir.path());
    let cancel = CancellationToken::new();
    let mut orchestrator = LifecycleOrchestrator::new(registry, options);

    orchestrator
        .start_collection(&cancel, &inputs.cluster)
        .await
        .expect("start");

    // When: the context is cancelled 100ms into CollectData
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    orchestrator
        .collect_data(&cancel, dir.path(), test_window())
        .await
        .expect("collect");
    let elapsed = started.elapsed();

    // Then: the phase settled within cancellation time + grace, far before the timeout
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed <= Duration::from_millis(100) + Duration::from_secs(2) + Duration::from_millis(50));
    assert!(orchestrator.is_cancelled());

    // Then: remaining phases are skipped
    orchestrator
        .construct_computed_intervals(&cancel, &ResourceSnapshot::new(), test_window())
        .await
        .expect("construct");
    orchestrator.evaluate_tests(&cancel).await.expect("evaluate");
    assert_eq!(log.entries("polite", Phase::ConstructIntervals), 0);
    assert_eq!(log.entries("stubborn", Phase::EvaluateTests), 0);

    // Then: cleanup still runs for every started observer
    orchestrator.cleanup().await;
    assert_eq!(polite_effects.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(stubborn_effects.load(std::sync::atomic::Ordering::SeqCst), 1);

    let report = orchestrator.into_report();
    assert!(report.cancelled);
    assert_eq!(report.state, LifecycleState::CleanedUp);
    assert_eq!(report.counts.failed, 2);
    let stubborn_failure = report
        .results_from("stubborn")
        .next()
        .expect("stubborn record");
    assert!(
        stubborn_failure
            .failure
            .as_deref()
            .is_some_and(|f| f.contains("abandoned after cancellation"))
    );
}

/// Cancel while the workload runs: remaining phases are skipped, cleanup runs.
#[tokio::test(start_paused = true)]
async fn test_cancel_during_workload_still_cleans_up() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register("a", "Team", StubObserver::new("a", &log))
        .expect("register");
    registry
        .register("b", "Team", StubObserver::new("b", &log))
        .expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let report = LifecycleOrchestrator::new(registry, test_options())
        .run(&cancel, &test_inputs(dir.path()), async {
            // Workload that would run for an hour
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
        .await
        .expect("run");

    assert!(report.cancelled);
    for name in ["a", "b"] {
        assert_eq!(
            log.phases_of(name),
            vec![Phase::StartCollection, Phase::Cleanup],
            "{name}"
        );
    }
    assert!(report.results.is_empty());
}
