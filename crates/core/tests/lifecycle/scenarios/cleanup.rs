//! Cleanup idempotence and concurrent cleanup triggers.

use std::sync::atomic::Ordering;

use crate::helpers::stub_observer::*;
use crate::helpers::test_options;

use tokio_util::sync::CancellationToken;
use watchpost_core::lifecycle::{LifecycleOrchestrator, Phase};
use watchpost_core::observer::{ClusterAccess, Observer};
use watchpost_core::registry::ObserverRegistry;

/// Cleanup twice in sequence: one side effect, and the second call succeeds
/// even though the first one failed.
#[tokio::test]
async fn test_cleanup_twice_is_idempotent_after_error() {
    let log = CallLog::new();
    let observer = StubObserver::new("watch", &log).failing_cleanup();
    let effects = observer.cleanup_effects();
    let cancel = CancellationToken::new();

    let first = observer.cleanup(&cancel).await;
    let second = observer.cleanup(&cancel).await;

    assert!(first.is_err());
    assert!(second.is_ok());
    assert_eq!(effects.load(Ordering::SeqCst), 1);
    assert_eq!(log.entries("watch", Phase::Cleanup), 2);
}

/// The cleanup handle racing the normal shutdown path runs the side effect once.
#[tokio::test]
async fn test_forced_cleanup_races_normal_cleanup() {
    let log = CallLog::new();
    let observer = StubObserver::new("watch", &log);
    let effects = observer.cleanup_effects();

    let mut registry = ObserverRegistry::new();
    registry.register("watch", "Team", observer).expect("register");

    let mut orchestrator = LifecycleOrchestrator::new(registry, test_options());
    orchestrator
        .start_collection(&CancellationToken::new(), &ClusterAccess::new("https://api:6443"))
        .await
        .expect("start");

    let handle = orchestrator.cleanup_handle();
    assert_eq!(handle.started_count(), 1);
    let forced = tokio::spawn(async move { handle.cleanup().await });

    orchestrator.cleanup().await;
    let forced_failures = forced.await.expect("forced cleanup task");

    assert!(forced_failures.is_empty());
    assert!(orchestrator.results().is_empty());
    assert_eq!(effects.load(Ordering::SeqCst), 1);
    assert_eq!(log.entries("watch", Phase::Cleanup), 2);
}

/// A failing cleanup becomes a record and does not block other cleanups.
#[tokio::test]
async fn test_cleanup_failure_does_not_block_others() {
    let log = CallLog::new();
    let broken = StubObserver::new("broken", &log).failing_cleanup();
    let healthy = StubObserver::new("healthy", &log);
    let healthy_effects = healthy.cleanup_effects();

    let mut registry = ObserverRegistry::new();
    registry.register("broken", "Team A", broken).expect("register");
    registry.register("healthy", "Team B", healthy).expect("register");

    let dir = tempfile::tempdir().expect("tempdir");
    let report = LifecycleOrchestrator::new(registry, test_options())
        .run(
            &CancellationToken::new(),
            &crate::helpers::test_inputs(dir.path()),
            async {},
        )
        .await
        .expect("run");

    let failures: Vec<_> = report.results.iter().filter(|r| r.is_failure()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "[Team A] invariant test broken cleanup");
    assert_eq!(healthy_effects.load(Ordering::SeqCst), 1);

    // Already collected results stay valid.
    assert_eq!(report.counts.passed, 2);
}

/// Orchestrator-level cleanup is a no-op on the second call.
#[tokio::test]
async fn test_orchestrator_cleanup_runs_once() {
    let log = CallLog::new();
    let mut registry = ObserverRegistry::new();
    registry
        .register("watch", "Team", StubObserver::new("watch", &log))
        .expect("register");

    let mut orchestrator = LifecycleOrchestrator::new(registry, test_options());
    orchestrator
        .start_collection(&CancellationToken::new(), &ClusterAccess::new("h"))
        .await
        .expect("start");

    orchestrator.cleanup().await;
    orchestrator.cleanup().await;

    assert_eq!(log.entries("watch", Phase::Cleanup), 1);
    let handle = orchestrator.cleanup_handle();
    drop(orchestrator);

    // The handle outlives the orchestrator and stays safe to call.
    let late = handle.cleanup().await;
    assert!(late.is_empty());
    assert_eq!(log.entries("watch", Phase::Cleanup), 2);
}
