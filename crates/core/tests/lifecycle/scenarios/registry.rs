//! Registry construction rules.
//!
//! Duplicate names are fatal configuration errors raised before any phase runs.

use std::sync::Arc;

use crate::helpers::stub_observer::*;

use watchpost_core::error::{RegistryError, WatchpostError};
use watchpost_core::observer::DynObserver;
use watchpost_core::registry::ObserverRegistry;

fn assert_duplicate(err: WatchpostError, expected: &str) {
    match err {
        WatchpostError::Registry(RegistryError::DuplicateName { name }) => {
            assert_eq!(name, expected)
        }
        other => panic!("expected duplicate name error, got {other}"),
    }
}

/// The same name registered twice fails in either order of owners.
#[test]
fn test_duplicate_name_fails_regardless_of_order() {
    let log = CallLog::new();

    // Given: "audit" registered first by Security
    let mut first = ObserverRegistry::new();
    first
        .register("audit", "Security", StubObserver::new("audit", &log))
        .expect("first registration");
    first
        .register("disruption", "Networking", StubObserver::new("disruption", &log))
        .expect("second registration");

    // When/Then: a second "audit" fails
    let err = first
        .register("audit", "Networking", StubObserver::new("audit", &log))
        .unwrap_err();
    assert_duplicate(err, "audit");

    // Given: reversed registration order
    let mut second = ObserverRegistry::new();
    second
        .register("disruption", "Networking", StubObserver::new("disruption", &log))
        .expect("first registration");
    second
        .register("audit", "Security", StubObserver::new("audit", &log))
        .expect("second registration");
    let err = second
        .register("disruption", "Security", StubObserver::new("disruption", &log))
        .unwrap_err();
    assert_duplicate(err, "disruption");
}

/// Registering the very same instance twice under one name still fails.
#[test]
fn test_duplicate_name_fails_for_same_instance() {
    let log = CallLog::new();
    let shared: Arc<dyn DynObserver> = Arc::new(StubObserver::new("node", &log));

    let mut registry = ObserverRegistry::new();
    registry
        .register_dyn("node", "Node", Arc::clone(&shared))
        .expect("first registration");
    let err = registry.register_dyn("node", "Node", shared).unwrap_err();
    assert_duplicate(err, "node");
}

/// Composing an overlapping child fails and no phase ever runs.
#[test]
fn test_compose_overlap_fails_before_any_phase() {
    let log = CallLog::new();

    let mut parent = ObserverRegistry::new();
    parent
        .register("etcd", "Etcd", StubObserver::new("etcd", &log))
        .expect("parent registration");

    let mut child = ObserverRegistry::new();
    child
        .register("kube-apiserver", "API", StubObserver::new("kube-apiserver", &log))
        .expect("child registration");
    child
        .register("etcd", "Etcd", StubObserver::new("etcd", &log))
        .expect("child registration");

    let err = parent.compose(child).unwrap_err();
    assert_duplicate(err, "etcd");

    // Then: the parent is unchanged and no observer was invoked
    assert_eq!(parent.names(), vec!["etcd"]);
    assert!(log.is_empty());
}

/// Composition flattens children so each observer is visited once per phase.
#[tokio::test]
async fn test_composed_observers_visited_once_per_phase() {
    let log = CallLog::new();

    let mut networking = ObserverRegistry::new();
    networking
        .register("dns", "Networking", StubObserver::new("dns", &log))
        .expect("register");
    let mut platform = ObserverRegistry::new();
    platform
        .register("node", "Node", StubObserver::new("node", &log))
        .expect("register");
    platform.compose(networking).expect("compose");

    let mut root = ObserverRegistry::new();
    root.compose(platform).expect("compose");
    assert_eq!(root.names(), vec!["node", "dns"]);

    let dir = tempfile::tempdir().expect("tempdir");
    let report = watchpost_core::lifecycle::LifecycleOrchestrator::new(
        root,
        crate::helpers::test_options(),
    )
    .run(
        &tokio_util::sync::CancellationToken::new(),
        &crate::helpers::test_inputs(dir.path()),
        async {},
    )
    .await
    .expect("run");

    for name in ["node", "dns"] {
        for phase in watchpost_core::lifecycle::Phase::ALL {
            assert_eq!(log.entries(name, phase), 1, "{name} {phase}");
        }
    }
    assert_eq!(report.counts.passed, 2);
}
