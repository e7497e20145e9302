//! Shared lifecycle test helpers.


use std::time::{Duration, SystemTime};

use watchpost_core::interval::Interval;
use watchpost_core::lifecycle::{LifecycleOptions, RunInputs};
use watchpost_core::observer::{ClusterAccess, TimeWindow};

/// Options with short limits suitable for tests.
pub fn test_options() -> LifecycleOptions {
    LifecycleOptions {
        phase_timeout: Duration::from_secs(60),
        cleanup_timeout: Duration::from_secs(10),
        cancel_grace: Duration::from_secs(1),
    }
}

/// Run inputs pointing at the given storage directory.
pub fn test_inputs(storage_dir: &std::path::Path) -> RunInputs {
    RunInputs::new(ClusterAccess::new("https://api.test:6443"), storage_dir)
        .with_time_suffix("_20260101-000000")
}

/// A fixed workload window.
pub fn test_window() -> TimeWindow {
    TimeWindow::new(at(0), at(3600))
}

/// Timestamp `secs` seconds after the epoch.
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// An interval tagged with a recognizable message.
pub fn marker(secs: u64, source: &str, message: &str) -> Interval {
    Interval::closed(at(secs), at(secs + 10), "marker", source, message)
}
