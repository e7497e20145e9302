//! Built-in observers shipped with the runner.
//!
//! Each built-in can be switched off through `[observers] disabled`.
//! Observers from other crates are merged in with
//! [`ObserverRegistry::compose`] before the run starts.

pub mod cluster_info;

use watchpost_core::config::ObserversConfig;
use watchpost_core::error::WatchpostError;
use watchpost_core::registry::ObserverRegistry;

/// Names of all built-in observers.
pub const BUILTIN_NAMES: &[&str] = &[cluster_info::NAME];

/// Build the registry of enabled built-in observers.
pub fn builtin_registry(config: &ObserversConfig) -> Result<ObserverRegistry, WatchpostError> {
    for name in &config.disabled {
        if !BUILTIN_NAMES.contains(&name.as_str()) {
            tracing::warn!(observer = %name, "disabled observer is not a built-in, ignoring");
        }
    }

    let mut registry = ObserverRegistry::new();
    if config.is_enabled(cluster_info::NAME) {
        registry.register(
            cluster_info::NAME,
            cluster_info::OWNER,
            cluster_info::ClusterInfoObserver::new(),
        )?;
    } else {
        tracing::info!(observer = cluster_info::NAME, "built-in observer disabled");
    }
    Ok(registry)
}
