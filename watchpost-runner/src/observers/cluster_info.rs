//! `cluster-info` observer -- serializes basic facts about the cluster under test.
//!
//! Does no collection of its own. It remembers the cluster access handed to
//! StartCollection, checks the final interval stream for a control-plane node
//! update, and writes `cluster-info/cluster-data{suffix}.json` at the storage phase.
//!
//! Cleanup drops the credentials but keeps the non-secret [`ClusterFacts`], so a
//! storage write racing a forced cleanup still has what it needs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use watchpost_core::cleanup::CleanupGuard;
use watchpost_core::error::{ObserverError, WatchpostError};
use watchpost_core::interval::{CATEGORY_NODE_STATE, IntervalRecorder, Intervals};
use watchpost_core::observer::{
    ClusterAccess, CollectedData, Observer, ResourceSnapshot, TimeWindow,
};
use watchpost_core::result::ResultRecord;
use watchpost_core::storage::StorageSink;

/// Registered observer name, also the artifact subdirectory.
pub const NAME: &str = "cluster-info";
/// Ownership tag used for triage routing.
pub const OWNER: &str = "Test Framework";

/// Node role annotation key on `node-state` intervals.
pub const ANNOTATION_ROLE: &str = "role";
/// Reason annotation key on `node-state` intervals.
pub const ANNOTATION_REASON: &str = "reason";
/// Role value for control-plane nodes.
pub const ROLE_MASTER: &str = "master";
/// Reason value recorded when a node is updated.
pub const REASON_NODE_UPDATE: &str = "NodeUpdate";

/// How the run authenticates against the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    BearerToken,
    ClientCertificate,
    Anonymous,
}

impl AuthMode {
    fn of(cluster: &ClusterAccess) -> Self {
        if cluster.bearer_token.is_some() {
            Self::BearerToken
        } else if cluster.client_certificate.is_some() && cluster.client_key.is_some() {
            Self::ClientCertificate
        } else {
            Self::Anonymous
        }
    }
}

/// Non-secret facts about the cluster, captured at StartCollection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterFacts {
    pub api_url: String,
    pub auth_mode: AuthMode,
    pub insecure_skip_tls_verify: bool,
}

impl From<&ClusterAccess> for ClusterFacts {
    fn from(cluster: &ClusterAccess) -> Self {
        Self {
            api_url: cluster.host.clone(),
            auth_mode: AuthMode::of(cluster),
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
        }
    }
}

/// Contents of `cluster-data{suffix}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterData {
    pub api_url: String,
    pub auth_mode: AuthMode,
    pub insecure_skip_tls_verify: bool,
    /// `"Y"` when a control-plane node was updated during the run, `"N"` otherwise.
    pub master_node_updated: String,
    /// Number of tracked objects per resource kind at the end of the run.
    pub resource_counts: BTreeMap<String, usize>,
    pub interval_count: usize,
}

/// Whether any control-plane node went through an update.
pub fn was_master_node_updated(intervals: &Intervals) -> bool {
    intervals.iter().any(|interval| {
        interval.category == CATEGORY_NODE_STATE
            && interval.annotation(ANNOTATION_ROLE) == Some(ROLE_MASTER)
            && interval.annotation(ANNOTATION_REASON) == Some(REASON_NODE_UPDATE)
    })
}

/// Built-in observer that writes a cluster summary artifact.
#[derive(Debug, Default)]
pub struct ClusterInfoObserver {
    /// Credential-bearing access, cleared at cleanup.
    cluster: Mutex<Option<ClusterAccess>>,
    /// Survives cleanup.
    facts: Mutex<Option<ClusterFacts>>,
    guard: CleanupGuard,
}

impl ClusterInfoObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether credentials are still held.
    pub fn holds_credentials(&self) -> bool {
        self.cluster.lock().is_ok_and(|slot| slot.is_some())
    }

    fn facts(&self) -> Result<ClusterFacts, WatchpostError> {
        let slot = self
            .facts
            .lock()
            .map_err(|_| ObserverError::Failed("cluster facts lock poisoned".to_owned()))?;
        slot.clone()
            .ok_or_else(|| {
                ObserverError::Failed(
                    "cluster access was never recorded: StartCollection did not run".to_owned(),
                )
            })
            .map_err(Into::into)
    }

    fn cluster_data(
        &self,
        final_intervals: &Intervals,
        resources: &ResourceSnapshot,
    ) -> Result<ClusterData, WatchpostError> {
        let facts = self.facts()?;
        let master_node_updated = if was_master_node_updated(final_intervals) {
            "Y"
        } else {
            "N"
        };
        let resource_counts = resources
            .kinds()
            .map(|kind| {
                let count = resources.kind(kind).map_or(0, BTreeMap::len);
                (kind.to_owned(), count)
            })
            .collect();

        Ok(ClusterData {
            api_url: facts.api_url,
            auth_mode: facts.auth_mode,
            insecure_skip_tls_verify: facts.insecure_skip_tls_verify,
            master_node_updated: master_node_updated.to_owned(),
            resource_counts,
            interval_count: final_intervals.len(),
        })
    }
}

impl Observer for ClusterInfoObserver {
    async fn start_collection(
        &self,
        _cancel: &CancellationToken,
        cluster: &ClusterAccess,
        _recorder: &IntervalRecorder,
    ) -> Result<(), WatchpostError> {
        {
            let mut facts = self
                .facts
                .lock()
                .map_err(|_| ObserverError::Failed("cluster facts lock poisoned".to_owned()))?;
            *facts = Some(ClusterFacts::from(cluster));
        }
        let mut slot = self
            .cluster
            .lock()
            .map_err(|_| ObserverError::Failed("cluster access lock poisoned".to_owned()))?;
        *slot = Some(cluster.clone());
        tracing::debug!(observer = NAME, host = %cluster.host, "cluster access recorded");
        Ok(())
    }

    async fn collect_data(
        &self,
        _cancel: &CancellationToken,
        _storage_dir: &Path,
        _window: &TimeWindow,
    ) -> Result<CollectedData, WatchpostError> {
        // 기록기로 스트리밍하는 데이터가 없으므로 수집할 것이 없음
        Ok(CollectedData::default())
    }

    async fn construct_computed_intervals(
        &self,
        _cancel: &CancellationToken,
        _starting: &Intervals,
        _resources: &ResourceSnapshot,
        _window: &TimeWindow,
    ) -> Result<Intervals, WatchpostError> {
        Ok(Intervals::new())
    }

    async fn evaluate_tests(
        &self,
        _cancel: &CancellationToken,
        _final_intervals: &Intervals,
    ) -> Result<Vec<ResultRecord>, WatchpostError> {
        Ok(Vec::new())
    }

    async fn write_content_to_storage(
        &self,
        _cancel: &CancellationToken,
        storage_dir: &Path,
        time_suffix: &str,
        final_intervals: &Intervals,
        resources: &ResourceSnapshot,
    ) -> Result<(), WatchpostError> {
        let data = self.cluster_data(final_intervals, resources)?;
        let sink = StorageSink::new(storage_dir);
        let path = sink.artifact_path(NAME, &format!("cluster-data{time_suffix}.json"))?;
        sink.write_json(&path, &data).await?;
        tracing::info!(
            observer = NAME,
            path = %path.display(),
            master_node_updated = %data.master_node_updated,
            "cluster data written"
        );
        Ok(())
    }

    async fn cleanup(&self, _cancel: &CancellationToken) -> Result<(), WatchpostError> {
        self.guard
            .run(|| async {
                // 자격 증명을 실행 이후까지 들고 있지 않음
                match self.cluster.lock() {
                    Ok(mut slot) => {
                        *slot = None;
                        Ok(())
                    }
                    Err(_) => Err(WatchpostError::from(ObserverError::Failed(
                        "cluster access lock poisoned".to_owned(),
                    ))),
                }
            })
            .await
    }
}
