//! Run driver -- observer assembly, the observation window, and signal escalation.
//!
//! The [`Runner`] is the central coordinator of `watchpost-runner`.
//! It validates the configuration, assembles the observer registry,
//! and drives one lifecycle run through the stepwise orchestrator API.
//!
//! # Run Order
//!
//! 1. StartCollection on every observer
//! 2. Observation window (fixed length, or until the first signal)
//! 3. CollectData → ConstructComputedIntervals → EvaluateTests → WriteContentToStorage
//! 4. Cleanup
//! 5. Report files
//!
//! # Signal Escalation
//!
//! Each SIGINT/SIGTERM moves one step along the [`ShutdownLadder`]:
//! end the observation window, then cancel the run, then force cleanup.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use watchpost_core::config::WatchpostConfig;
use watchpost_core::interval::{CATEGORY_WORKLOAD, Interval, IntervalRecorder};
use watchpost_core::lifecycle::{
    CleanupHandle, LifecycleOptions, LifecycleOrchestrator, RunInputs, RunReport,
};
use watchpost_core::observer::{ClusterAccess, TimeWindow};
use watchpost_core::registry::ObserverRegistry;
use watchpost_core::storage::StorageSink;

use crate::observers;
use crate::report::{self, ReportPaths};

/// Source name used for intervals the runner records itself.
pub const RUNNER_SOURCE: &str = "watchpost-runner";

// ─── RunControls / ShutdownLadder ────────────────────────────────────

/// Cancellation tokens shared between the run and its triggers.
#[derive(Debug, Clone, Default)]
pub struct RunControls {
    /// Cancelled when the observation window should end.
    pub workload: CancellationToken,
    /// Cancelled when the run itself should stop.
    pub run: CancellationToken,
}

impl RunControls {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Action taken for one shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    /// Observation window closed; remaining phases run normally.
    EndWorkload,
    /// Run cancelled; remaining phases are skipped.
    CancelRun,
    /// Cleanup forced from the signal task.
    ForceCleanup,
}

/// Escalates shutdown one step per signal.
#[derive(Debug, Clone)]
pub struct ShutdownLadder {
    controls: RunControls,
    cleanup: CleanupHandle,
}

impl ShutdownLadder {
    pub fn new(controls: RunControls, cleanup: CleanupHandle) -> Self {
        Self { controls, cleanup }
    }

    /// The step the next signal will take.
    pub fn next_step(&self) -> ShutdownStep {
        if !self.controls.workload.is_cancelled() {
            ShutdownStep::EndWorkload
        } else if !self.controls.run.is_cancelled() {
            ShutdownStep::CancelRun
        } else {
            ShutdownStep::ForceCleanup
        }
    }

    /// Take the next step.
    pub async fn escalate(&self) -> ShutdownStep {
        let step = self.next_step();
        match step {
            ShutdownStep::EndWorkload => {
                tracing::info!("ending observation window");
                self.controls.workload.cancel();
            }
            ShutdownStep::CancelRun => {
                tracing::warn!("cancelling run, remaining phases will be skipped");
                self.controls.run.cancel();
            }
            ShutdownStep::ForceCleanup => {
                tracing::warn!(
                    observers = self.cleanup.started_count(),
                    "forcing observer cleanup"
                );
                for failure in self.cleanup.cleanup().await {
                    tracing::error!(record = %failure, "forced cleanup failed");
                }
            }
        }
        step
    }
}

// ─── Runner ──────────────────────────────────────────────────────────

/// Outcome of one run.
#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub time_suffix: String,
    pub paths: ReportPaths,
}

impl RunSummary {
    /// Whether the process should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        self.report.cancelled || self.report.has_failures()
    }
}

/// Validated configuration plus the observers for one run.
pub struct Runner {
    config: WatchpostConfig,
    registry: ObserverRegistry,
}

impl Runner {
    /// Validate the configuration and register the enabled built-in observers.
    pub fn build_from_config(config: WatchpostConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        let registry = observers::builtin_registry(&config.observers)?;
        tracing::info!(observers = registry.count(), "runner initialized");
        Ok(Self { config, registry })
    }

    /// Merge additional observers into the run.
    pub fn with_observers(mut self, extra: ObserverRegistry) -> Result<Self> {
        self.registry.compose(extra)?;
        Ok(self)
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &WatchpostConfig {
        &self.config
    }

    /// Names of all observers taking part in the run.
    pub fn observer_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Create the orchestrator and inputs for one run.
    pub fn prepare(self) -> RunSession {
        let storage_dir = PathBuf::from(&self.config.general.storage_dir);
        let inputs = RunInputs::new(ClusterAccess::from_config(&self.config.cluster), storage_dir)
            .with_time_suffix(report::time_suffix(chrono::Utc::now()));
        let options = LifecycleOptions::from(&self.config.lifecycle);
        let orchestrator = LifecycleOrchestrator::new(self.registry, options);

        RunSession {
            workload: workload_duration(self.config.lifecycle.workload_secs),
            orchestrator,
            inputs,
            controls: RunControls::new(),
        }
    }

    /// Run once, escalating shutdown on SIGINT/SIGTERM.
    pub async fn run(self) -> Result<RunSummary> {
        let session = self.prepare();
        let ladder = session.ladder();

        let signals = tokio::spawn(async move {
            loop {
                let signal = match wait_for_shutdown_signal().await {
                    Ok(signal) => signal,
                    Err(e) => {
                        tracing::error!(error = %e, "signal handling unavailable");
                        return;
                    }
                };
                let step = ladder.escalate().await;
                tracing::info!(signal, ?step, "shutdown signal handled");
            }
        });

        let summary = session.execute().await;
        signals.abort();
        summary
    }
}

fn workload_duration(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// ─── RunSession ──────────────────────────────────────────────────────

/// One prepared run.
pub struct RunSession {
    workload: Option<Duration>,
    orchestrator: LifecycleOrchestrator,
    inputs: RunInputs,
    controls: RunControls,
}

impl RunSession {
    /// Tokens that end the window or cancel the run.
    pub fn controls(&self) -> &RunControls {
        &self.controls
    }

    /// Recorder for intervals produced outside any observer.
    pub fn recorder(&self) -> &IntervalRecorder {
        self.orchestrator.recorder()
    }

    /// Artifact name suffix for this run.
    pub fn time_suffix(&self) -> &str {
        &self.inputs.time_suffix
    }

    /// Signal escalation bound to this run.
    pub fn ladder(&self) -> ShutdownLadder {
        ShutdownLadder::new(self.controls.clone(), self.orchestrator.cleanup_handle())
    }

    /// Drive the run to completion and write the report.
    pub async fn execute(self) -> Result<RunSummary> {
        let workload = self.workload;
        self.execute_with(move |window_closed| observation_window(workload, window_closed))
            .await
    }

    /// Drive the run with a custom observation window.
    ///
    /// `window` receives the workload token and should finish when the
    /// workload is done; the window also ends when either token is cancelled.
    pub async fn execute_with<F, W>(self, window: F) -> Result<RunSummary>
    where
        F: FnOnce(CancellationToken) -> W,
        W: Future<Output = ()>,
    {
        let Self {
            mut orchestrator,
            inputs,
            controls,
            ..
        } = self;
        let cancel = &controls.run;

        orchestrator.start_collection(cancel, &inputs.cluster).await?;

        let begin = SystemTime::now();
        if !orchestrator.is_cancelled() {
            tracing::info!(run_id = %orchestrator.run_id(), "observation window open");
            tokio::select! {
                () = window(controls.workload.clone()) => {}
                () = controls.workload.cancelled() => {}
                () = cancel.cancelled() => {}
            }
        }
        controls.workload.cancel();
        let end = SystemTime::now();
        tracing::info!(
            elapsed_secs = end.duration_since(begin).unwrap_or_default().as_secs(),
            "observation window closed"
        );

        let workload = Interval::closed(
            begin,
            end,
            CATEGORY_WORKLOAD,
            RUNNER_SOURCE,
            "observation window",
        );
        if let Err(e) = orchestrator.recorder().record(workload) {
            tracing::warn!(error = %e, "workload interval not recorded");
        }

        orchestrator
            .finish(cancel, &inputs, TimeWindow::new(begin, end))
            .await?;
        orchestrator.cleanup().await;
        let report = orchestrator.into_report();

        let sink = StorageSink::new(&inputs.storage_dir);
        let paths = report::write_report(&sink, &inputs.time_suffix, &report).await?;
        tracing::info!(summary = %report::summary_line(&report), "run finished");

        Ok(RunSummary {
            report,
            time_suffix: inputs.time_suffix,
            paths,
        })
    }
}

/// Fixed-length window, or open until the workload token is cancelled.
async fn observation_window(length: Option<Duration>, window_closed: CancellationToken) {
    match length {
        Some(length) => tokio::time::sleep(length).await,
        None => window_closed.cancelled().await,
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that arrived.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
