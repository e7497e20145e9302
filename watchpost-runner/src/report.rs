//! Run report output -- interval and result files written after cleanup.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use watchpost_core::error::WatchpostError;
use watchpost_core::lifecycle::{LifecycleState, RunReport};
use watchpost_core::result::{OutcomeCounts, ResultRecord};
use watchpost_core::storage::StorageSink;

/// Prefix of the final interval stream file.
pub const INTERVALS_FILE_PREFIX: &str = "e2e-intervals";
/// Prefix of the result record file.
pub const RESULTS_FILE_PREFIX: &str = "observer-results";

/// Artifact file name suffix for a run started at `at`, e.g. `_20260101-120000`.
pub fn time_suffix(at: DateTime<Utc>) -> String {
    at.format("_%Y%m%d-%H%M%S").to_string()
}

/// Paths of the files written by [`write_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub intervals: PathBuf,
    pub results: PathBuf,
}

#[derive(Serialize)]
struct ResultsDocument<'a> {
    run_id: &'a str,
    state: LifecycleState,
    cancelled: bool,
    counts: OutcomeCounts,
    results: &'a [ResultRecord],
}

/// Write the final intervals and result records into the storage root.
pub async fn write_report(
    sink: &StorageSink,
    time_suffix: &str,
    report: &RunReport,
) -> Result<ReportPaths, WatchpostError> {
    let paths = ReportPaths {
        intervals: sink.file_path(&format!("{INTERVALS_FILE_PREFIX}{time_suffix}.json"))?,
        results: sink.file_path(&format!("{RESULTS_FILE_PREFIX}{time_suffix}.json"))?,
    };

    sink.write_json(&paths.intervals, &report.intervals).await?;
    sink.write_json(
        &paths.results,
        &ResultsDocument {
            run_id: &report.run_id,
            state: report.state,
            cancelled: report.cancelled,
            counts: report.counts,
            results: &report.results,
        },
    )
    .await?;

    tracing::info!(
        intervals = %paths.intervals.display(),
        results = %paths.results.display(),
        "run report written"
    );
    Ok(paths)
}

/// One-line human summary, e.g. `3 passed, 1 failed, 0 flaked`.
pub fn summary_line(report: &RunReport) -> String {
    let mut line = format!(
        "{} passed, {} failed, {} flaked",
        report.counts.passed, report.counts.failed, report.counts.flaked
    );
    if report.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}
