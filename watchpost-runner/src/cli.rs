//! CLI argument definitions for watchpost-runner.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use watchpost_core::config::WatchpostConfig;

/// Watchpost invariant-test runner.
///
/// Starts every enabled observer, keeps the observation window open for the
/// configured workload duration (or until the first SIGINT/SIGTERM), then
/// drives the remaining lifecycle phases and writes the run report.
#[derive(Parser, Debug)]
#[command(name = "watchpost-runner")]
#[command(version, about, long_about = None)]
pub struct RunnerCli {
    /// Path to watchpost.toml configuration file.
    #[arg(short, long, default_value = "watchpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the artifact directory.
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Override the observation window length in seconds (0 = until signal).
    #[arg(long)]
    pub workload_secs: Option<u64>,

    /// Validate configuration file and exit without starting a run.
    #[arg(long)]
    pub validate: bool,
}

impl RunnerCli {
    /// Apply command-line overrides on top of the loaded configuration.
    ///
    /// Pass this to [`WatchpostConfig::load_with`] so validation runs after it.
    pub fn apply_overrides(&self, config: &mut WatchpostConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(dir) = &self.storage_dir {
            config.general.storage_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(secs) = self.workload_secs {
            config.lifecycle.workload_secs = secs;
        }
    }
}
