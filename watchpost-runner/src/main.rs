use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use watchpost_core::config::WatchpostConfig;
use watchpost_runner::cli::RunnerCli;
use watchpost_runner::logging::init_tracing;
use watchpost_runner::report::summary_line;
use watchpost_runner::runner::Runner;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = RunnerCli::parse();

    // 파일 → 환경변수 → CLI 순서로 설정 적용
    let config = WatchpostConfig::load_with(&cli.config, |config| cli.apply_overrides(config))
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(&config.general)?;
    watchpost_core::metrics::describe_all();
    tracing::info!(config = %cli.config.display(), "watchpost-runner starting");

    let runner = Runner::build_from_config(config)?;
    tracing::info!(observers = ?runner.observer_names(), "observers registered");

    let summary = runner.run().await?;
    println!("{}", summary_line(&summary.report));
    println!("results: {}", summary.paths.results.display());

    if summary.is_failure() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
