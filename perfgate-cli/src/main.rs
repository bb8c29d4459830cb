use anyhow::Context;
use clap::Parser;
use perfgate::prelude::*;
use std::process::ExitCode;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod endpoints;
mod history;
mod report;

use cli::{Cli, TestMode};
use history::{HistoryStore, TestType};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perfgate=info")),
        )
        .init();

    let cli = Cli::parse();
    let tasks = endpoints::load(&cli.file)?;
    info!("Loaded {} endpoints from {}", tasks.len(), cli.file.display());

    let runner = Runner::new(tasks, cli.run_config())?.with_span(info_span!("perfgate"));
    let store = HistoryStore::open(&cli.history_dir)?;

    match cli.mode.kind() {
        TestMode::Perf => run_performance(&cli, &runner, &store).await,
        TestMode::UserLoad => {
            let steps = runner.run_user_load(&cli.user_load_config()).await?;
            let stats = LoadTestStats::calculate(&steps);
            store.save_load_results(&stats, TestType::UserLoad)?;
            print!("{}", report::LoadSummary::new("User Load Test Summary", &stats));
            Ok(ExitCode::SUCCESS)
        }
        TestMode::DataLoad => {
            let steps = runner.run_data_load(&cli.data_load_config()).await?;
            let stats = LoadTestStats::calculate(&steps);
            store.save_load_results(&stats, TestType::DataLoad)?;
            print!("{}", report::LoadSummary::new("Data Load Test Summary", &stats));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_performance(
    cli: &Cli,
    runner: &Runner,
    store: &HistoryStore,
) -> anyhow::Result<ExitCode> {
    let detector = DegradationDetector::new(cli.threshold)?;

    let results = runner.run().await?;
    let stats = Statistics::calculate(&results);
    print!("{stats}");

    let history = store
        .save_results(stats, &detector)
        .context("Failed to save test history")?;

    let Some(baseline) = &history.baseline_id else {
        info!("No baseline found, run {} becomes the baseline", history.run_id);
        return Ok(ExitCode::SUCCESS);
    };

    if !history.degradation {
        info!("No degradation against baseline {baseline}");
        return Ok(ExitCode::SUCCESS);
    }

    warn!("Performance degradation detected against baseline {baseline}");
    print!("{}", report::DegradationSummary::new(baseline, &history.endpoints));

    if cli.fail_on_degradation {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
