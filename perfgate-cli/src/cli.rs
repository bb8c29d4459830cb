use clap::{Args, Parser};
use perfgate::core::{
    DataLoadConfig, OverflowPolicy, RunConfig, UserLoadConfig, DEFAULT_THRESHOLD_PCT,
};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HISTORY_DIR: &str = "test-history";

/// Benchmark HTTP endpoints, ramp load against them and flag regressions against the last run.
#[derive(Parser, Debug)]
#[command(name = "perfgate", version)]
pub struct Cli {
    /// JSON file containing the endpoints
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub mode: Mode,

    #[arg(long, visible_alias = "tc", default_value_t = 1)]
    pub thread_count: usize,

    /// Requests per endpoint
    #[arg(long, visible_alias = "rc", default_value_t = 1)]
    pub request_count: usize,

    /// Per-request timeout of the worker pool, e.g. `30s` or `500ms`
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub timeout: Duration,

    /// Send the endpoint bodies with each request
    #[arg(long)]
    pub send_body: bool,

    /// Degradation threshold in percent
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_PCT)]
    pub threshold: f64,

    #[arg(long, default_value = DEFAULT_HISTORY_DIR)]
    pub history_dir: PathBuf,

    /// Exit with status 2 when a regression is detected
    #[arg(long)]
    pub fail_on_degradation: bool,

    #[command(flatten)]
    pub user: UserLoadArgs,

    #[command(flatten)]
    pub data: DataLoadArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct Mode {
    /// Run a fixed worker pool benchmark
    #[arg(long)]
    pub test_perf: bool,

    /// Ramp the number of concurrent users
    #[arg(long)]
    pub test_load_user: bool,

    /// Ramp the simulated data volume
    #[arg(long)]
    pub test_load_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    Perf,
    UserLoad,
    DataLoad,
}

impl Mode {
    pub fn kind(&self) -> TestMode {
        if self.test_load_user {
            TestMode::UserLoad
        } else if self.test_load_data {
            TestMode::DataLoad
        } else {
            TestMode::Perf
        }
    }
}

#[derive(Args, Debug)]
pub struct UserLoadArgs {
    #[arg(long, default_value_t = 2)]
    pub start_users: usize,

    #[arg(long, default_value_t = 50)]
    pub max_users: usize,

    /// Users added per step
    #[arg(long, default_value_t = 5)]
    pub step_users: usize,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "60s")]
    pub step_duration: Duration,

    /// What to do with results when the step buffer is full: drop-newest, drop-oldest or block
    #[arg(long, default_value_t = OverflowPolicy::DropNewest)]
    pub overflow_policy: OverflowPolicy,

    /// Collect results while a step runs instead of keeping only what fits in the step buffer
    #[arg(long)]
    pub collect_during_step: bool,
}

#[derive(Args, Debug)]
pub struct DataLoadArgs {
    #[arg(long, default_value_t = 1_000)]
    pub initial_data: usize,

    #[arg(long, default_value_t = 100_000)]
    pub max_data: usize,

    /// Data size multiplier per step
    #[arg(long, default_value_t = 5.0)]
    pub data_multiplier: f64,

    #[arg(long, default_value_t = 4)]
    pub data_steps: usize,
}

impl Cli {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            thread_count: self.thread_count,
            request_count: self.request_count,
            request_timeout: self.timeout,
            send_body: self.send_body,
        }
    }

    pub fn user_load_config(&self) -> UserLoadConfig {
        UserLoadConfig {
            start_users: self.user.start_users,
            max_users: self.user.max_users,
            step_users: self.user.step_users,
            duration_per_step: self.user.step_duration,
            overflow_policy: self.user.overflow_policy,
            collect_during_step: self.user.collect_during_step,
            ..Default::default()
        }
    }

    pub fn data_load_config(&self) -> DataLoadConfig {
        DataLoadConfig {
            initial_data_size: self.data.initial_data,
            max_data_size: self.data.max_data,
            data_size_multiplier: self.data.data_multiplier,
            steps_count: self.data.data_steps,
            ..Default::default()
        }
    }
}
