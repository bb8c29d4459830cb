use thiserror::Error;

/// Invalid run parameters. Reported before any request is issued.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No tasks to run")]
    NoTasks,

    #[error("Thread count must be at least 1")]
    ZeroThreads,

    #[error("Request count must be at least 1")]
    ZeroRequests,

    #[error("Start users must be at least 1")]
    ZeroStartUsers,

    #[error("Step users must be at least 1")]
    ZeroStepUsers,

    #[error("Start users ({start}) exceeds max users ({max})")]
    UserRange { start: usize, max: usize },

    #[error("Think-time range is empty: {min:?}..{max:?}")]
    ThinkTime {
        min: std::time::Duration,
        max: std::time::Duration,
    },

    #[error("Monitor interval must be non-zero")]
    ZeroMonitorInterval,

    #[error("Buffer capacity must be at least 1")]
    ZeroBufferCapacity,

    #[error("Initial data size must be at least 1")]
    ZeroDataSize,

    #[error("Data size multiplier must be a finite number above zero, got {0}")]
    Multiplier(f64),

    #[error("Degradation threshold must be a finite, non-negative percentage, got {0}")]
    Threshold(f64),

    #[error("Unknown overflow policy `{0}` (expected drop-newest, drop-oldest or block)")]
    OverflowPolicy(String),
}

/// Failure of a single request. Recorded on the result; never aborts a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
