use perfgate_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerfError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Load generating task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
