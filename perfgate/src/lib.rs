#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod runner;
pub mod transport;

mod buffer;
mod controllers;
mod error;
mod timer;
mod transaction;

pub use error::PerfError;
pub use perfgate_core as core;
pub use runner::Runner;
pub use transport::{ClientProfile, Connector, HttpConnector, HttpTransport, Transport};

pub mod prelude {
    pub use crate::runner::Runner;
    pub use crate::transport::{ClientProfile, Connector, HttpConnector, Transport};
    pub use crate::PerfError;

    pub use perfgate_core::{
        DataLoadConfig, DegradationDetector, DegradationOutcome, LoadTestResult, LoadTestStats,
        OverflowPolicy, RequestResult, RunConfig, Statistics, StepLoad, Task, UserLoadConfig,
    };
}
