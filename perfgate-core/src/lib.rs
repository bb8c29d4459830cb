#![doc = include_str!("../README.md")]
mod config;
mod constants;
mod data;
mod degradation;
mod error;
mod load_stats;
mod stats;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use degradation::*;
pub use error::*;
pub use load_stats::*;
pub use stats::*;
