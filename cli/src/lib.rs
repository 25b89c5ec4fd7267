//! Scenario replay for the `liquid` binary.

pub mod config;
pub mod scenario;

pub use config::{CliConfig, ConfigError, OutputFormat};
pub use scenario::{Report, Scenario, Step};
