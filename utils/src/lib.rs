//! Shared utilities for the liquid-democracy workspace.

pub mod logging;

pub use logging::{init_logging, LogFormat};
