//! Nullable infrastructure for deterministic testing.
//!
//! External collaborators of the governance core (currently just the stake
//! oracle) are abstracted behind traits. This crate provides test-friendly
//! implementations that return deterministic values, can be controlled
//! programmatically, and never touch the filesystem or network.

pub mod oracle;

pub use oracle::NullStakeOracle;
