//! Fundamental types for liquid-democracy voting.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! participant addresses, proposal identifiers, stake checkpoints, weights, and the
//! stake oracle interface the tally engine reads checkpointed balances through.

pub mod address;
pub mod checkpoint;
pub mod error;
pub mod oracle;
pub mod proposal;

pub use address::Address;
pub use checkpoint::Checkpoint;
pub use error::TypesError;
pub use oracle::StakeOracle;
pub use proposal::ProposalId;

/// Voting weight (stake), in raw units.
pub type Weight = u128;
