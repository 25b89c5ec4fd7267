//! Liquid-democracy governance.
//!
//! Participants hold a stake and may delegate all of it to exactly one other
//! participant. Delegated weight flows transitively up the chain to its final
//! delegate unless someone closer casts a direct vote, which overrules the
//! more distant delegate for that part of the chain.
//!
//! - [`DelegationGraph`]: single-parent delegation forest with cycle rejection
//!   and cumulative weights.
//! - [`TallyEngine`]: per-proposal direct votes and overrule redistribution.
//! - [`StakeHistory`]: checkpointed balances implementing [`liquid_types::StakeOracle`].
//! - [`LiquidDemocracy`]: the three tied together behind one `&mut self` API.

pub mod delegation;
pub mod engine;
pub mod error;
pub mod stake;
pub mod tally;

pub use delegation::{DelegationGraph, DelegationSnapshot};
pub use engine::LiquidDemocracy;
pub use error::GovernanceError;
pub use stake::StakeHistory;
pub use tally::{Overrule, Tally, TallyEngine, VoteChoice, VoteReceipt, VoteRecord};
