use liquid_types::{Address, Checkpoint, ProposalId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("cannot delegate to self")]
    SelfDelegation,

    #[error("delegating {from} to {to} would create a cycle")]
    CycleDetected { from: Address, to: Address },

    #[error("{0} is not delegating")]
    NotDelegating(Address),

    #[error("proposal {0} not found")]
    UnknownProposal(ProposalId),

    #[error("proposal {0} is already being tallied")]
    ProposalExists(ProposalId),

    #[error("proposal {0} is closed")]
    AlreadyClosed(ProposalId),

    #[error("stake for {who} recorded at {at}, which precedes latest checkpoint {latest}")]
    StaleCheckpoint {
        who: Address,
        at: Checkpoint,
        latest: Checkpoint,
    },

    #[error("checkpoint {at} is already read by proposal {proposal}")]
    SealedCheckpoint { at: Checkpoint, proposal: ProposalId },

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
