//! Stake oracle interface.

use crate::{Address, Checkpoint, Weight};

/// Source of checkpointed stake balances.
///
/// The tally engine reads every participant's own weight through this trait at
/// the checkpoint a proposal was opened with. Implementations must return the
/// same value for the same `(participant, checkpoint)` pair for as long as any
/// proposal at that checkpoint is being tallied.
pub trait StakeOracle {
    /// Own (undelegated) stake of `participant` at `checkpoint`.
    fn balance_at(&self, participant: &Address, checkpoint: Checkpoint) -> Weight;
}

impl<T: StakeOracle + ?Sized> StakeOracle for &T {
    fn balance_at(&self, participant: &Address, checkpoint: Checkpoint) -> Weight {
        (**self).balance_at(participant, checkpoint)
    }
}

impl<T: StakeOracle + ?Sized> StakeOracle for Box<T> {
    fn balance_at(&self, participant: &Address, checkpoint: Checkpoint) -> Weight {
        (**self).balance_at(participant, checkpoint)
    }
}
