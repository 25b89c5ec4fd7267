//! Stake checkpoints.
//!
//! A checkpoint names the point in history at which stake balances are read for
//! a proposal (typically the block height at which the proposal was created).
//! Weights read at a fixed checkpoint never change, which is what keeps a
//! proposal's tally stable while stakes move on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in stake history, totally ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Checkpoint(u64);

impl Checkpoint {
    /// The first checkpoint.
    pub const GENESIS: Self = Self(0);

    pub const fn new(height: u64) -> Self {
        Self(height)
    }

    pub fn height(&self) -> u64 {
        self.0
    }

    /// The checkpoint immediately after this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
