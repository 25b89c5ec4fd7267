//! Checkpointed stake history.
//!
//! Each participant's balance is stored as an append-only list of
//! `(checkpoint, balance)` entries. Reading at a checkpoint returns the most
//! recent entry at or before it, so a proposal opened at checkpoint `k` sees the
//! same weights no matter how stakes move afterwards.

use crate::error::GovernanceError;
use liquid_types::{Address, Checkpoint, StakeOracle, Weight};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory [`StakeOracle`] backed by per-participant balance histories.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StakeHistory {
    entries: HashMap<Address, Vec<(Checkpoint, Weight)>>,
}

impl StakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `who`'s balance as of `at`.
    ///
    /// Recording at the participant's latest checkpoint overwrites that entry;
    /// recording before it fails with [`GovernanceError::StaleCheckpoint`].
    pub fn record(
        &mut self,
        who: &Address,
        at: Checkpoint,
        balance: Weight,
    ) -> Result<(), GovernanceError> {
        let history = self.entries.entry(who.clone()).or_default();
        if let Some(&(latest, _)) = history.last() {
            if at < latest {
                return Err(GovernanceError::StaleCheckpoint {
                    who: who.clone(),
                    at,
                    latest,
                });
            }
            if at == latest {
                if let Some(entry) = history.last_mut() {
                    entry.1 = balance;
                }
                return Ok(());
            }
        }
        history.push((at, balance));
        Ok(())
    }

    /// Most recent recorded balance for `who` (0 if never recorded).
    pub fn latest(&self, who: &Address) -> Weight {
        self.entries
            .get(who)
            .and_then(|h| h.last())
            .map(|(_, balance)| *balance)
            .unwrap_or(0)
    }

    /// Participants with at least one recorded entry.
    pub fn participants(&self) -> impl Iterator<Item = &Address> {
        self.entries.keys()
    }

    /// Sum of all balances as of `at`.
    pub fn total_at(&self, at: Checkpoint) -> Weight {
        self.entries
            .keys()
            .fold(0, |acc: Weight, who| acc.saturating_add(self.balance_at(who, at)))
    }
}

impl StakeOracle for StakeHistory {
    fn balance_at(&self, participant: &Address, checkpoint: Checkpoint) -> Weight {
        let Some(history) = self.entries.get(participant) else {
            return 0;
        };
        // Entries are sorted by checkpoint; find the last one not after `checkpoint`.
        let idx = history.partition_point(|(at, _)| *at <= checkpoint);
        if idx == 0 {
            0
        } else {
            history[idx - 1].1
        }
    }
}
