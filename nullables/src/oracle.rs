//! Nullable stake oracle: fixed balances for testing.

use liquid_types::{Address, Checkpoint, StakeOracle, Weight};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A stake oracle that ignores checkpoints and returns whatever was last set.
///
/// Thread-safe, and counts every balance lookup so tests can assert how much
/// work a tally operation did.
pub struct NullStakeOracle {
    balances: Mutex<HashMap<Address, Weight>>,
    queries: AtomicU64,
}

impl NullStakeOracle {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            queries: AtomicU64::new(0),
        }
    }

    /// Create with an initial set of balances.
    pub fn with_stakes<'a>(stakes: impl IntoIterator<Item = (&'a str, Weight)>) -> Self {
        let oracle = Self::new();
        for (name, weight) in stakes {
            oracle.set_stake(&Address::new(name), weight);
        }
        oracle
    }

    /// Set (or replace) a participant's balance.
    pub fn set_stake(&self, who: &Address, weight: Weight) {
        self.balances.lock().unwrap().insert(who.clone(), weight);
    }

    /// Sum of every configured balance.
    pub fn total_stake(&self) -> Weight {
        self.balances.lock().unwrap().values().sum()
    }

    /// Number of `balance_at` calls served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn reset_query_count(&self) {
        self.queries.store(0, Ordering::Relaxed);
    }
}

impl Default for NullStakeOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl StakeOracle for NullStakeOracle {
    fn balance_at(&self, participant: &Address, _checkpoint: Checkpoint) -> Weight {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.balances
            .lock()
            .unwrap()
            .get(participant)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_configured_balance_at_any_checkpoint() {
        let oracle = NullStakeOracle::with_stakes([("a", 100), ("b", 200)]);
        let a = Address::new("a");
        assert_eq!(oracle.balance_at(&a, Checkpoint::GENESIS), 100);
        assert_eq!(oracle.balance_at(&a, Checkpoint::new(1_000)), 100);
        assert_eq!(oracle.balance_at(&Address::new("ghost"), Checkpoint::GENESIS), 0);
        assert_eq!(oracle.total_stake(), 300);
    }

    #[test]
    fn counts_queries() {
        let oracle = NullStakeOracle::with_stakes([("a", 1)]);
        let a = Address::new("a");
        oracle.balance_at(&a, Checkpoint::GENESIS);
        oracle.balance_at(&a, Checkpoint::GENESIS);
        assert_eq!(oracle.query_count(), 2);
        oracle.reset_query_count();
        assert_eq!(oracle.query_count(), 0);
    }
}
