//! Liquid-democracy engine: one delegation graph shared by every proposal.

use crate::delegation::DelegationGraph;
use crate::error::GovernanceError;
use crate::tally::{Tally, TallyEngine, VoteChoice, VoteReceipt, VoteRecord};
use liquid_types::{Address, Checkpoint, ProposalId, StakeOracle, Weight};

/// Owns the delegation graph, per-proposal tallies and the stake oracle.
///
/// Every mutation takes `&mut self`, so delegation changes and votes are
/// applied one at a time. Share it across threads behind a `Mutex` or `RwLock`.
pub struct LiquidDemocracy<O> {
    graph: DelegationGraph,
    tallies: TallyEngine,
    oracle: O,
}

impl<O: StakeOracle> LiquidDemocracy<O> {
    pub fn new(oracle: O) -> Self {
        Self::from_parts(DelegationGraph::new(), TallyEngine::new(), oracle)
    }

    /// Reassemble an engine, e.g. from restored snapshots.
    pub fn from_parts(graph: DelegationGraph, tallies: TallyEngine, oracle: O) -> Self {
        Self {
            graph,
            tallies,
            oracle,
        }
    }

    /// Set `from`'s delegate. See [`DelegationGraph::delegate`].
    pub fn delegate(&mut self, from: &Address, to: &Address) -> Result<(), GovernanceError> {
        self.graph.delegate(from, to)
    }

    /// Remove `who`'s delegate. See [`DelegationGraph::undelegate`].
    pub fn undelegate(&mut self, who: &Address) -> Result<Address, GovernanceError> {
        self.graph.undelegate(who)
    }

    /// Load `who`'s balance at `at` from the oracle into the graph's current weights.
    ///
    /// Returns the new own weight.
    pub fn sync_stake(&mut self, who: &Address, at: Checkpoint) -> Weight {
        let weight = self.oracle.balance_at(who, at);
        self.graph.set_own_weight(who, weight);
        weight
    }

    pub fn open_proposal(
        &mut self,
        id: ProposalId,
        checkpoint: Checkpoint,
    ) -> Result<(), GovernanceError> {
        self.tallies.open_proposal(id, checkpoint)
    }

    pub fn close_proposal(&mut self, id: ProposalId) -> Result<Tally, GovernanceError> {
        self.tallies.close_proposal(id)
    }

    /// Cast (or change) `voter`'s direct vote on `id`.
    pub fn cast_vote(
        &mut self,
        id: ProposalId,
        voter: &Address,
        choice: VoteChoice,
    ) -> Result<VoteReceipt, GovernanceError> {
        self.tallies
            .cast_vote(&self.graph, &self.oracle, id, voter, choice)
    }

    pub fn tally(&self, id: ProposalId) -> Result<Tally, GovernanceError> {
        self.tallies.tally(id)
    }

    /// Recompute `id`'s tally from scratch against the current graph.
    pub fn recount(&self, id: ProposalId) -> Result<Tally, GovernanceError> {
        self.tallies.recount(&self.graph, &self.oracle, id)
    }

    pub fn unclaimed_weight(&self, id: ProposalId) -> Result<Weight, GovernanceError> {
        self.tallies.unclaimed_weight(&self.graph, &self.oracle, id)
    }

    pub fn vote_of(&self, id: ProposalId, voter: &Address) -> Option<VoteRecord> {
        self.tallies.vote_of(id, voter)
    }

    pub fn power(&self, who: &Address) -> Weight {
        self.graph.power(who)
    }

    pub fn total_weight(&self, who: &Address) -> Weight {
        self.graph.total_weight(who)
    }

    pub fn delegated_balance(&self, who: &Address) -> Weight {
        self.graph.delegated_balance(who)
    }

    pub fn graph(&self) -> &DelegationGraph {
        &self.graph
    }

    pub fn tallies(&self) -> &TallyEngine {
        &self.tallies
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable access to the oracle, for oracles that are also stake ledgers.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn into_parts(self) -> (DelegationGraph, TallyEngine, O) {
        (self.graph, self.tallies, self.oracle)
    }
}
