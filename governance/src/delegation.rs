//! Delegation graph: whole-weight delegation to a single representative.
//!
//! Supports:
//! - **Transitive delegation** (A→B→C means A's weight reaches C)
//! - **Cycle prevention** at insertion time via an upward chain walk
//! - **Cumulative weights** kept current for every ancestor on each mutation
//!
//! The graph is a forest of in-trees: every participant has at most one
//! outgoing edge and following edges always ends at a participant with none
//! (the chain's final delegate). Each node also keeps the set of its direct
//! delegators so subtrees can be walked downward without scanning the graph.

use crate::error::GovernanceError;
use liquid_types::{Address, Weight};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One participant's record in the graph arena.
#[derive(Clone, Debug, Default)]
struct DelegateNode {
    /// Current own stake.
    own_weight: Weight,
    /// Own stake plus the total weight of every direct delegator.
    total_weight: Weight,
    /// Outgoing edge, if delegating.
    delegate: Option<Address>,
    /// Reverse index: participants whose delegate is this node.
    delegators: HashSet<Address>,
}

#[derive(Clone, Copy)]
enum Adjust {
    Add,
    Sub,
}

/// Manages the delegate-of relation and the cumulative weight flowing into each participant.
#[derive(Clone, Debug, Default)]
pub struct DelegationGraph {
    nodes: HashMap<Address, DelegateNode>,
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a participant's current own stake.
    ///
    /// The difference is applied to the participant's cumulative weight and to
    /// every ancestor up to its final delegate. Returns the previous own weight.
    pub fn set_own_weight(&mut self, who: &Address, weight: Weight) -> Weight {
        let node = self.node_mut(who);
        let previous = node.own_weight;
        node.own_weight = weight;
        if weight > previous {
            self.adjust_chain(who, weight - previous, Adjust::Add);
        } else if weight < previous {
            self.adjust_chain(who, previous - weight, Adjust::Sub);
        }
        tracing::debug!(%who, previous, weight, "own weight updated");
        previous
    }

    /// Set or replace `from`'s delegate.
    ///
    /// Fails with [`GovernanceError::CycleDetected`] if `from` is reachable from
    /// `to`; the graph is untouched in that case. On success the whole subtree
    /// rooted at `from` moves from its old chain (if any) into `to`'s chain.
    pub fn delegate(&mut self, from: &Address, to: &Address) -> Result<(), GovernanceError> {
        if from == to {
            return Err(GovernanceError::SelfDelegation);
        }
        if self.delegate_of(from) == Some(to) {
            tracing::debug!(%from, %to, "delegation unchanged");
            return Ok(());
        }
        if self.reaches(to, from) {
            tracing::warn!(%from, %to, "rejected delegation: cycle");
            return Err(GovernanceError::CycleDetected {
                from: from.clone(),
                to: to.clone(),
            });
        }

        let moved = self.total_weight(from);
        let previous = self.detach(from);
        self.node_mut(to).delegators.insert(from.clone());
        self.node_mut(from).delegate = Some(to.clone());
        self.adjust_chain(to, moved, Adjust::Add);

        tracing::debug!(
            %from,
            %to,
            previous = ?previous.as_ref().map(Address::as_str),
            weight = moved,
            "delegated"
        );
        Ok(())
    }

    /// Remove `who`'s outgoing edge, returning the former delegate.
    ///
    /// Fails with [`GovernanceError::NotDelegating`] if `who` has no delegate.
    pub fn undelegate(&mut self, who: &Address) -> Result<Address, GovernanceError> {
        match self.detach(who) {
            Some(previous) => {
                tracing::debug!(%who, %previous, "undelegated");
                Ok(previous)
            }
            None => Err(GovernanceError::NotDelegating(who.clone())),
        }
    }

    /// Cut `who` loose from its chain, removing its subtree's weight from every former ancestor.
    fn detach(&mut self, who: &Address) -> Option<Address> {
        let moved = self.total_weight(who);
        let previous = self.nodes.get_mut(who)?.delegate.take()?;
        if let Some(node) = self.nodes.get_mut(&previous) {
            node.delegators.remove(who);
        }
        self.adjust_chain(&previous, moved, Adjust::Sub);
        Some(previous)
    }

    /// Apply `amount` to the cumulative weight of `start` and every ancestor.
    fn adjust_chain(&mut self, start: &Address, amount: Weight, adjust: Adjust) {
        if amount == 0 {
            return;
        }
        let mut current = Some(start.clone());
        while let Some(addr) = current {
            let Some(node) = self.nodes.get_mut(&addr) else {
                break;
            };
            node.total_weight = match adjust {
                Adjust::Add => node.total_weight.saturating_add(amount),
                Adjust::Sub => node.total_weight.saturating_sub(amount),
            };
            current = node.delegate.clone();
        }
    }

    /// Whether `target` lies on the chain starting at `start` (inclusive).
    fn reaches(&self, start: &Address, target: &Address) -> bool {
        let mut current = Some(start);
        while let Some(addr) = current {
            if addr == target {
                return true;
            }
            current = self.delegate_of(addr);
        }
        false
    }

    fn node_mut(&mut self, who: &Address) -> &mut DelegateNode {
        self.nodes.entry(who.clone()).or_default()
    }

    /// Current own stake (0 for unknown participants).
    pub fn own_weight(&self, who: &Address) -> Weight {
        self.nodes.get(who).map(|n| n.own_weight).unwrap_or(0)
    }

    /// Own stake plus everything delegated into `who`, transitively.
    pub fn total_weight(&self, who: &Address) -> Weight {
        self.nodes.get(who).map(|n| n.total_weight).unwrap_or(0)
    }

    /// Weight flowing into `who` from its delegators (total minus own).
    pub fn delegated_balance(&self, who: &Address) -> Weight {
        self.nodes
            .get(who)
            .map(|n| n.total_weight.saturating_sub(n.own_weight))
            .unwrap_or(0)
    }

    /// Voting power: the cumulative weight if `who` is a final delegate, else 0.
    pub fn power(&self, who: &Address) -> Weight {
        match self.nodes.get(who) {
            Some(node) if node.delegate.is_none() => node.total_weight,
            _ => 0,
        }
    }

    /// The direct delegate of `who` (None if not delegating).
    pub fn delegate_of(&self, who: &Address) -> Option<&Address> {
        self.nodes.get(who).and_then(|n| n.delegate.as_ref())
    }

    pub fn is_delegating(&self, who: &Address) -> bool {
        self.delegate_of(who).is_some()
    }

    /// Participants that delegate directly to `who`.
    pub fn delegators(&self, who: &Address) -> impl Iterator<Item = &Address> {
        self.nodes.get(who).into_iter().flat_map(|n| n.delegators.iter())
    }

    /// Ancestors of `who`, nearest first, ending at its final delegate.
    pub fn chain(&self, who: &Address) -> Vec<Address> {
        let mut chain = Vec::new();
        let mut current = self.delegate_of(who);
        while let Some(addr) = current {
            chain.push(addr.clone());
            current = self.delegate_of(addr);
        }
        chain
    }

    /// The end of `who`'s chain (`who` itself if not delegating).
    pub fn final_delegate(&self, who: &Address) -> Address {
        self.chain(who).pop().unwrap_or_else(|| who.clone())
    }

    /// Every participant the graph knows about.
    pub fn participants(&self) -> impl Iterator<Item = &Address> {
        self.nodes.keys()
    }

    /// Participants with no outgoing edge.
    pub fn roots(&self) -> impl Iterator<Item = &Address> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.delegate.is_none())
            .map(|(addr, _)| addr)
    }

    pub fn participant_count(&self) -> usize {
        self.nodes.len()
    }

    /// Sum of every participant's own stake.
    pub fn total_own_weight(&self) -> Weight {
        self.nodes
            .values()
            .fold(0, |acc: Weight, n| acc.saturating_add(n.own_weight))
    }

    /// Recompute every cumulative weight from own weights and edges alone.
    pub fn recompute_total_weights(&self) -> HashMap<Address, Weight> {
        let mut totals: HashMap<Address, Weight> =
            self.nodes.keys().map(|addr| (addr.clone(), 0)).collect();
        for (addr, node) in &self.nodes {
            let mut current = Some(addr);
            while let Some(a) = current {
                if let Some(total) = totals.get_mut(a) {
                    *total = total.saturating_add(node.own_weight);
                }
                current = self.delegate_of(a);
            }
        }
        totals
    }
}

/// Serializable snapshot of the delegation graph.
///
/// Only edges and own weights are stored; the reverse index and cumulative
/// weights are derived on load.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DelegationSnapshot {
    pub delegations: HashMap<Address, Address>,
    pub own_weights: HashMap<Address, Weight>,
}

impl DelegationGraph {
    pub fn snapshot(&self) -> DelegationSnapshot {
        let mut snapshot = DelegationSnapshot::default();
        for (addr, node) in &self.nodes {
            if let Some(to) = &node.delegate {
                snapshot.delegations.insert(addr.clone(), to.clone());
            }
            if node.own_weight > 0 {
                snapshot.own_weights.insert(addr.clone(), node.own_weight);
            }
        }
        snapshot
    }

    /// Rebuild a graph from a snapshot, rejecting self-loops and cycles.
    pub fn from_snapshot(snapshot: DelegationSnapshot) -> Result<Self, GovernanceError> {
        let mut graph = Self::new();
        for (addr, weight) in snapshot.own_weights {
            graph.node_mut(&addr).own_weight = weight;
        }
        for (from, to) in snapshot.delegations {
            if from == to {
                return Err(GovernanceError::Snapshot(format!("{from} delegates to itself")));
            }
            graph.node_mut(&to).delegators.insert(from.clone());
            graph.node_mut(&from).delegate = Some(to);
        }

        let limit = graph.nodes.len();
        for addr in graph.nodes.keys() {
            let mut steps = 0;
            let mut current = graph.delegate_of(addr);
            while let Some(next) = current {
                steps += 1;
                if steps > limit {
                    return Err(GovernanceError::Snapshot(format!(
                        "delegation cycle through {addr}"
                    )));
                }
                current = graph.delegate_of(next);
            }
        }

        for (addr, total) in graph.recompute_total_weights() {
            graph.node_mut(&addr).total_weight = total;
        }
        Ok(graph)
    }

    /// Serialize the graph to bytes for persistence.
    pub fn save_state(&self) -> Result<Vec<u8>, GovernanceError> {
        bincode::serialize(&self.snapshot()).map_err(|e| GovernanceError::Snapshot(e.to_string()))
    }

    /// Restore a graph from bytes produced by [`DelegationGraph::save_state`].
    pub fn load_state(data: &[u8]) -> Result<Self, GovernanceError> {
        let snapshot: DelegationSnapshot =
            bincode::deserialize(data).map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(name: &str) -> Address {
        Address::new(name)
    }

    /// A=100, B=200, C=300, D=400, E=1000, F=1000.
    fn staked_graph() -> DelegationGraph {
        let mut graph = DelegationGraph::new();
        for (name, stake) in [
            ("a", 100),
            ("b", 200),
            ("c", 300),
            ("d", 400),
            ("e", 1000),
            ("f", 1000),
        ] {
            graph.set_own_weight(&addr(name), stake);
        }
        graph
    }

    fn assert_consistent(graph: &DelegationGraph) {
        for (who, total) in graph.recompute_total_weights() {
            assert_eq!(graph.total_weight(&who), total, "total weight of {who}");
        }
    }

    #[test]
    fn initial_state_power_equals_stake() {
        let graph = staked_graph();
        for (name, stake) in [("a", 100), ("b", 200), ("f", 1000)] {
            assert_eq!(graph.power(&addr(name)), stake);
            assert_eq!(graph.total_weight(&addr(name)), stake);
            assert_eq!(graph.delegated_balance(&addr(name)), 0);
        }
    }

    #[test]
    fn delegates() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();

        assert_eq!(graph.delegated_balance(&addr("a")), 0);
        assert_eq!(graph.delegated_balance(&addr("b")), 100);
        assert_eq!(graph.total_weight(&addr("a")), 100);
        assert_eq!(graph.total_weight(&addr("b")), 300);
        assert_eq!(graph.power(&addr("a")), 0);
        assert_eq!(graph.power(&addr("b")), 300);
    }

    #[test]
    fn delegates_multi_chain_in_any_order() {
        let mut graph = staked_graph();
        graph.delegate(&addr("b"), &addr("c")).unwrap();
        graph.delegate(&addr("a"), &addr("b")).unwrap();

        assert_eq!(graph.power(&addr("c")), 600);
        assert_eq!(graph.total_weight(&addr("a")), 100);
        assert_eq!(graph.total_weight(&addr("b")), 300);
        assert_eq!(graph.total_weight(&addr("c")), 600);
        assert_eq!(graph.final_delegate(&addr("a")), addr("c"));
        assert_eq!(graph.chain(&addr("a")), vec![addr("b"), addr("c")]);
    }

    #[test]
    fn undelegate_restores_power() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        assert_eq!(graph.undelegate(&addr("a")).unwrap(), addr("b"));

        assert_eq!(graph.power(&addr("a")), 100);
        assert_eq!(graph.power(&addr("b")), 200);
        assert_eq!(graph.delegators(&addr("b")).count(), 0);
    }

    #[test]
    fn undelegate_multi_chain() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("b"), &addr("c")).unwrap();
        graph.undelegate(&addr("a")).unwrap();

        assert_eq!(graph.power(&addr("a")), 100);
        assert_eq!(graph.power(&addr("c")), 500);
        assert_consistent(&graph);
    }

    #[test]
    fn long_chain_with_undelegations() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.undelegate(&addr("a")).unwrap();
        for (from, to) in [("b", "c"), ("c", "d"), ("d", "e"), ("e", "f")] {
            graph.delegate(&addr(from), &addr(to)).unwrap();
        }
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.undelegate(&addr("a")).unwrap();

        assert_eq!(graph.power(&addr("f")), 3000 - 100);
        assert_consistent(&graph);
    }

    #[test]
    fn undelegate_without_delegate_fails() {
        let mut graph = staked_graph();
        let err = graph.undelegate(&addr("a")).unwrap_err();
        assert!(matches!(err, GovernanceError::NotDelegating(who) if who == addr("a")));
        assert_eq!(graph.power(&addr("a")), 100);
    }

    #[test]
    fn self_delegation_rejected() {
        let mut graph = staked_graph();
        assert!(matches!(
            graph.delegate(&addr("a"), &addr("a")),
            Err(GovernanceError::SelfDelegation)
        ));
        assert!(!graph.is_delegating(&addr("a")));
    }

    #[test]
    fn detects_chain_cycles_and_leaves_graph_unchanged() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("b"), &addr("c")).unwrap();
        graph.delegate(&addr("d"), &addr("a")).unwrap();

        let err = graph.delegate(&addr("c"), &addr("d")).unwrap_err();
        assert!(matches!(err, GovernanceError::CycleDetected { .. }));

        assert_eq!(graph.delegate_of(&addr("c")), None);
        assert_eq!(graph.delegate_of(&addr("d")), Some(&addr("a")));
        assert_eq!(graph.delegate_of(&addr("b")), Some(&addr("c")));
        assert_eq!(graph.delegate_of(&addr("a")), Some(&addr("b")));
        assert_eq!(graph.power(&addr("c")), 1000);
        assert_consistent(&graph);
    }

    #[test]
    fn redelegation_moves_whole_subtree() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("b"), &addr("c")).unwrap();
        graph.delegate(&addr("c"), &addr("d")).unwrap();

        // B (carrying A) leaves C for E.
        graph.delegate(&addr("b"), &addr("e")).unwrap();

        assert_eq!(graph.total_weight(&addr("c")), 300);
        assert_eq!(graph.power(&addr("d")), 700);
        assert_eq!(graph.power(&addr("e")), 1300);
        assert_eq!(graph.delegators(&addr("c")).count(), 0);
        assert_consistent(&graph);
    }

    #[test]
    fn redelegating_to_same_delegate_is_noop() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        assert_eq!(graph.power(&addr("b")), 300);
        assert_eq!(graph.delegators(&addr("b")).count(), 1);
    }

    #[test]
    fn stake_change_propagates_to_every_ancestor() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("b"), &addr("c")).unwrap();

        assert_eq!(graph.set_own_weight(&addr("a"), 150), 100);
        assert_eq!(graph.total_weight(&addr("b")), 350);
        assert_eq!(graph.power(&addr("c")), 650);

        graph.set_own_weight(&addr("a"), 0);
        assert_eq!(graph.power(&addr("c")), 500);
        assert_consistent(&graph);
    }

    #[test]
    fn unknown_participants_have_zero_weight() {
        let mut graph = DelegationGraph::new();
        assert_eq!(graph.power(&addr("ghost")), 0);
        graph.delegate(&addr("x"), &addr("y")).unwrap();
        assert_eq!(graph.participant_count(), 2);
        assert_eq!(graph.power(&addr("y")), 0);
    }

    #[test]
    fn roots_are_final_delegates() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("c"), &addr("b")).unwrap();
        let mut roots: Vec<_> = graph.roots().cloned().collect();
        roots.sort();
        assert_eq!(roots, vec![addr("b"), addr("d"), addr("e"), addr("f")]);
        let power_sum: Weight = graph.roots().map(|r| graph.power(r)).sum();
        assert_eq!(power_sum, graph.total_own_weight());
    }

    #[test]
    fn snapshot_restores_weights_and_edges() {
        let mut graph = staked_graph();
        graph.delegate(&addr("a"), &addr("b")).unwrap();
        graph.delegate(&addr("b"), &addr("c")).unwrap();
        graph.delegate(&addr("e"), &addr("f")).unwrap();

        let bytes = graph.save_state().unwrap();
        let restored = DelegationGraph::load_state(&bytes).unwrap();

        for name in ["a", "b", "c", "d", "e", "f"] {
            let who = addr(name);
            assert_eq!(restored.total_weight(&who), graph.total_weight(&who));
            assert_eq!(restored.delegate_of(&who), graph.delegate_of(&who));
        }
        assert_eq!(restored.delegators(&addr("c")).count(), 1);
    }

    #[test]
    fn snapshot_with_cycle_is_rejected() {
        let mut snapshot = DelegationSnapshot::default();
        snapshot.delegations.insert(addr("a"), addr("b"));
        snapshot.delegations.insert(addr("b"), addr("a"));
        assert!(matches!(
            DelegationGraph::from_snapshot(snapshot),
            Err(GovernanceError::Snapshot(_))
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        assert!(DelegationGraph::load_state(&[0xff, 0x01]).is_err());
    }
}
