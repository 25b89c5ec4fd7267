use proptest::prelude::*;

use liquid_governance::{DelegationGraph, GovernanceError, TallyEngine, VoteChoice};
use liquid_nullables::NullStakeOracle;
use liquid_types::{Address, Checkpoint, ProposalId, Weight};

const PROPOSAL: ProposalId = ProposalId::new(1);

fn addr(i: usize) -> Address {
    Address::new(format!("p{i}"))
}

/// One delegation mutation: `Some(to)` delegates, `None` undelegates.
fn delegation_ops(n: usize) -> impl Strategy<Value = Vec<(usize, Option<usize>)>> {
    prop::collection::vec((0..n, prop::option::of(0..n)), 0..40)
}

fn graph_with_stakes(stakes: &[Weight]) -> DelegationGraph {
    let mut graph = DelegationGraph::new();
    for (i, stake) in stakes.iter().enumerate() {
        graph.set_own_weight(&addr(i), *stake);
    }
    graph
}

fn apply(graph: &mut DelegationGraph, from: usize, to: Option<usize>) -> Result<(), GovernanceError> {
    match to {
        Some(to) => graph.delegate(&addr(from), &addr(to)),
        None => graph.undelegate(&addr(from)).map(|_| ()),
    }
}

/// Bounded walk: the chain from `who` must end within `n` steps.
fn chain_terminates(graph: &DelegationGraph, who: &Address, n: usize) -> bool {
    let mut current = graph.delegate_of(who);
    for _ in 0..n {
        match current {
            Some(next) => current = graph.delegate_of(next),
            None => return true,
        }
    }
    false
}

fn edges(graph: &DelegationGraph, n: usize) -> Vec<Option<Address>> {
    (0..n).map(|i| graph.delegate_of(&addr(i)).cloned()).collect()
}

fn oracle_for(stakes: &[Weight]) -> NullStakeOracle {
    let oracle = NullStakeOracle::new();
    for (i, stake) in stakes.iter().enumerate() {
        oracle.set_stake(&addr(i), *stake);
    }
    oracle
}

fn forest_and_stakes() -> impl Strategy<Value = (Vec<Weight>, Vec<(usize, Option<usize>)>)> {
    (2usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec(0u128..1_000, n),
            delegation_ops(n),
        )
    })
}

proptest! {
    /// Every reachable graph is a forest, and every cumulative weight matches a full recomputation.
    #[test]
    fn delegation_keeps_forest_and_weights((stakes, ops) in forest_and_stakes()) {
        let n = stakes.len();
        let mut graph = graph_with_stakes(&stakes);
        let total: Weight = stakes.iter().sum();

        for (from, to) in ops {
            let before = edges(&graph, n);
            let result = apply(&mut graph, from, to);
            if result.is_err() {
                prop_assert_eq!(edges(&graph, n), before, "failed mutation changed edges");
            }

            for i in 0..n {
                prop_assert!(chain_terminates(&graph, &addr(i), n), "chain from p{} does not end", i);
            }
            for (who, expected) in graph.recompute_total_weights() {
                prop_assert_eq!(graph.total_weight(&who), expected);
            }
            let power: Weight = graph.roots().map(|r| graph.power(r)).sum();
            prop_assert_eq!(power, total, "power not conserved");
        }
    }

    /// A cycle is rejected exactly when `from` already lies on `to`'s chain.
    #[test]
    fn cycle_rejected_iff_from_reaches_to((stakes, ops) in forest_and_stakes(), from in 0usize..12, to in 0usize..12) {
        let n = stakes.len();
        let (from, to) = (from % n, to % n);
        let mut graph = graph_with_stakes(&stakes);
        for (f, t) in ops {
            let _ = apply(&mut graph, f, t);
        }

        let on_chain = from == to
            || graph.chain(&addr(to)).contains(&addr(from));
        let result = graph.delegate(&addr(from), &addr(to));
        prop_assert_eq!(result.is_err(), on_chain);
    }

    /// The incremental tally always equals a recount, and yea + nay + unclaimed equals total stake.
    #[test]
    fn tally_matches_recount_and_conserves_weight(
        (stakes, ops) in forest_and_stakes(),
        votes in prop::collection::vec((0usize..12, any::<bool>()), 1..30),
    ) {
        let n = stakes.len();
        let mut graph = graph_with_stakes(&stakes);
        for (f, t) in ops {
            let _ = apply(&mut graph, f, t);
        }
        let oracle = oracle_for(&stakes);
        let total: Weight = stakes.iter().sum();

        let mut engine = TallyEngine::new();
        engine.open_proposal(PROPOSAL, Checkpoint::GENESIS).unwrap();

        for (voter, yea) in votes {
            let choice = if yea { VoteChoice::Yea } else { VoteChoice::Nay };
            engine.cast_vote(&graph, &oracle, PROPOSAL, &addr(voter % n), choice).unwrap();

            let tally = engine.tally(PROPOSAL).unwrap();
            prop_assert_eq!(engine.recount(&graph, &oracle, PROPOSAL).unwrap(), tally);
            let unclaimed = engine.unclaimed_weight(&graph, &oracle, PROPOSAL).unwrap();
            prop_assert_eq!(tally.yea + tally.nay + unclaimed, total);
        }
    }

    /// Casting the same vote twice in a row leaves the tally where one cast put it.
    #[test]
    fn repeated_vote_is_idempotent(
        (stakes, ops) in forest_and_stakes(),
        votes in prop::collection::vec((0usize..12, any::<bool>()), 1..20),
    ) {
        let n = stakes.len();
        let mut graph = graph_with_stakes(&stakes);
        for (f, t) in ops {
            let _ = apply(&mut graph, f, t);
        }
        let oracle = oracle_for(&stakes);
        let mut engine = TallyEngine::new();
        engine.open_proposal(PROPOSAL, Checkpoint::GENESIS).unwrap();

        for (voter, yea) in votes {
            let choice = if yea { VoteChoice::Yea } else { VoteChoice::Nay };
            let voter = addr(voter % n);
            engine.cast_vote(&graph, &oracle, PROPOSAL, &voter, choice).unwrap();
            let once = engine.tally(PROPOSAL).unwrap();
            let record = engine.vote_of(PROPOSAL, &voter);

            engine.cast_vote(&graph, &oracle, PROPOSAL, &voter, choice).unwrap();
            prop_assert_eq!(engine.tally(PROPOSAL).unwrap(), once);
            prop_assert_eq!(engine.vote_of(PROPOSAL, &voter), record);
        }
    }
}
