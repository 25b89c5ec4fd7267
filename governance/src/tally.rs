//! Vote tallying with overrule.
//!
//! Every participant's checkpointed weight is credited to the nearest direct
//! voter on its delegation chain, the participant itself included. When a
//! participant votes for the first time, the weight of its not-yet-claimed
//! subtree moves away from the closest ancestor that had already voted (if any)
//! and onto the participant's own choice. Later votes by the same participant
//! only re-credit that participant's own claim.
//!
//! Each vote record keeps the weight it locked in so its effect can be
//! reversed exactly when the voter changes their mind or a descendant
//! overrules part of it.

use crate::delegation::DelegationGraph;
use crate::error::GovernanceError;
use liquid_types::{Address, Checkpoint, ProposalId, StakeOracle, Weight};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A direct vote's choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    #[serde(alias = "yes")]
    Yea,
    #[serde(alias = "no")]
    Nay,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yea => write!(f, "yea"),
            Self::Nay => write!(f, "nay"),
        }
    }
}

impl FromStr for VoteChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yea" | "yes" | "y" | "true" => Ok(Self::Yea),
            "nay" | "no" | "n" | "false" => Ok(Self::Nay),
            other => Err(format!("unknown vote choice {other:?}")),
        }
    }
}

/// A participant's direct vote on one proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub choice: VoteChoice,
    /// Weight currently credited to `choice` on behalf of this voter.
    pub locked_weight: Weight,
}

/// Running totals for one proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yea: Weight,
    pub nay: Weight,
}

impl Tally {
    pub fn new(yea: Weight, nay: Weight) -> Self {
        Self { yea, nay }
    }

    pub fn get(&self, choice: VoteChoice) -> Weight {
        match choice {
            VoteChoice::Yea => self.yea,
            VoteChoice::Nay => self.nay,
        }
    }

    /// Weight credited to either side.
    pub fn total(&self) -> Weight {
        self.yea.saturating_add(self.nay)
    }

    fn bucket_mut(&mut self, choice: VoteChoice) -> &mut Weight {
        match choice {
            VoteChoice::Yea => &mut self.yea,
            VoteChoice::Nay => &mut self.nay,
        }
    }

    fn credit(&mut self, choice: VoteChoice, weight: Weight) {
        let bucket = self.bucket_mut(choice);
        *bucket = bucket.saturating_add(weight);
    }

    fn debit(&mut self, choice: VoteChoice, weight: Weight) {
        let bucket = self.bucket_mut(choice);
        *bucket = bucket.saturating_sub(weight);
    }
}

/// Weight taken from an ancestor's vote when a delegator votes for the first time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrule {
    /// The nearest ancestor that had already voted.
    pub delegate: Address,
    /// Weight moved from the ancestor's choice to the voter's.
    pub moved: Weight,
}

/// Outcome of a successful [`TallyEngine::cast_vote`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub choice: VoteChoice,
    pub locked_weight: Weight,
    /// The voter's record before this vote, if they had voted already.
    pub previous: Option<VoteRecord>,
    pub overruled: Option<Overrule>,
}

/// Per-proposal tally state.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProposalTally {
    checkpoint: Checkpoint,
    closed: bool,
    votes: HashMap<Address, VoteRecord>,
    tally: Tally,
}

/// Direct-vote bookkeeping for every proposal, keyed by proposal id.
///
/// The delegation graph is shared and passed in on each call; only vote state
/// is owned here, so many proposals can be tallied against one graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TallyEngine {
    proposals: HashMap<ProposalId, ProposalTally>,
}

impl TallyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tallying `id`, reading own weights at `checkpoint`.
    pub fn open_proposal(
        &mut self,
        id: ProposalId,
        checkpoint: Checkpoint,
    ) -> Result<(), GovernanceError> {
        if self.proposals.contains_key(&id) {
            return Err(GovernanceError::ProposalExists(id));
        }
        self.proposals.insert(
            id,
            ProposalTally {
                checkpoint,
                closed: false,
                votes: HashMap::new(),
                tally: Tally::default(),
            },
        );
        tracing::debug!(proposal = %id, %checkpoint, "proposal opened");
        Ok(())
    }

    /// Stop accepting votes on `id`, returning its final tally.
    pub fn close_proposal(&mut self, id: ProposalId) -> Result<Tally, GovernanceError> {
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        if proposal.closed {
            return Err(GovernanceError::AlreadyClosed(id));
        }
        proposal.closed = true;
        tracing::info!(
            proposal = %id,
            yea = proposal.tally.yea,
            nay = proposal.tally.nay,
            voters = proposal.votes.len(),
            "proposal closed"
        );
        Ok(proposal.tally)
    }

    /// Record a direct vote by `voter` on `id`.
    ///
    /// The voter locks in its claimable weight: its own weight plus that of every
    /// delegator subtree not already claimed by a closer direct voter. On a first
    /// vote, the same amount is taken back from the nearest ancestor that already
    /// voted. A repeated vote reverses the voter's previous credit and recomputes
    /// the claim from scratch.
    pub fn cast_vote(
        &mut self,
        graph: &DelegationGraph,
        oracle: &impl StakeOracle,
        id: ProposalId,
        voter: &Address,
        choice: VoteChoice,
    ) -> Result<VoteReceipt, GovernanceError> {
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        if proposal.closed {
            return Err(GovernanceError::AlreadyClosed(id));
        }

        let previous = proposal.votes.get(voter).copied();
        let claimable = claimable_weight(graph, oracle, proposal.checkpoint, &proposal.votes, voter);
        let blocking = match previous {
            Some(_) => None,
            None => nearest_voter_above(graph, &proposal.votes, voter),
        };

        if let Some(prev) = previous {
            proposal.tally.debit(prev.choice, prev.locked_weight);
        }

        let mut overruled = None;
        if let Some(delegate) = blocking {
            if let Some(record) = proposal.votes.get_mut(&delegate) {
                let moved = claimable.min(record.locked_weight);
                if moved < claimable {
                    tracing::warn!(
                        proposal = %id,
                        %voter,
                        %delegate,
                        claimable,
                        locked = record.locked_weight,
                        "ancestor holds less than the overruled weight; delegation changed while open"
                    );
                }
                record.locked_weight -= moved;
                proposal.tally.debit(record.choice, moved);
                overruled = Some(Overrule { delegate, moved });
            }
        }

        proposal.votes.insert(
            voter.clone(),
            VoteRecord {
                choice,
                locked_weight: claimable,
            },
        );
        proposal.tally.credit(choice, claimable);

        tracing::debug!(
            proposal = %id,
            %voter,
            %choice,
            weight = claimable,
            revote = previous.is_some(),
            overruled = ?overruled.as_ref().map(|o| o.delegate.as_str()),
            "vote cast"
        );

        Ok(VoteReceipt {
            choice,
            locked_weight: claimable,
            previous,
            overruled,
        })
    }

    /// Current totals for `id`.
    pub fn tally(&self, id: ProposalId) -> Result<Tally, GovernanceError> {
        self.proposal(id).map(|p| p.tally)
    }

    /// `voter`'s direct vote on `id`, if any.
    pub fn vote_of(&self, id: ProposalId, voter: &Address) -> Option<VoteRecord> {
        self.proposals
            .get(&id)
            .and_then(|p| p.votes.get(voter))
            .copied()
    }

    /// Participants that voted directly on `id`.
    pub fn voters(&self, id: ProposalId) -> Result<Vec<&Address>, GovernanceError> {
        self.proposal(id).map(|p| p.votes.keys().collect())
    }

    pub fn checkpoint_of(&self, id: ProposalId) -> Option<Checkpoint> {
        self.proposals.get(&id).map(|p| p.checkpoint)
    }

    pub fn is_open(&self, id: ProposalId) -> bool {
        self.proposals.get(&id).is_some_and(|p| !p.closed)
    }

    /// Every proposal being (or having been) tallied.
    pub fn proposals(&self) -> impl Iterator<Item = &ProposalId> {
        self.proposals.keys()
    }

    /// Recompute `id`'s tally from scratch.
    ///
    /// Each participant known to the graph (and each voter) has its checkpointed
    /// weight credited to the nearest direct voter on its chain. Matches
    /// [`TallyEngine::tally`] as long as delegation did not change while the
    /// proposal was open.
    pub fn recount(
        &self,
        graph: &DelegationGraph,
        oracle: &impl StakeOracle,
        id: ProposalId,
    ) -> Result<Tally, GovernanceError> {
        self.audit(graph, oracle, id).map(|(tally, _)| tally)
    }

    /// Weight on `id` whose chain contains no direct voter.
    pub fn unclaimed_weight(
        &self,
        graph: &DelegationGraph,
        oracle: &impl StakeOracle,
        id: ProposalId,
    ) -> Result<Weight, GovernanceError> {
        self.audit(graph, oracle, id).map(|(_, unclaimed)| unclaimed)
    }

    fn audit(
        &self,
        graph: &DelegationGraph,
        oracle: &impl StakeOracle,
        id: ProposalId,
    ) -> Result<(Tally, Weight), GovernanceError> {
        let proposal = self.proposal(id)?;
        let participants: HashSet<&Address> =
            graph.participants().chain(proposal.votes.keys()).collect();

        let mut tally = Tally::default();
        let mut unclaimed: Weight = 0;
        for who in participants {
            let weight = oracle.balance_at(who, proposal.checkpoint);
            let claimant = match proposal.votes.get(who) {
                Some(record) => Some(record),
                None => nearest_voter_above(graph, &proposal.votes, who)
                    .and_then(|a| proposal.votes.get(&a)),
            };
            match claimant {
                Some(record) => tally.credit(record.choice, weight),
                None => unclaimed = unclaimed.saturating_add(weight),
            }
        }
        Ok((tally, unclaimed))
    }

    fn proposal(&self, id: ProposalId) -> Result<&ProposalTally, GovernanceError> {
        self.proposals
            .get(&id)
            .ok_or(GovernanceError::UnknownProposal(id))
    }

    /// Serialize all proposal state to bytes for persistence.
    pub fn save_state(&self) -> Result<Vec<u8>, GovernanceError> {
        bincode::serialize(self).map_err(|e| GovernanceError::Snapshot(e.to_string()))
    }

    /// Restore from bytes produced by [`TallyEngine::save_state`].
    pub fn load_state(data: &[u8]) -> Result<Self, GovernanceError> {
        bincode::deserialize(data).map_err(|e| GovernanceError::Snapshot(e.to_string()))
    }
}

/// Own weight of `voter` plus every delegator subtree with no direct voter in it.
///
/// Depth-first over the reverse index with an explicit stack, stopping at any
/// delegator that already has a vote record.
fn claimable_weight(
    graph: &DelegationGraph,
    oracle: &impl StakeOracle,
    checkpoint: Checkpoint,
    votes: &HashMap<Address, VoteRecord>,
    voter: &Address,
) -> Weight {
    let mut total = oracle.balance_at(voter, checkpoint);
    let mut stack: Vec<&Address> = graph.delegators(voter).collect();
    while let Some(who) = stack.pop() {
        if votes.contains_key(who) {
            continue;
        }
        total = total.saturating_add(oracle.balance_at(who, checkpoint));
        stack.extend(graph.delegators(who));
    }
    total
}

/// The closest strict ancestor of `who` holding a vote record.
fn nearest_voter_above(
    graph: &DelegationGraph,
    votes: &HashMap<Address, VoteRecord>,
    who: &Address,
) -> Option<Address> {
    let mut current = graph.delegate_of(who);
    while let Some(addr) = current {
        if votes.contains_key(addr) {
            return Some(addr.clone());
        }
        current = graph.delegate_of(addr);
    }
    None
}
