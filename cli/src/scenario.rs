//! Scenario files: an initial stake table followed by an ordered list of steps.
//!
//! ```toml
//! [stakes]
//! alice = 100
//! bob = 200
//!
//! [[steps]]
//! op = "delegate"
//! from = "alice"
//! to = "bob"
//!
//! [[steps]]
//! op = "open"
//! proposal = 1
//!
//! [[steps]]
//! op = "vote"
//! proposal = 1
//! voter = "bob"
//! choice = "yea"
//! ```
//!
//! Initial stakes are recorded at the genesis checkpoint. Weights are plain
//! TOML integers. Once a proposal has opened, stakes can no longer be recorded
//! at or before its checkpoint.

use anyhow::Context;
use liquid_governance::{GovernanceError, LiquidDemocracy, StakeHistory, Tally, VoteChoice};
use liquid_types::{Address, Checkpoint, ProposalId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    /// Own stake per participant at the genesis checkpoint.
    #[serde(default)]
    pub stakes: BTreeMap<Address, u64>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Record a new balance, by default at the latest checkpoint seen so far,
    /// or just past it once a proposal reads that checkpoint.
    Stake {
        who: Address,
        weight: u64,
        #[serde(default)]
        checkpoint: Option<Checkpoint>,
    },
    Delegate {
        from: Address,
        to: Address,
    },
    Undelegate {
        who: Address,
    },
    /// Start tallying a proposal, by default at the latest checkpoint.
    Open {
        proposal: ProposalId,
        #[serde(default)]
        checkpoint: Option<Checkpoint>,
    },
    Vote {
        proposal: ProposalId,
        voter: Address,
        choice: VoteChoice,
    },
    Close {
        proposal: ProposalId,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Stake { .. } => "stake",
            Self::Delegate { .. } => "delegate",
            Self::Undelegate { .. } => "undelegate",
            Self::Open { .. } => "open",
            Self::Vote { .. } => "vote",
            Self::Close { .. } => "close",
        }
    }
}

impl Scenario {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Replay every step against a fresh engine.
    ///
    /// A failing step aborts the replay unless `keep_going` is set, in which
    /// case it is logged, listed in the report, and skipped.
    pub fn run(&self, keep_going: bool) -> anyhow::Result<Report> {
        let mut replay = Replay::new();
        for (who, weight) in &self.stakes {
            replay
                .stake(who, Weight::from(*weight), Some(Checkpoint::GENESIS))
                .with_context(|| format!("initial stake for {who}"))?;
        }

        let mut skipped = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            match replay.apply(step) {
                Ok(()) => tracing::debug!(step = index, op = step.name(), "step applied"),
                Err(e) if keep_going => {
                    tracing::warn!(step = index, op = step.name(), error = %e, "step skipped");
                    skipped.push(SkippedStep {
                        index,
                        op: step.name(),
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("step {index} ({})", step.name()));
                }
            }
        }

        Ok(replay.report(skipped))
    }
}

/// Engine plus the latest checkpoint the scenario has reached.
struct Replay {
    engine: LiquidDemocracy<StakeHistory>,
    current: Checkpoint,
    /// Highest checkpoint any proposal reads its weights at.
    sealed: Option<(Checkpoint, ProposalId)>,
}

impl Replay {
    fn new() -> Self {
        Self {
            engine: LiquidDemocracy::new(StakeHistory::new()),
            current: Checkpoint::GENESIS,
            sealed: None,
        }
    }

    fn apply(&mut self, step: &Step) -> Result<(), GovernanceError> {
        match step {
            Step::Stake {
                who,
                weight,
                checkpoint,
            } => self.stake(who, Weight::from(*weight), *checkpoint),
            Step::Delegate { from, to } => self.engine.delegate(from, to),
            Step::Undelegate { who } => self.engine.undelegate(who).map(|_| ()),
            Step::Open {
                proposal,
                checkpoint,
            } => self.open(*proposal, checkpoint.unwrap_or(self.current)),
            Step::Vote {
                proposal,
                voter,
                choice,
            } => self.engine.cast_vote(*proposal, voter, *choice).map(|_| ()),
            Step::Close { proposal } => self.engine.close_proposal(*proposal).map(|_| ()),
        }
    }

    fn stake(
        &mut self,
        who: &Address,
        weight: Weight,
        checkpoint: Option<Checkpoint>,
    ) -> Result<(), GovernanceError> {
        let at = match (checkpoint, self.sealed) {
            (Some(at), Some((sealed, proposal))) if at <= sealed => {
                return Err(GovernanceError::SealedCheckpoint { at, proposal });
            }
            (Some(at), _) => at,
            (None, Some((sealed, _))) if sealed >= self.current => sealed.next(),
            (None, _) => self.current,
        };
        self.engine.oracle_mut().record(who, at, weight)?;
        self.current = self.current.max(at);
        self.engine.sync_stake(who, at);
        Ok(())
    }

    fn open(&mut self, proposal: ProposalId, at: Checkpoint) -> Result<(), GovernanceError> {
        self.engine.open_proposal(proposal, at)?;
        if self.sealed.map_or(true, |(sealed, _)| at > sealed) {
            self.sealed = Some((at, proposal));
        }
        Ok(())
    }

    fn report(&self, skipped: Vec<SkippedStep>) -> Report {
        let tallies = self.engine.tallies();
        let mut ids: Vec<ProposalId> = tallies.proposals().copied().collect();
        ids.sort();

        let proposals = ids
            .into_iter()
            .filter_map(|id| {
                let tally = self.engine.tally(id).ok()?;
                Some(ProposalReport {
                    id,
                    checkpoint: tallies.checkpoint_of(id)?,
                    open: tallies.is_open(id),
                    tally,
                    unclaimed: self.engine.unclaimed_weight(id).ok()?,
                    recount_matches: self.engine.recount(id).ok()? == tally,
                })
            })
            .collect();

        let graph = self.engine.graph();
        let mut addresses: Vec<&Address> = graph.participants().collect();
        addresses.sort();
        let participants = addresses
            .into_iter()
            .map(|who| ParticipantReport {
                address: who.clone(),
                own_weight: graph.own_weight(who),
                total_weight: graph.total_weight(who),
                power: graph.power(who),
                delegate: graph.delegate_of(who).cloned(),
            })
            .collect();

        Report {
            proposals,
            participants,
            skipped,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProposalReport {
    pub id: ProposalId,
    pub checkpoint: Checkpoint,
    pub open: bool,
    pub tally: Tally,
    pub unclaimed: Weight,
    /// Whether a from-scratch recount agrees with the running tally.
    pub recount_matches: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ParticipantReport {
    pub address: Address,
    pub own_weight: Weight,
    pub total_weight: Weight,
    pub power: Weight,
    pub delegate: Option<Address>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedStep {
    pub index: usize,
    pub op: &'static str,
    pub error: String,
}

/// Outcome of a replay.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub proposals: Vec<ProposalReport>,
    pub participants: Vec<ParticipantReport>,
    pub skipped: Vec<SkippedStep>,
}

impl Report {
    pub fn proposal(&self, id: ProposalId) -> Option<&ProposalReport> {
        self.proposals.iter().find(|p| p.id == id)
    }

    pub fn participant(&self, who: &Address) -> Option<&ParticipantReport> {
        self.participants.iter().find(|p| &p.address == who)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "proposals:")?;
        for p in &self.proposals {
            writeln!(
                f,
                "  {} {} [{}] yea={} nay={} unclaimed={}{}",
                p.id,
                p.checkpoint,
                if p.open { "open" } else { "closed" },
                p.tally.yea,
                p.tally.nay,
                p.unclaimed,
                if p.recount_matches { "" } else { " (recount differs)" },
            )?;
        }
        writeln!(f, "participants:")?;
        for p in &self.participants {
            write!(
                f,
                "  {} own={} total={} power={}",
                p.address, p.own_weight, p.total_weight, p.power
            )?;
            match &p.delegate {
                Some(to) => writeln!(f, " -> {to}")?,
                None => writeln!(f)?,
            }
        }
        if !self.skipped.is_empty() {
            writeln!(f, "skipped:")?;
            for s in &self.skipped {
                writeln!(f, "  step {} ({}): {}", s.index, s.op, s.error)?;
            }
        }
        Ok(())
    }
}
