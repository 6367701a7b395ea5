//! Elimination voting.
//!
//! A `VoteTally` holds at most one open `VoteRound`. Each round snapshots
//! who may vote and who may be voted for at the moment it opens.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from casting a vote
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("'{0}' cannot vote in this round")]
    VoterNotEligible(String),

    #[error("'{0}' is not a valid target")]
    TargetInvalid(String),

    #[error("No vote is open")]
    NoActiveRound,
}

/// One round of voting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRound {
    /// Voters allowed to cast a ballot
    pub eligible_voters: BTreeSet<String>,
    /// Targets alive when the round opened
    pub eligible_targets: BTreeSet<String>,
    /// voter -> target
    pub ballots: BTreeMap<String, String>,
    /// target -> count
    pub counts: BTreeMap<String, u32>,
}

impl VoteRound {
    pub fn new(
        voters: impl IntoIterator<Item = String>,
        targets: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            eligible_voters: voters.into_iter().collect(),
            eligible_targets: targets.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.counts.values().sum()
    }
}

/// Collects votes for the active round
#[derive(Debug, Default)]
pub struct VoteTally {
    round: Option<VoteRound>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh round, discarding anything left over
    pub fn new_round(
        &mut self,
        voters: impl IntoIterator<Item = String>,
        targets: impl IntoIterator<Item = String>,
    ) {
        self.round = Some(VoteRound::new(voters, targets));
    }

    pub fn round(&self) -> Option<&VoteRound> {
        self.round.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.round.is_some()
    }

    /// Record `voter`'s ballot for `target`.
    ///
    /// A voter who already voted is no longer eligible; the tally is left
    /// untouched on every error.
    pub fn add_vote(&mut self, voter: &str, target: &str) -> Result<(), VoteError> {
        let round = self.round.as_mut().ok_or(VoteError::NoActiveRound)?;

        if !round.eligible_voters.contains(voter) || round.ballots.contains_key(voter) {
            return Err(VoteError::VoterNotEligible(voter.to_string()));
        }
        if !round.eligible_targets.contains(target) {
            return Err(VoteError::TargetInvalid(target.to_string()));
        }

        round.ballots.insert(voter.to_string(), target.to_string());
        *round.counts.entry(target.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// The target with strictly the most votes.
    ///
    /// `None` when nobody voted or the top count is shared.
    pub fn resolve(&self) -> Option<String> {
        let round = self.round.as_ref()?;
        let max = *round.counts.values().max()?;

        let mut leaders = round.counts.iter().filter(|(_, count)| **count == max);
        let (leader, _) = leaders.next()?;
        if leaders.next().is_some() {
            return None;
        }
        Some(leader.clone())
    }

    /// Drop the round and all its votes
    pub fn clear(&mut self) {
        self.round = None;
    }
}
