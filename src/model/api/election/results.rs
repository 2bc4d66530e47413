use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::{ballot::Ballot, candidate::Candidate, election::Election},
    mongodb::Id,
};

use super::{CandidateDescription, ElectionDescription};

/// The figures of a finished election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionResult {
    pub election: Election,
    /// In ballot order.
    pub candidates: Vec<Candidate>,
    pub winner: Option<Id>,
    pub total_whitelists: u64,
    /// Ballots recorded, valid or not.
    pub total_voters: u64,
    /// Only gathered when a single result is requested.
    pub ballots: Option<Vec<Ballot>>,
}

/// One ballot as published with the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSummary {
    pub id: ApiId,
    pub candidate_id: ApiId,
    pub valid: bool,
    pub transaction: Option<String>,
}

impl From<Ballot> for BallotSummary {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id.into(),
            candidate_id: ballot.candidate_id.into(),
            valid: ballot.valid,
            transaction: ballot.ballot.transaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDescription {
    pub election: ElectionDescription,
    pub winner: Option<CandidateDescription>,
    pub total_whitelists: u64,
    pub total_voters: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballots: Option<Vec<BallotSummary>>,
}

impl From<ElectionResult> for ResultDescription {
    fn from(result: ElectionResult) -> Self {
        let winner = result
            .winner
            .and_then(|id| result.candidates.iter().find(|c| c.id == id))
            .cloned()
            .map(CandidateDescription::from);
        Self {
            election: ElectionDescription::new(result.election, result.candidates),
            winner,
            total_whitelists: result.total_whitelists,
            total_voters: result.total_voters,
            ballots: result
                .ballots
                .map(|ballots| ballots.into_iter().map(BallotSummary::from).collect()),
        }
    }
}
