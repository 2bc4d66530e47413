use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::election::CandidatePair;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub election_id: Id,
    pub lead: Id,
    pub deputy: Id,
    /// Order of appearance on the ballot, starting at zero.
    pub position: u32,
    /// Number of currently valid ballots naming this candidate.
    pub tally: u64,
}

impl CandidateCore {
    /// Candidates for the given pairs, in ballot order, with zero tallies.
    pub fn from_pairs(election_id: Id, pairs: &[CandidatePair]) -> Vec<Self> {
        pairs
            .iter()
            .zip(0..)
            .map(|(pair, position)| Self {
                election_id,
                lead: pair.lead,
                deputy: pair.deputy,
                position,
                tally: 0,
            })
            .collect()
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    pub fn new(candidate: NewCandidate) -> Self {
        Self {
            id: Id::new(),
            candidate,
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}
