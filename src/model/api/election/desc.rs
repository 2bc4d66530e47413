use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::ElectionStatus,
    db::{
        candidate::Candidate,
        election::{Election, ElectionWindows},
        exception::WitnessException,
    },
};

/// The four window boundaries of an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsDescription {
    pub whitelist_start: DateTime<Utc>,
    pub whitelist_end: DateTime<Utc>,
    pub vote_start: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
}

impl From<ElectionWindows> for WindowsDescription {
    fn from(windows: ElectionWindows) -> Self {
        Self {
            whitelist_start: windows.whitelist_start,
            whitelist_end: windows.whitelist_end,
            vote_start: windows.vote_start,
            vote_end: windows.vote_end,
        }
    }
}

/// A candidate, with their current tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub lead: ApiId,
    pub deputy: ApiId,
    pub position: u32,
    pub tally: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            lead: candidate.lead.into(),
            deputy: candidate.deputy.into(),
            position: candidate.position,
            tally: candidate.tally,
        }
    }
}

/// Top-level election information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub organization: String,
    pub description: Option<String>,
    pub status: ElectionStatus,
    pub windows: Option<WindowsDescription>,
    pub public_key: Option<String>,
    pub winner: Option<ApiId>,
    pub witnesses: Vec<ApiId>,
    pub created_at: DateTime<Utc>,
    pub candidates: Vec<CandidateDescription>,
}

impl ElectionDescription {
    pub fn new(election: Election, candidates: Vec<Candidate>) -> Self {
        let id = election.id.into();
        let election = election.election;
        Self {
            id,
            name: election.name,
            organization: election.organization,
            description: election.description,
            status: election.status,
            windows: election.windows.map(WindowsDescription::from),
            public_key: election.public_key,
            winner: election.winner.map(ApiId::from),
            witnesses: election.witnesses.into_iter().map(ApiId::from).collect(),
            created_at: election.created_at,
            candidates: candidates
                .into_iter()
                .map(CandidateDescription::from)
                .collect(),
        }
    }
}

/// A witness's objection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub witness_id: ApiId,
    pub note: String,
    pub filed_at: DateTime<Utc>,
}

impl From<WitnessException> for ExceptionDescription {
    fn from(exception: WitnessException) -> Self {
        Self {
            id: exception.id.into(),
            election_id: exception.election_id.into(),
            witness_id: exception.witness_id.into(),
            note: exception.exception.note,
            filed_at: exception.exception.filed_at,
        }
    }
}

/// Full election information for a single election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetail {
    #[serde(flatten)]
    pub election: ElectionDescription,
    pub total_whitelists: u64,
    /// Only shown to administrators and witnesses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceptions: Option<Vec<ExceptionDescription>>,
}

/// The outcome of a termination request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminationDescription {
    /// The election is now terminated.
    Terminated { election: ElectionDescription },
    /// A witness's objection was recorded.
    Objected {
        exception: ExceptionDescription,
        /// Whether this objection completed a witness quorum.
        terminated: bool,
    },
}
