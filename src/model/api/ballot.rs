use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::ballot::Ballot, mongodb::Id};

/// A vote, as cast by a whitelisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: Id,
    /// Reference to the matching record on an external ledger, if any.
    #[serde(default)]
    pub transaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub whitelist_id: ApiId,
    pub candidate_id: ApiId,
    pub valid: bool,
    pub transaction: Option<String>,
    pub cast_at: DateTime<Utc>,
}

impl From<Ballot> for BallotDescription {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id.into(),
            election_id: ballot.election_id.into(),
            whitelist_id: ballot.whitelist_id.into(),
            candidate_id: ballot.candidate_id.into(),
            valid: ballot.valid,
            transaction: ballot.ballot.transaction,
            cast_at: ballot.ballot.cast_at,
        }
    }
}
