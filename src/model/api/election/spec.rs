use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::election::{CandidatePair, ElectionWindows},
    mongodb::Id,
};
use crate::voting::window::WindowUpdate;

/// A new election, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    pub organization: String,
    #[serde(default)]
    pub description: Option<String>,
    /// In ballot order.
    pub candidates: Vec<CandidatePair>,
    #[serde(default)]
    pub witnesses: Vec<Id>,
}

/// Changes to a draft election. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftUpdate {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub candidates: Option<Vec<CandidatePair>>,
    pub witnesses: Option<Vec<Id>>,
}

/// Parameters for starting a draft election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub whitelist_start: DateTime<Utc>,
    pub whitelist_duration_hours: u32,
    pub pending_duration_hours: u32,
    pub vote_duration_hours: u32,
    pub public_key: String,
}

/// Changes to an ongoing election. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OngoingUpdate {
    pub whitelist_start: Option<DateTime<Utc>>,
    pub whitelist_end: Option<DateTime<Utc>>,
    pub vote_start: Option<DateTime<Utc>>,
    pub vote_end: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub public_key: Option<String>,
}

impl OngoingUpdate {
    pub fn windows(&self) -> WindowUpdate {
        WindowUpdate {
            whitelist_start: self.whitelist_start,
            whitelist_end: self.whitelist_end,
            vote_start: self.vote_start,
            vote_end: self.vote_end,
        }
    }
}

/// Four explicit boundaries, e.g. for de-terminating an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsSpec {
    pub whitelist_start: DateTime<Utc>,
    pub whitelist_end: DateTime<Utc>,
    pub vote_start: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
}

impl From<WindowsSpec> for ElectionWindows {
    fn from(spec: WindowsSpec) -> Self {
        Self {
            whitelist_start: spec.whitelist_start,
            whitelist_end: spec.whitelist_end,
            vote_start: spec.vote_start,
            vote_end: spec.vote_end,
        }
    }
}

/// A termination request. Witnesses explain their objection in the note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminateRequest {
    pub note: Option<String>,
}
