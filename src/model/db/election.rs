use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionStatus, mongodb::Id};

/// The four absolute boundaries of an election's timeline.
///
/// Once set they satisfy
/// `whitelist_start < whitelist_end < vote_start < vote_end`;
/// see [`crate::voting::window`] for construction and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionWindows {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub whitelist_start: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub whitelist_end: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub vote_start: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub vote_end: DateTime<Utc>,
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub name: String,
    pub organization: String,
    pub description: Option<String>,
    pub status: ElectionStatus,
    /// Unset while in draft.
    pub windows: Option<ElectionWindows>,
    /// Opaque external key supplied when the election is started.
    pub public_key: Option<String>,
    /// Pinned once the results of a finished election are first read.
    pub winner: Option<Id>,
    /// Users allowed to file exceptions against this election.
    pub witnesses: Vec<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// A fresh draft election.
    pub fn draft(
        name: String,
        organization: String,
        description: Option<String>,
        witnesses: Vec<Id>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            organization,
            description,
            status: ElectionStatus::Draft,
            windows: None,
            public_key: None,
            winner: None,
            witnesses,
            created_at: now,
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Assign a fresh ID to a new election.
    pub fn new(election: NewElection) -> Self {
        Self {
            id: Id::new(),
            election,
        }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// A set of field changes to apply to a stored election.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionUpdate {
    pub status: Option<ElectionStatus>,
    pub windows: Option<ElectionWindows>,
    pub public_key: Option<String>,
    pub name: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub witnesses: Option<Vec<Id>>,
    /// Replaces the whole candidate set, resetting tallies.
    pub candidates: Option<Vec<CandidatePair>>,
}

impl ElectionUpdate {
    /// An update that only moves the election to `status`.
    pub fn status(status: ElectionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Apply the scalar parts of this update to an in-memory election.
    /// Candidates are owned by a separate collection and are not touched.
    pub fn apply(&self, election: &mut ElectionCore) {
        if let Some(status) = self.status {
            election.status = status;
        }
        if let Some(windows) = self.windows {
            election.windows = Some(windows);
        }
        if let Some(ref key) = self.public_key {
            election.public_key = Some(key.clone());
        }
        if let Some(ref name) = self.name {
            election.name = name.clone();
        }
        if let Some(ref organization) = self.organization {
            election.organization = organization.clone();
        }
        if let Some(ref description) = self.description {
            election.description = Some(description.clone());
        }
        if let Some(ref witnesses) = self.witnesses {
            election.witnesses = witnesses.clone();
        }
    }
}

/// The two users standing together as one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub lead: Id,
    pub deputy: Id,
}
