use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::whitelist::{WhitelistDecision, WhitelistStatus},
    db::whitelist::WhitelistEntry,
};

/// A user's request to join an election's whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistRequest {
    /// The voting address the user will vote from.
    pub address: String,
}

/// An administrator's verdict on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub status: WhitelistDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub user_id: ApiId,
    pub address: String,
    pub email: String,
    pub status: WhitelistStatus,
    pub created_at: DateTime<Utc>,
}

impl From<WhitelistEntry> for WhitelistDescription {
    fn from(entry: WhitelistEntry) -> Self {
        Self {
            id: entry.id.into(),
            election_id: entry.election_id.into(),
            user_id: entry.user_id.into(),
            address: entry.entry.address,
            email: entry.entry.email,
            status: entry.entry.status,
            created_at: entry.entry.created_at,
        }
    }
}

/// An election's whitelist, grouped by review state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistGroups {
    pub pending: Vec<WhitelistDescription>,
    pub accepted: Vec<WhitelistDescription>,
    pub declined: Vec<WhitelistDescription>,
}

impl FromIterator<WhitelistEntry> for WhitelistGroups {
    fn from_iter<I: IntoIterator<Item = WhitelistEntry>>(entries: I) -> Self {
        let mut groups = Self::default();
        for entry in entries {
            let group = match entry.status {
                WhitelistStatus::Pending => &mut groups.pending,
                WhitelistStatus::Accept => &mut groups.accepted,
                WhitelistStatus::Decline => &mut groups.declined,
            };
            group.push(entry.into());
        }
        groups
    }
}
