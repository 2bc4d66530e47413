use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::whitelist::WhitelistStatus, mongodb::Id};

/// A user's registration for one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistCore {
    pub election_id: Id,
    pub user_id: Id,
    /// The voting address the user intends to vote from. Unique per election.
    pub address: String,
    /// Contact email, copied from the user at registration time.
    pub email: String,
    pub status: WhitelistStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl WhitelistCore {
    pub fn pending(
        election_id: Id,
        user_id: Id,
        address: String,
        email: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            election_id,
            user_id,
            address,
            email,
            status: WhitelistStatus::Pending,
            created_at: now,
        }
    }
}

pub type NewWhitelistEntry = WhitelistCore;

/// A whitelist entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: WhitelistCore,
}

impl WhitelistEntry {
    pub fn new(entry: NewWhitelistEntry) -> Self {
        Self {
            id: Id::new(),
            entry,
        }
    }
}

impl Deref for WhitelistEntry {
    type Target = WhitelistCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
