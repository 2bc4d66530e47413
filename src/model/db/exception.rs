use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A witness's formal objection to the conduct of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionCore {
    pub election_id: Id,
    pub witness_id: Id,
    pub note: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub filed_at: DateTime<Utc>,
}

pub type NewException = ExceptionCore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessException {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub exception: ExceptionCore,
}

impl WitnessException {
    pub fn new(exception: NewException) -> Self {
        Self {
            id: Id::new(),
            exception,
        }
    }
}

impl Deref for WitnessException {
    type Target = ExceptionCore;

    fn deref(&self) -> &Self::Target {
        &self.exception
    }
}
