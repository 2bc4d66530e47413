use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Review state of a whitelist entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistStatus {
    /// Awaiting an administrator's decision.
    Pending,
    /// Approved: the user may cast one ballot.
    Accept,
    /// Rejected.
    Decline,
}

impl From<WhitelistStatus> for Bson {
    fn from(status: WhitelistStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// An administrator's verdict on a pending entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistDecision {
    Accept,
    Decline,
}

impl From<WhitelistDecision> for WhitelistStatus {
    fn from(decision: WhitelistDecision) -> Self {
        match decision {
            WhitelistDecision::Accept => Self::Accept,
            WhitelistDecision::Decline => Self::Decline,
        }
    }
}
