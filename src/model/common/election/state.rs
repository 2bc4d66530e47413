use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromFormField,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionStatus {
    /// Under construction, only visible to admins. Candidates may still change.
    #[field(value = "DRAFT")]
    Draft,
    /// Started: the whitelist and vote windows are fixed.
    #[field(value = "ONGOING")]
    Ongoing,
    /// The vote window has closed; results are available.
    #[field(value = "FINISH")]
    Finish,
    /// Halted by an administrator or by a quorum of witnesses.
    #[field(value = "TERMINATE")]
    Terminate,
}

impl ElectionStatus {
    /// All states, in lifecycle order.
    pub const ALL: [ElectionStatus; 4] = [
        ElectionStatus::Draft,
        ElectionStatus::Ongoing,
        ElectionStatus::Finish,
        ElectionStatus::Terminate,
    ];
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Draft => "DRAFT",
            Self::Ongoing => "ONGOING",
            Self::Finish => "FINISH",
            Self::Terminate => "TERMINATE",
        };
        write!(f, "{name}")
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
