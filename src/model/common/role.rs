use std::fmt::Display;

use mongodb::bson::{to_bson, Bson};
use rocket::FromFormField;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Different privilege levels.
#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize_repr, Deserialize_repr, FromFormField,
)]
#[repr(u8)]
pub enum Role {
    #[field(value = "user")]
    User = 0,
    #[field(value = "candidate")]
    Candidate = 1,
    #[field(value = "witness")]
    Witness = 2,
    #[field(value = "admin")]
    Admin = 3,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::User => "user",
                Self::Candidate => "candidate",
                Self::Witness => "witness",
                Self::Admin => "admin",
            }
        )
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
