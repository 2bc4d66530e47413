use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::role::Role, db::user::User};

/// A user's own account, as shown to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: ApiId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub email_verified: bool,
    pub suspended: bool,
    pub identity_document: Option<String>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            email: user.user.email,
            name: user.user.name,
            role: user.user.role,
            email_verified: user.user.email_verified,
            suspended: user.user.suspended,
            identity_document: user.user.identity_document,
        }
    }
}

/// A reference to an uploaded identity document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityDocument {
    pub reference: String,
}

/// A new role for a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// Whether a user should be suspended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SuspensionRequest {
    pub suspended: bool,
}
