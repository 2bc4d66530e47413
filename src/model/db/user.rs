use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{api::auth::hash_password, common::role::Role, mongodb::Id};
use crate::store::Store;

/// Core user account data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    /// SHA-256 digest of the outstanding email verification token.
    pub verification_digest: Option<String>,
    pub suspended: bool,
    /// File-storage reference of the uploaded identity document.
    pub identity_document: Option<String>,
    #[serde(default)]
    pub password_reset: Option<PasswordReset>,
}

/// An outstanding request to reset a forgotten password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    /// SHA-256 digest of the emailed reset token.
    pub digest: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed hash can never match.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    /// Whether this account may currently log in and act.
    pub fn is_active(&self) -> bool {
        self.email_verified && !self.suspended
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl User {
    pub fn new(user: NewUser) -> Self {
        Self {
            id: Id::new(),
            user,
        }
    }
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Create the first administrator from the configured credentials, unless
/// some administrator already exists.
pub async fn ensure_admin_exists(store: &dyn Store, email: &str, password: &str) -> Result<()> {
    if store.admin_exists().await? {
        return Ok(());
    }
    let admin = NewUser {
        email: email.trim().to_lowercase(),
        name: "Administrator".to_string(),
        password_hash: hash_password(password)?,
        role: Role::Admin,
        email_verified: true,
        verification_digest: None,
        suspended: false,
        identity_document: None,
        password_reset: None,
    };
    let admin = store.insert_user(admin).await?;
    warn!("No administrator found, created {}", admin.email);
    Ok(())
}
