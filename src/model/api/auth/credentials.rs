use argon2::Config;
use data_encoding::{BASE32_NOPAD, HEXLOWER};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::{common::role::Role, db::user::NewUser};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Config::default(),
    )?)
}

/// Fail unless the password meets the minimum length.
pub fn check_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// A random token to be emailed to a user, to verify their address or reset
/// their password.
pub fn new_verification_token() -> String {
    let mut bytes = [0_u8; 20];
    rand::thread_rng().fill(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

/// The form in which a verification token is stored.
pub fn token_digest(token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}

/// Login credentials, received from a user.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// A new account request. The password is in plaintext and is never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// A request to email a password reset token to an account.
#[derive(Clone, Deserialize, Serialize)]
pub struct ForgottenPassword {
    pub email: String,
}

/// A replacement password, sent with a reset token.
#[derive(Clone, Deserialize, Serialize)]
pub struct NewPassword {
    pub password: String,
}

/// A logged-in user's change of password.
#[derive(Clone, Deserialize, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl TryFrom<Registration> for NewUser {
    type Error = Error;

    /// Convert a [`Registration`] into an unverified user by hashing the
    /// password. The email and name must be non-empty, and the password must
    /// meet the minimum length.
    fn try_from(registration: Registration) -> Result<Self> {
        let email = registration.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::BadRequest("Invalid email address".to_string()));
        }
        if registration.name.trim().is_empty() {
            return Err(Error::BadRequest("Name must not be empty".to_string()));
        }
        check_password(&registration.password)?;

        Ok(Self {
            email,
            name: registration.name.trim().to_string(),
            password_hash: hash_password(&registration.password)?,
            role: Role::User,
            email_verified: false,
            verification_digest: None,
            suspended: false,
            identity_document: None,
            password_reset: None,
        })
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Registration {
        pub fn example() -> Self {
            Self {
                email: "New.User@Example.com".into(),
                name: "Nia Newcomer".into(),
                password: "correct horse".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_hashes_password() {
        let user = NewUser::try_from(Registration::example()).unwrap();
        assert_eq!(user.email, "new.user@example.com");
        assert_eq!(user.role, Role::User);
        assert!(!user.email_verified);
        assert!(user.verify_password("correct horse"));
        assert_ne!(user.password_hash, "correct horse");
    }

    #[test]
    fn registration_rejects_bad_input() {
        let short = Registration {
            password: "short".into(),
            ..Registration::example()
        };
        assert!(matches!(NewUser::try_from(short), Err(Error::BadRequest(_))));

        let no_email = Registration {
            email: "  ".into(),
            ..Registration::example()
        };
        assert!(matches!(
            NewUser::try_from(no_email),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn verification_tokens() {
        let token = new_verification_token();
        assert_eq!(token.len(), 32);
        assert_ne!(token, new_verification_token());
        let digest = token_digest(&token);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest(&token));
    }
}
