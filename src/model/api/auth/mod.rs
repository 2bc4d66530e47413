mod credentials;
mod token;

pub use credentials::{
    check_password, hash_password, new_verification_token, token_digest, Credentials,
    ForgottenPassword, NewPassword, PasswordChange, Registration, MIN_PASSWORD_LENGTH,
};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
