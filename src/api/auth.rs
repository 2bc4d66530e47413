use chrono::Utc;
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{
            check_password, hash_password, new_verification_token, token_digest, AuthToken,
            Credentials, ForgottenPassword, NewPassword, Registration, AUTH_TOKEN_COOKIE,
        },
        user::UserDescription,
    },
    db::user::{NewUser, PasswordReset},
};
use crate::notify::{Notification, Postman};
use crate::store::Repo;

pub fn routes() -> Vec<Route> {
    routes![
        register,
        verify_email,
        login,
        logout,
        forgot_password,
        reset_password
    ]
}

#[post("/auth/register", data = "<registration>", format = "json")]
async fn register(
    registration: Json<Registration>,
    repo: Repo,
    postman: Postman,
) -> Result<Json<UserDescription>> {
    let mut user = NewUser::try_from(registration.0)?;
    let token = new_verification_token();
    user.verification_digest = Some(token_digest(&token));

    let user = repo.insert_user(user).await?;
    info!("Registered user {}", user.id);

    postman
        .send_or_warn(&user.email, &Notification::VerifyEmail { token })
        .await;

    Ok(Json(user.into()))
}

#[get("/auth/verify/<token>")]
async fn verify_email(token: &str, repo: Repo) -> Result<Json<UserDescription>> {
    let user = repo
        .verify_email(&token_digest(token))
        .await?
        .ok_or_else(|| Error::not_found("verification token"))?;
    info!("Verified email of user {}", user.id);
    Ok(Json(user.into()))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<Credentials>,
    repo: Repo,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let email = credentials.email.trim().to_lowercase();
    let user = repo
        .user_by_email(&email)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or(Error::Unauthenticated)?;

    if !user.email_verified {
        return Err(Error::unauthorized("email address has not been verified"));
    }
    if user.suspended {
        return Err(Error::unauthorized("account is suspended"));
    }

    let token = AuthToken::new(&user);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(user.into()))
}

#[delete("/auth")]
fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}

/// Email a password reset token to an active account. The response is the
/// same whether or not the account exists.
#[post("/auth/forgot-password", data = "<request>", format = "json")]
async fn forgot_password(
    request: Json<ForgottenPassword>,
    repo: Repo,
    postman: Postman,
    config: &State<Config>,
) -> Result<Status> {
    let email = request.email.trim().to_lowercase();
    let user = match repo.user_by_email(&email).await? {
        Some(user) if user.is_active() => user,
        _ => {
            debug!("Ignored password reset for unknown or inactive account");
            return Ok(Status::Ok);
        }
    };

    let token = new_verification_token();
    let reset = PasswordReset {
        digest: token_digest(&token),
        expires_at: Utc::now() + config.password_reset_ttl(),
    };
    repo.set_password_reset(user.id, reset).await?;
    info!("Password reset requested for user {}", user.id);

    postman
        .send_or_warn(&user.email, &Notification::ResetPassword { token })
        .await;
    Ok(Status::Ok)
}

#[post("/auth/reset-password/<token>", data = "<request>", format = "json")]
async fn reset_password(
    token: &str,
    request: Json<NewPassword>,
    repo: Repo,
) -> Result<Json<UserDescription>> {
    check_password(&request.password)?;
    let password_hash = hash_password(&request.password)?;
    let user = repo
        .reset_password(&token_digest(token), password_hash, Utc::now())
        .await?
        .ok_or_else(|| Error::not_found("password reset token"))?;
    info!("Password of user {} was reset", user.id);
    Ok(Json(user.into()))
}
