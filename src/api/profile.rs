use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::api::{
    auth::{check_password, hash_password, AuthToken, PasswordChange},
    user::{IdentityDocument, UserDescription},
};
use crate::store::Repo;

pub fn routes() -> Vec<Route> {
    routes![get_profile, bind_identity_document, change_password]
}

#[get("/profile")]
async fn get_profile(token: AuthToken, repo: Repo) -> Result<Json<UserDescription>> {
    let user = repo
        .user(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", token.id)))?;
    Ok(Json(user.into()))
}

/// Record where the user's uploaded identity document is kept. This
/// completes the profile required to join whitelists.
#[put("/profile/identity-document", data = "<document>", format = "json")]
async fn bind_identity_document(
    token: AuthToken,
    document: Json<IdentityDocument>,
    repo: Repo,
) -> Result<Json<UserDescription>> {
    let reference = document.0.reference.trim().to_string();
    if reference.is_empty() {
        return Err(Error::BadRequest(
            "identity document reference must not be empty".to_string(),
        ));
    }
    let user = repo
        .set_identity_document(token.id, reference)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", token.id)))?;
    info!("User {} bound an identity document", user.id);
    Ok(Json(user.into()))
}

/// Replace the user's password, given the current one.
#[put("/profile/password", data = "<change>", format = "json")]
async fn change_password(
    token: AuthToken,
    change: Json<PasswordChange>,
    repo: Repo,
) -> Result<Json<UserDescription>> {
    let user = repo
        .user(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", token.id)))?;
    if !user.verify_password(&change.old_password) {
        return Err(Error::BadRequest("old password is incorrect".to_string()));
    }
    check_password(&change.new_password)?;

    let user = repo
        .set_password_hash(token.id, hash_password(&change.new_password)?)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", token.id)))?;
    info!("User {} changed their password", user.id);
    Ok(Json(user.into()))
}
