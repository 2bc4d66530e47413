use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        user::{RoleRequest, SuspensionRequest, UserDescription},
    },
    common::role::Role,
    mongodb::Id,
};
use crate::store::Repo;
use crate::voting::accounts;

pub fn routes() -> Vec<Route> {
    routes![list_users, assign_role, set_suspension]
}

#[get("/users?<role>")]
async fn list_users(
    token: AuthToken,
    role: Option<Role>,
    repo: Repo,
) -> Result<Json<Vec<UserDescription>>> {
    let users = accounts::list_users(&*repo, &token.actor(), role).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[put("/users/<id>/role", data = "<request>", format = "json")]
async fn assign_role(
    token: AuthToken,
    id: Id,
    request: Json<RoleRequest>,
    repo: Repo,
) -> Result<Json<UserDescription>> {
    let user = accounts::assign_role(&*repo, &token.actor(), id, request.role).await?;
    Ok(Json(user.into()))
}

#[put("/users/<id>/suspension", data = "<request>", format = "json")]
async fn set_suspension(
    token: AuthToken,
    id: Id,
    request: Json<SuspensionRequest>,
    repo: Repo,
) -> Result<Json<UserDescription>> {
    let user = accounts::set_suspended(&*repo, &token.actor(), id, request.suspended).await?;
    Ok(Json(user.into()))
}
