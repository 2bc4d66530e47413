//! Administration of user accounts: roles and suspension.

use crate::error::{Error, Result};
use crate::model::{common::role::Role, db::user::User, mongodb::Id};
use crate::store::Store;

use super::policy::{authorize, Action, Actor};

/// Every account, or only those holding the given role.
pub async fn list_users(
    store: &dyn Store,
    actor: &Actor,
    role: Option<Role>,
) -> Result<Vec<User>> {
    authorize(actor, Action::ManageUsers)?;
    store.users(role).await
}

/// Give a user a new role.
///
/// Administrators are only ever created from configuration, so the admin
/// role can neither be granted nor taken away here.
pub async fn assign_role(
    store: &dyn Store,
    actor: &Actor,
    user_id: Id,
    role: Role,
) -> Result<User> {
    authorize(actor, Action::ManageUsers)?;
    if role == Role::Admin {
        return Err(Error::BadRequest("the admin role cannot be assigned".to_string()));
    }
    let target = managed_user(store, actor, user_id).await?;
    if target.role == role {
        return Ok(target);
    }

    let user = store
        .set_user_role(user_id, role)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {user_id}")))?;
    info!(
        "User {user_id} changed from {} to {role} by {}",
        target.role, actor.id
    );
    Ok(user)
}

/// Suspend or reinstate a user. A suspended user can neither log in nor use
/// a token issued before the suspension.
pub async fn set_suspended(
    store: &dyn Store,
    actor: &Actor,
    user_id: Id,
    suspended: bool,
) -> Result<User> {
    authorize(actor, Action::ManageUsers)?;
    let target = managed_user(store, actor, user_id).await?;
    if target.suspended == suspended {
        return Ok(target);
    }

    let user = store
        .set_user_suspended(user_id, suspended)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {user_id}")))?;
    if suspended {
        info!("User {user_id} suspended by {}", actor.id);
    } else {
        info!("User {user_id} reinstated by {}", actor.id);
    }
    Ok(user)
}

/// Load a user the actor may manage: anyone but an administrator.
async fn managed_user(store: &dyn Store, actor: &Actor, user_id: Id) -> Result<User> {
    if user_id == actor.id {
        return Err(Error::unauthorized(
            "administrators may not change their own account",
        ));
    }
    let user = store
        .user(user_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {user_id}")))?;
    if user.role == Role::Admin {
        return Err(Error::unauthorized("administrator accounts cannot be changed"));
    }
    Ok(user)
}
