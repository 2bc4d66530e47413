//! The single place where roles are checked against actions.

use crate::error::{Error, Result};
use crate::model::{common::role::Role, mongodb::Id};

/// The authenticated user performing an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Id,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Id, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Anything an actor may attempt that needs a capability.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create, edit, start, de-terminate and delete elections.
    ManageElections,
    /// Terminate an election, or object to it as a witness.
    Terminate,
    RegisterWhitelist,
    DecideWhitelist,
    ViewWhitelists,
    /// See the exceptions witnesses have filed.
    ViewExceptions,
    CastVote,
    InvalidateBallot,
    /// List accounts, assign roles and suspend users.
    ManageUsers,
}

impl Action {
    /// Whether the given role holds this capability.
    pub fn permitted_for(self, role: Role) -> bool {
        use Action::*;
        match role {
            Role::Admin => matches!(
                self,
                ManageElections
                    | Terminate
                    | DecideWhitelist
                    | ViewWhitelists
                    | ViewExceptions
                    | InvalidateBallot
                    | ManageUsers
            ),
            Role::Witness => matches!(
                self,
                Terminate | ViewWhitelists | ViewExceptions | RegisterWhitelist | CastVote
            ),
            Role::User | Role::Candidate => matches!(self, RegisterWhitelist | CastVote),
        }
    }
}

/// Fail with [`Error::Unauthorized`] unless the actor may perform the action.
pub fn authorize(actor: &Actor, action: Action) -> Result<()> {
    if action.permitted_for(actor.role) {
        Ok(())
    } else {
        Err(Error::unauthorized(format!(
            "{} may not perform {action:?}",
            actor.role
        )))
    }
}
