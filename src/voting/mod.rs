//! The election lifecycle, whitelist, ballot and result rules.
//!
//! Every operation takes the [`Store`] to work against, the acting user where
//! there is one, and the current time, so that each decision is made against
//! a single explicit instant.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    common::election::ElectionStatus,
    db::election::{Election, ElectionUpdate},
    mongodb::Id,
};
use crate::store::Store;

pub mod accounts;
pub mod ballot;
pub mod lifecycle;
pub mod policy;
pub mod results;
pub mod whitelist;
pub mod window;

/// Load an election, first moving it to finished if its vote has ended.
pub async fn fetch_election(store: &dyn Store, id: Id, now: DateTime<Utc>) -> Result<Election> {
    let election = store
        .election(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("election {id}")))?;

    let expired = election.windows.map_or(false, |w| w.vote_ended(now));
    if election.status != ElectionStatus::Ongoing || !expired {
        return Ok(election);
    }

    let update = ElectionUpdate::status(ElectionStatus::Finish);
    match store
        .update_election(id, ElectionStatus::Ongoing, update)
        .await?
    {
        Some(finished) => {
            info!("Election {id} finished");
            Ok(finished)
        }
        // Someone else moved it first; report where it ended up.
        None => store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("election {id}"))),
    }
}

/// Fail if the election has been terminated.
pub fn ensure_not_terminated(election: &Election) -> Result<()> {
    if election.status == ElectionStatus::Terminate {
        Err(Error::ElectionTerminated)
    } else {
        Ok(())
    }
}
