//! Casting ballots, and the administrative correction that undoes them.
//!
//! Recording a ballot and counting it happen as one write, as do voiding a
//! ballot and uncounting it, so every candidate's tally always equals the
//! number of valid ballots naming them.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    common::election::ElectionStatus,
    db::ballot::{Ballot, BallotCore},
    mongodb::Id,
};
use crate::store::Store;

use super::policy::{authorize, Action, Actor};
use super::whitelist::eligible_entry;
use super::{ensure_not_terminated, fetch_election};

/// Cast the actor's single ballot in an election.
pub async fn cast_vote(
    store: &dyn Store,
    actor: &Actor,
    election_id: Id,
    candidate_id: Id,
    transaction: Option<String>,
    now: DateTime<Utc>,
) -> Result<Ballot> {
    authorize(actor, Action::CastVote)?;

    let election = fetch_election(store, election_id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Ongoing {
        return Err(Error::NotOngoing);
    }
    match election.windows {
        Some(windows) if windows.voting_open(now) => {}
        _ => return Err(Error::OutOfWindow),
    }

    let entry = eligible_entry(store, election_id, actor.id).await?;

    // The store rejects candidates from other elections atomically, but an
    // early check gives a clean error without starting a write.
    let candidates = store.candidates(election_id).await?;
    if !candidates.iter().any(|c| c.id == candidate_id) {
        return Err(Error::InvalidCandidate);
    }

    let ballot = store
        .record_ballot(BallotCore {
            election_id,
            whitelist_id: entry.id,
            candidate_id,
            valid: true,
            transaction,
            cast_at: now,
        })
        .await?;
    debug!("Recorded ballot {} in election {election_id}", ballot.id);
    Ok(ballot)
}

/// Void every ballot cast under a whitelist entry and take them off the
/// tally. Allowed until a grace period after voting closes. Voiding an
/// already void ballot changes nothing.
pub async fn invalidate_ballot(
    store: &dyn Store,
    actor: &Actor,
    entry_id: Id,
    now: DateTime<Utc>,
) -> Result<Vec<Ballot>> {
    authorize(actor, Action::InvalidateBallot)?;

    let entry = store
        .whitelist_entry(entry_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("whitelist entry {entry_id}")))?;
    let election = fetch_election(store, entry.election_id, now).await?;
    ensure_not_terminated(&election)?;
    let windows = election
        .windows
        .ok_or_else(|| Error::not_found("vote window of election"))?;
    if now > windows.correction_deadline() {
        return Err(Error::WindowExpired);
    }

    let ballots = store.invalidate_ballots(entry_id).await?;
    warn!(
        "Administrator {} invalidated {} ballot(s) of whitelist entry {entry_id}",
        actor.id,
        ballots.len()
    );
    Ok(ballots)
}
