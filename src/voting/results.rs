//! Results of finished elections.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::election::ElectionResult,
    common::election::ElectionStatus,
    db::candidate::Candidate,
    mongodb::Id,
};
use crate::store::Store;

use super::{fetch_election, lifecycle};

/// The candidate with the highest tally. Ties go to whoever comes first in
/// ballot order.
pub fn leader(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(best) if best.tally >= candidate.tally => Some(best),
        _ => Some(candidate),
    })
}

/// The result of a single finished election.
///
/// The first read pins the winner; every later read reports the pinned
/// winner without recomputing it.
pub async fn finished_result(
    store: &dyn Store,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<ElectionResult> {
    let mut election = fetch_election(store, election_id, now).await?;
    if election.status != ElectionStatus::Finish {
        return Err(Error::not_found(format!("finished election {election_id}")));
    }
    let candidates = store.candidates(election_id).await?;

    if election.winner.is_none() {
        if let Some(leader) = leader(&candidates) {
            election.election.winner = store.pin_winner(election_id, leader.id).await?;
            info!(
                "Pinned winner of election {election_id}: candidate {}",
                leader.id
            );
        }
    }

    Ok(ElectionResult {
        winner: election.winner,
        total_whitelists: store.count_whitelists(election_id).await?,
        total_voters: store.count_ballots(election_id).await?,
        ballots: Some(store.ballots(election_id).await?),
        candidates,
        election,
    })
}

/// Every finished election with its tallies. Winners are reported as pinned
/// so far, and none are pinned here.
pub async fn finished_results(store: &dyn Store, now: DateTime<Utc>) -> Result<Vec<ElectionResult>> {
    lifecycle::sweep(store, now).await?;
    let mut results = Vec::new();
    for election in store.elections(Some(ElectionStatus::Finish)).await? {
        let id = election.id;
        results.push(ElectionResult {
            winner: election.winner,
            candidates: store.candidates(id).await?,
            total_whitelists: store.count_whitelists(id).await?,
            total_voters: store.count_ballots(id).await?,
            ballots: None,
            election,
        });
    }
    Ok(results)
}
