use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        ballot::{BallotDescription, VoteRequest},
    },
    mongodb::Id,
};
use crate::store::Repo;
use crate::voting::ballot;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, invalidate_ballot]
}

#[post("/elections/<id>/vote", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken,
    id: Id,
    vote: Json<VoteRequest>,
    repo: Repo,
) -> Result<Json<BallotDescription>> {
    let VoteRequest {
        candidate_id,
        transaction,
    } = vote.0;
    let ballot = ballot::cast_vote(
        &*repo,
        &token.actor(),
        id,
        candidate_id,
        transaction,
        Utc::now(),
    )
    .await?;
    Ok(Json(ballot.into()))
}

/// Void the ballots cast under a whitelist entry.
#[put("/whitelist/<entry_id>/invalidate")]
async fn invalidate_ballot(
    token: AuthToken,
    entry_id: Id,
    repo: Repo,
) -> Result<Json<Vec<BallotDescription>>> {
    let ballots = ballot::invalidate_ballot(&*repo, &token.actor(), entry_id, Utc::now()).await?;
    Ok(Json(ballots.into_iter().map(Into::into).collect()))
}
