use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        election::{
            DraftUpdate, ElectionDescription, ElectionDetail, ElectionSpec, OngoingUpdate,
            StartRequest, TerminateRequest, TerminationDescription, WindowsSpec,
        },
    },
    common::election::ElectionStatus,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{Repo, Store};
use crate::voting::lifecycle::{self, Termination};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        get_election,
        create_election,
        update_draft_election,
        start_election,
        update_ongoing_election,
        terminate_election,
        de_terminate_election,
        delete_election,
    ]
}

/// Attach an election's candidates.
async fn describe(store: &dyn Store, election: Election) -> Result<ElectionDescription> {
    let candidates = store.candidates(election.id).await?;
    Ok(ElectionDescription::new(election, candidates))
}

#[get("/elections?<status>")]
async fn list_elections(
    token: Option<AuthToken>,
    status: Option<ElectionStatus>,
    repo: Repo,
) -> Result<Json<Vec<ElectionDescription>>> {
    let viewer = token.map(|t| t.actor());
    let elections = lifecycle::list(&*repo, viewer.as_ref(), status, Utc::now()).await?;
    let mut descriptions = Vec::with_capacity(elections.len());
    for election in elections {
        descriptions.push(describe(&*repo, election).await?);
    }
    Ok(Json(descriptions))
}

#[get("/elections/<id>")]
async fn get_election(
    token: Option<AuthToken>,
    id: Id,
    repo: Repo,
) -> Result<Json<ElectionDetail>> {
    let viewer = token.map(|t| t.actor());
    let election = lifecycle::get(&*repo, viewer.as_ref(), id, Utc::now()).await?;

    let exceptions = if lifecycle::may_view_exceptions(viewer.as_ref(), &election) {
        let exceptions = repo.exceptions(id).await?;
        Some(exceptions.into_iter().map(Into::into).collect())
    } else {
        None
    };

    Ok(Json(ElectionDetail {
        total_whitelists: repo.count_whitelists(id).await?,
        election: describe(&*repo, election).await?,
        exceptions,
    }))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken,
    spec: Json<ElectionSpec>,
    repo: Repo,
) -> Result<Json<ElectionDescription>> {
    let election = lifecycle::create(&*repo, &token.actor(), spec.0, Utc::now()).await?;
    Ok(Json(describe(&*repo, election).await?))
}

#[patch("/elections/<id>/draft", data = "<update>", format = "json")]
async fn update_draft_election(
    token: AuthToken,
    id: Id,
    update: Json<DraftUpdate>,
    repo: Repo,
) -> Result<Json<ElectionDescription>> {
    let election =
        lifecycle::update_draft(&*repo, &token.actor(), id, update.0, Utc::now()).await?;
    Ok(Json(describe(&*repo, election).await?))
}

#[post("/elections/<id>/start", data = "<request>", format = "json")]
async fn start_election(
    token: AuthToken,
    id: Id,
    request: Json<StartRequest>,
    repo: Repo,
) -> Result<Json<ElectionDescription>> {
    let election = lifecycle::start(&*repo, &token.actor(), id, request.0, Utc::now()).await?;
    Ok(Json(describe(&*repo, election).await?))
}

#[patch("/elections/<id>/ongoing", data = "<update>", format = "json")]
async fn update_ongoing_election(
    token: AuthToken,
    id: Id,
    update: Json<OngoingUpdate>,
    repo: Repo,
) -> Result<Json<ElectionDescription>> {
    let election =
        lifecycle::update_ongoing(&*repo, &token.actor(), id, update.0, Utc::now()).await?;
    Ok(Json(describe(&*repo, election).await?))
}

#[post("/elections/<id>/terminate", data = "<request>", format = "json")]
async fn terminate_election(
    token: AuthToken,
    id: Id,
    request: Json<TerminateRequest>,
    repo: Repo,
) -> Result<Json<TerminationDescription>> {
    let outcome =
        lifecycle::terminate(&*repo, &token.actor(), id, request.0.note, Utc::now()).await?;
    let description = match outcome {
        Termination::Terminated(election) => TerminationDescription::Terminated {
            election: describe(&*repo, election).await?,
        },
        Termination::Objected {
            exception,
            terminated,
        } => TerminationDescription::Objected {
            exception: exception.into(),
            terminated,
        },
    };
    Ok(Json(description))
}

#[post("/elections/<id>/determinate", data = "<windows>", format = "json")]
async fn de_terminate_election(
    token: AuthToken,
    id: Id,
    windows: Json<WindowsSpec>,
    repo: Repo,
) -> Result<Json<ElectionDescription>> {
    let election =
        lifecycle::de_terminate(&*repo, &token.actor(), id, windows.0.into(), Utc::now())
            .await?;
    Ok(Json(describe(&*repo, election).await?))
}

#[delete("/elections/<id>")]
async fn delete_election(token: AuthToken, id: Id, repo: Repo) -> Result<()> {
    lifecycle::delete(&*repo, &token.actor(), id, Utc::now()).await
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{from_str, json, to_string},
    };

    use crate::api::testing::{self, Phase};
    use crate::model::db::{election::CandidatePair, user::UserCore};

    use super::*;

    async fn create_election_for_spec(client: &Client, spec: &ElectionSpec) -> ElectionDescription {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn start_expect_status<'c>(
        client: &'c Client,
        id: Id,
        request: &StartRequest,
        status: Status,
    ) -> LocalResponse<'c> {
        let response = client
            .post(uri!(start_election(id)))
            .header(ContentType::JSON)
            .body(to_string(request).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }

    async fn get_expect_status<'c>(client: &'c Client, id: Id, status: Status) -> LocalResponse<'c> {
        let response = client.get(uri!(get_election(id))).dispatch().await;
        assert_eq!(response.status(), status);
        response
    }

    async fn terminate<'c>(client: &'c Client, id: Id, status: Status) -> LocalResponse<'c> {
        let response = client
            .post(uri!(terminate_election(id)))
            .header(ContentType::JSON)
            .body(json!({ "note": "Ballot box tampering" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }

    async fn list(client: &Client, query: &str) -> Vec<ElectionDescription> {
        let response = client.get(format!("/elections{query}")).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn example_spec(repo: &Repo) -> ElectionSpec {
        let pairs = testing::candidates(repo, 2).await;
        let witnesses = testing::witnesses(repo, 1).await;
        ElectionSpec::example(pairs, witnesses)
    }

    #[backend_test(admin)]
    async fn create_start_get(client: Client, repo: Repo) {
        let spec = example_spec(&repo).await;
        let created = create_election_for_spec(&client, &spec).await;
        assert_eq!(created.status, ElectionStatus::Draft);
        assert_eq!(created.name, spec.name);
        assert_eq!(created.candidates.len(), 2);
        assert_eq!(created.candidates[0].position, 0);
        assert_eq!(*created.candidates[1].lead, spec.candidates[1].lead);
        assert!(created.candidates.iter().all(|c| c.tally == 0));

        // Start it.
        let now = Utc::now();
        let response = start_expect_status(
            &client,
            *created.id,
            &StartRequest::example(now),
            Status::Ok,
        )
        .await;
        let started: ElectionDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(started.status, ElectionStatus::Ongoing);
        assert_eq!(started.public_key.as_deref(), Some("0x5f3c9a"));
        let windows = started.windows.unwrap();
        assert_eq!(windows.whitelist_end, windows.whitelist_start + Duration::hours(2));
        assert_eq!(windows.vote_start, windows.whitelist_end + Duration::hours(1));
        assert_eq!(windows.vote_end, windows.vote_start + Duration::hours(3));

        // It cannot be started twice.
        start_expect_status(
            &client,
            *created.id,
            &StartRequest::example(now),
            Status::Conflict,
        )
        .await;

        // Admins see the exceptions, which there are none of.
        let response = get_expect_status(&client, *created.id, Status::Ok).await;
        let detail: ElectionDetail = from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.election.id, created.id);
        assert_eq!(detail.total_whitelists, 0);
        assert_eq!(detail.exceptions, Some(Vec::new()));
    }

    #[backend_test(admin)]
    async fn start_rejects_bad_windows(client: Client, repo: Repo) {
        let created = create_election_for_spec(&client, &example_spec(&repo).await).await;
        let now = Utc::now();

        // No pause between whitelisting and voting.
        let request = StartRequest {
            pending_duration_hours: 0,
            ..StartRequest::example(now)
        };
        start_expect_status(&client, *created.id, &request, Status::BadRequest).await;

        // Whitelisting opening in the past.
        let request = StartRequest {
            whitelist_start: now - Duration::hours(1),
            ..StartRequest::example(now)
        };
        start_expect_status(&client, *created.id, &request, Status::BadRequest).await;

        // Still a draft.
        let response = get_expect_status(&client, *created.id, Status::Ok).await;
        let detail: ElectionDetail = from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.election.status, ElectionStatus::Draft);
    }

    #[backend_test(admin)]
    async fn create_rejects_unknown_people(client: Client, repo: Repo) {
        let mut spec = example_spec(&repo).await;
        spec.candidates.push(CandidatePair {
            lead: Id::new(),
            deputy: Id::new(),
        });
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert!(repo.elections(None).await.unwrap().is_empty());
    }

    #[backend_test(voter)]
    async fn voters_cannot_manage(client: Client, repo: Repo) {
        let spec = example_spec(&repo).await;
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let election = testing::election(&repo, Phase::Voting, Vec::new()).await;
        terminate(&client, election.id, Status::Forbidden).await;
        let response = client.delete(uri!(delete_election(election.id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[backend_test]
    async fn managing_requires_login(client: Client, repo: Repo) {
        let spec = example_spec(&repo).await;
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(admin)]
    async fn update_draft(client: Client, repo: Repo) {
        let created = create_election_for_spec(&client, &example_spec(&repo).await).await;
        let pairs: Vec<CandidatePair> = created
            .candidates
            .iter()
            .rev()
            .map(|c| CandidatePair {
                lead: *c.lead,
                deputy: *c.deputy,
            })
            .collect();

        let update = DraftUpdate {
            name: Some("By-election".to_string()),
            candidates: Some(pairs.clone()),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_draft_election(*created.id)))
            .header(ContentType::JSON)
            .body(to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let updated: ElectionDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.name, "By-election");
        assert_eq!(updated.organization, created.organization);
        assert_eq!(*updated.candidates[0].lead, pairs[0].lead);
        assert_eq!(updated.candidates[0].position, 0);

        // Ongoing elections are not drafts.
        let ongoing = testing::election(&repo, Phase::Whitelisting, Vec::new()).await;
        let response = client
            .patch(uri!(update_draft_election(ongoing.id)))
            .header(ContentType::JSON)
            .body(to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[backend_test(admin)]
    async fn update_ongoing(client: Client, repo: Repo) {
        let election = testing::election(&repo, Phase::Whitelisting, Vec::new()).await;
        let windows = election.windows.unwrap();

        // Extend voting by an hour.
        let update = OngoingUpdate {
            vote_end: Some(windows.vote_end + Duration::hours(1)),
            description: Some("Extended".to_string()),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_ongoing_election(election.id)))
            .header(ContentType::JSON)
            .body(to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let updated: ElectionDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(
            updated.windows.unwrap().vote_end,
            windows.vote_end + Duration::hours(1)
        );
        assert_eq!(updated.description.as_deref(), Some("Extended"));

        // Voting may not start before whitelisting ends.
        let update = OngoingUpdate {
            vote_start: Some(windows.whitelist_end - Duration::minutes(10)),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_ongoing_election(election.id)))
            .header(ContentType::JSON)
            .body(to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test(admin)]
    async fn terminate_and_reopen(client: Client, repo: Repo) {
        let election = testing::election(&repo, Phase::Voting, Vec::new()).await;

        let response = terminate(&client, election.id, Status::Ok).await;
        let outcome: TerminationDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        let TerminationDescription::Terminated { election: terminated } = &outcome else {
            panic!("Expected termination, got {outcome:?}");
        };
        assert_eq!(terminated.status, ElectionStatus::Terminate);

        // Terminated elections accept no further changes.
        terminate(&client, election.id, Status::Forbidden).await;
        let response = client
            .patch(uri!(update_ongoing_election(election.id)))
            .header(ContentType::JSON)
            .body(to_string(&OngoingUpdate::default()).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        // Reopen with fresh windows.
        let windows = WindowsSpec::example(Utc::now(), 1);
        let response = client
            .post(uri!(de_terminate_election(election.id)))
            .header(ContentType::JSON)
            .body(to_string(&windows).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let reopened: ElectionDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(reopened.status, ElectionStatus::Ongoing);
        assert_eq!(reopened.windows.unwrap().vote_end, windows.vote_end);

        // Only terminated elections can be reopened.
        let response = client
            .post(uri!(de_terminate_election(election.id)))
            .header(ContentType::JSON)
            .body(to_string(&windows).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[backend_test(witness)]
    async fn witness_files_exception(client: Client, repo: Repo) {
        let me = testing::user_id(&repo, UserCore::example_witness(1)).await;
        let mut witnesses = testing::witnesses(&repo, 2).await;
        witnesses.push(me);
        let election = testing::election(&repo, Phase::Voting, witnesses.clone()).await;

        let response = terminate(&client, election.id, Status::Ok).await;
        let outcome: TerminationDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        let TerminationDescription::Objected {
            exception,
            terminated,
        } = &outcome
        else {
            panic!("Expected an objection, got {outcome:?}");
        };
        assert!(!*terminated);
        assert_eq!(*exception.witness_id, me);
        assert_eq!(exception.note, "Ballot box tampering");

        // Witnesses see the exception on the election.
        let response = get_expect_status(&client, election.id, Status::Ok).await;
        let detail: ElectionDetail = from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.election.status, ElectionStatus::Ongoing);
        assert_eq!(detail.exceptions.unwrap(), vec![exception.clone()]);

        // Witnesses not assigned to an election cannot object to it, nor
        // read what others filed against it.
        let other = testing::election(&repo, Phase::Voting, witnesses[..2].to_vec()).await;
        terminate(&client, other.id, Status::Forbidden).await;
        let response = get_expect_status(&client, other.id, Status::Ok).await;
        let detail: ElectionDetail = from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.exceptions, None);
    }

    #[backend_test(admin)]
    async fn delete_drafts_only(client: Client, repo: Repo) {
        let created = create_election_for_spec(&client, &example_spec(&repo).await).await;
        let response = client.delete(uri!(delete_election(*created.id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        get_expect_status(&client, *created.id, Status::NotFound).await;
        assert!(repo.candidates(*created.id).await.unwrap().is_empty());

        let ongoing = testing::election(&repo, Phase::Voting, Vec::new()).await;
        let response = client.delete(uri!(delete_election(ongoing.id))).dispatch().await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[backend_test]
    async fn visibility(client: Client, repo: Repo) {
        let ongoing = testing::election(&repo, Phase::Voting, Vec::new()).await;
        let ended = testing::election(&repo, Phase::Ended, Vec::new()).await;
        let draft = repo
            .insert_election(
                crate::model::db::election::ElectionCore::example(Utc::now()),
                Vec::new(),
            )
            .await
            .unwrap();

        // Anonymous viewers never see drafts.
        get_expect_status(&client, draft.id, Status::NotFound).await;
        let response = get_expect_status(&client, ongoing.id, Status::Ok).await;
        let detail: ElectionDetail = from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.exceptions, None);

        // Listing finishes elections whose vote has ended.
        let all = list(&client, "").await;
        assert_eq!(all.len(), 2);
        let finished = list(&client, "?status=FINISH").await;
        assert_eq!(finished.len(), 1);
        assert_eq!(*finished[0].id, ended.id);
        assert_eq!(finished[0].status, ElectionStatus::Finish);
        assert!(list(&client, "?status=DRAFT").await.is_empty());
    }
}
