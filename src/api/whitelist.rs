use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        whitelist::{DecisionRequest, WhitelistDescription, WhitelistGroups, WhitelistRequest},
    },
    mongodb::Id,
};
use crate::notify::Postman;
use crate::store::Repo;
use crate::voting::whitelist;

pub fn routes() -> Vec<Route> {
    routes![register_whitelist, list_whitelist, decide_whitelist]
}

#[post("/elections/<id>/whitelist", data = "<request>", format = "json")]
async fn register_whitelist(
    token: AuthToken,
    id: Id,
    request: Json<WhitelistRequest>,
    repo: Repo,
) -> Result<Json<WhitelistDescription>> {
    let entry =
        whitelist::register(&*repo, &token.actor(), id, &request.address, Utc::now()).await?;
    Ok(Json(entry.into()))
}

#[get("/elections/<id>/whitelist")]
async fn list_whitelist(token: AuthToken, id: Id, repo: Repo) -> Result<Json<WhitelistGroups>> {
    let groups = whitelist::list(&*repo, &token.actor(), id, Utc::now()).await?;
    Ok(Json(groups))
}

#[put("/whitelist/<entry_id>", data = "<decision>", format = "json")]
async fn decide_whitelist(
    token: AuthToken,
    entry_id: Id,
    decision: Json<DecisionRequest>,
    repo: Repo,
    postman: Postman,
) -> Result<Json<WhitelistDescription>> {
    let entry = whitelist::decide(
        &*repo,
        &postman,
        &token.actor(),
        entry_id,
        decision.status,
        Utc::now(),
    )
    .await?;
    Ok(Json(entry.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{from_str, json},
    };

    use crate::api::testing::{self, Phase};
    use crate::model::{
        common::whitelist::{WhitelistDecision, WhitelistStatus},
        db::user::UserCore,
    };
    use crate::notify::{recording::Outbox, Notification};

    use super::*;

    async fn register_expect_status<'c>(
        client: &'c Client,
        id: Id,
        address: &str,
        status: Status,
    ) -> LocalResponse<'c> {
        let response = client
            .post(uri!(register_whitelist(id)))
            .header(ContentType::JSON)
            .body(json!({ "address": address }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }

    async fn decide_expect_status<'c>(
        client: &'c Client,
        entry_id: Id,
        decision: WhitelistDecision,
        status: Status,
    ) -> LocalResponse<'c> {
        let response = client
            .put(uri!(decide_whitelist(entry_id)))
            .header(ContentType::JSON)
            .body(json!({ "status": decision }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }

    #[backend_test(voter)]
    async fn register(client: Client, repo: Repo) {
        let election = testing::election(&repo, Phase::Whitelisting, Vec::new()).await;

        let response =
            register_expect_status(&client, election.id, "0xA11CE", Status::Ok).await;
        let entry: WhitelistDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(entry.status, WhitelistStatus::Pending);
        assert_eq!(entry.address, "0xA11CE");
        assert_eq!(entry.email, UserCore::example_voter().email);

        // One registration per user, whatever the address.
        register_expect_status(&client, election.id, "0xB0B", Status::Conflict).await;

        // Voters may not see the whitelist.
        let response = client.get(uri!(list_whitelist(election.id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[backend_test(voter)]
    async fn register_outside_window(client: Client, repo: Repo) {
        let voting = testing::election(&repo, Phase::Voting, Vec::new()).await;
        register_expect_status(&client, voting.id, "0xA11CE", Status::Forbidden).await;

        register_expect_status(&client, Id::new(), "0xA11CE", Status::NotFound).await;
    }

    #[backend_test(admin)]
    async fn decide_and_notify(client: Client, repo: Repo, outbox: Outbox) {
        repo.insert_user(UserCore::example_voter()).await.unwrap();
        repo.insert_user(UserCore::example_voter2()).await.unwrap();
        let election = testing::election(&repo, Phase::Whitelisting, Vec::new()).await;
        let first = testing::entry(
            &repo,
            &election,
            UserCore::example_voter(),
            "0xA11CE",
            WhitelistStatus::Pending,
        )
        .await;
        let second = testing::entry(
            &repo,
            &election,
            UserCore::example_voter2(),
            "0xB0B",
            WhitelistStatus::Pending,
        )
        .await;

        let response =
            decide_expect_status(&client, first.id, WhitelistDecision::Accept, Status::Ok).await;
        let decided: WhitelistDescription =
            from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(decided.status, WhitelistStatus::Accept);
        decide_expect_status(&client, second.id, WhitelistDecision::Decline, Status::Ok).await;
        decide_expect_status(&client, Id::new(), WhitelistDecision::Accept, Status::NotFound)
            .await;

        // Both users were told.
        let sent = outbox.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, UserCore::example_voter().email);
        assert_eq!(
            sent[0].1,
            Notification::WhitelistAccepted {
                election_id: election.id.into(),
                entry_id: first.id.into(),
            }
        );
        assert_eq!(sent[1].0, UserCore::example_voter2().email);
        assert_eq!(sent[1].1.template(), "whitelist-declined");

        // The admin sees the entries grouped.
        let response = client.get(uri!(list_whitelist(election.id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let groups: WhitelistGroups = from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(groups.pending.is_empty());
        assert_eq!(groups.accepted.len(), 1);
        assert_eq!(*groups.accepted[0].id, first.id);
        assert_eq!(groups.declined.len(), 1);
        assert_eq!(*groups.declined[0].id, second.id);
    }

    #[backend_test(witness)]
    async fn witnesses_view_but_do_not_decide(client: Client, repo: Repo) {
        repo.insert_user(UserCore::example_voter()).await.unwrap();
        let election = testing::election(&repo, Phase::Whitelisting, Vec::new()).await;
        let entry = testing::entry(
            &repo,
            &election,
            UserCore::example_voter(),
            "0xA11CE",
            WhitelistStatus::Pending,
        )
        .await;

        let response = client.get(uri!(list_whitelist(election.id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let groups: WhitelistGroups = from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(groups.pending.len(), 1);

        decide_expect_status(&client, entry.id, WhitelistDecision::Accept, Status::Forbidden)
            .await;
    }
}
