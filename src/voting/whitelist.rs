//! Who may register for, and then vote in, an election.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::whitelist::WhitelistGroups,
    common::{
        election::ElectionStatus,
        whitelist::{WhitelistDecision, WhitelistStatus},
    },
    db::whitelist::{WhitelistCore, WhitelistEntry},
    mongodb::Id,
};
use crate::notify::{Notification, Postman};
use crate::store::Store;

use super::policy::{authorize, Action, Actor};
use super::{ensure_not_terminated, fetch_election};

/// Register the actor for an election's whitelist, from the given address.
/// The entry starts out pending an administrator's decision.
pub async fn register(
    store: &dyn Store,
    actor: &Actor,
    election_id: Id,
    address: &str,
    now: DateTime<Utc>,
) -> Result<WhitelistEntry> {
    authorize(actor, Action::RegisterWhitelist)?;
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::BadRequest("address must not be empty".to_string()));
    }

    let election = fetch_election(store, election_id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Ongoing {
        return Err(Error::OutOfWindow);
    }
    match election.windows {
        Some(windows) if windows.whitelist_open(now) => {}
        _ => return Err(Error::OutOfWindow),
    }

    if store
        .whitelist_for_user(election_id, actor.id)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateUser);
    }
    if store
        .whitelist_for_address(election_id, address)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateAddress);
    }

    let user = store
        .user(actor.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", actor.id)))?;
    if user.identity_document.is_none() {
        return Err(Error::ProfileIncomplete(
            "an identity document must be on file".to_string(),
        ));
    }

    // The store re-checks both uniqueness rules, so a concurrent duplicate
    // still fails here.
    let entry = store
        .insert_whitelist(WhitelistCore::pending(
            election_id,
            actor.id,
            address.to_string(),
            user.user.email,
            now,
        ))
        .await?;
    debug!("User {} registered for election {election_id}", actor.id);
    Ok(entry)
}

/// Accept or decline a whitelist entry, then notify its user.
/// Notification is best-effort and never fails the decision.
pub async fn decide(
    store: &dyn Store,
    postman: &Postman,
    actor: &Actor,
    entry_id: Id,
    decision: WhitelistDecision,
    now: DateTime<Utc>,
) -> Result<WhitelistEntry> {
    authorize(actor, Action::DecideWhitelist)?;
    let entry = store
        .whitelist_entry(entry_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("whitelist entry {entry_id}")))?;
    let election = fetch_election(store, entry.election_id, now).await?;
    ensure_not_terminated(&election)?;

    let entry = store
        .set_whitelist_status(entry_id, decision.into())
        .await?
        .ok_or_else(|| Error::not_found(format!("whitelist entry {entry_id}")))?;
    info!("Whitelist entry {entry_id} decided: {decision:?}");

    let notification = match decision {
        WhitelistDecision::Accept => Notification::WhitelistAccepted {
            election_id: entry.election_id.into(),
            entry_id: entry.id.into(),
        },
        WhitelistDecision::Decline => Notification::WhitelistDeclined {
            election_id: entry.election_id.into(),
            entry_id: entry.id.into(),
        },
    };
    postman.send_or_warn(&entry.email, &notification).await;

    Ok(entry)
}

/// The whitelist entry entitling a user to vote in an election, provided
/// they have not voted yet.
pub async fn eligible_entry(
    store: &dyn Store,
    election_id: Id,
    user_id: Id,
) -> Result<WhitelistEntry> {
    let entry = match store.whitelist_for_user(election_id, user_id).await? {
        Some(entry) if entry.status == WhitelistStatus::Accept => entry,
        _ => return Err(Error::NotWhitelisted),
    };
    if store.ballot_for_entry(entry.id).await?.is_some() {
        return Err(Error::AlreadyVoted);
    }
    Ok(entry)
}

/// An election's whitelist, grouped by review state.
pub async fn list(
    store: &dyn Store,
    actor: &Actor,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<WhitelistGroups> {
    authorize(actor, Action::ViewWhitelists)?;
    fetch_election(store, election_id, now).await?;
    Ok(store.whitelists(election_id).await?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::model::db::user::UserCore;
    use crate::notify::recording::RecordingNotifier;
    use crate::voting::fixtures::Fixture;

    #[rocket::async_test]
    async fn registration_window() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        let windows = election.windows.unwrap();

        let early = register(&fx.store, &fx.voter, election.id, "0xabc", fx.now).await;
        assert!(matches!(early, Err(Error::OutOfWindow)));
        let late = register(
            &fx.store,
            &fx.voter,
            election.id,
            "0xabc",
            windows.whitelist_end + Duration::seconds(1),
        )
        .await;
        assert!(matches!(late, Err(Error::OutOfWindow)));

        let entry = register(
            &fx.store,
            &fx.voter,
            election.id,
            " 0xabc ",
            windows.whitelist_end,
        )
        .await
        .unwrap();
        assert_eq!(entry.status, WhitelistStatus::Pending);
        assert_eq!(entry.address, "0xabc");
        assert_eq!(entry.email, "voter@example.com");
    }

    #[rocket::async_test]
    async fn drafts_are_not_open() {
        let fx = Fixture::new().await;
        let draft = fx.draft(2, 0).await;
        let result = register(&fx.store, &fx.voter, draft.id, "0xabc", fx.now).await;
        assert!(matches!(result, Err(Error::OutOfWindow)));
    }

    #[rocket::async_test]
    async fn one_entry_per_user_and_address() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        let now = Fixture::whitelist_time(&election);

        register(&fx.store, &fx.voter, election.id, "0xabc", now)
            .await
            .unwrap();
        let again = register(&fx.store, &fx.voter, election.id, "0xdef", now).await;
        assert!(matches!(again, Err(Error::DuplicateUser)));
        let same_address = register(&fx.store, &fx.voter2, election.id, "0xabc", now).await;
        assert!(matches!(same_address, Err(Error::DuplicateAddress)));

        // The same address may be used in another election.
        let other = fx.ongoing(2, 0).await;
        register(&fx.store, &fx.voter2, other.id, "0xabc", now)
            .await
            .unwrap();
    }

    #[rocket::async_test]
    async fn identity_document_required() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        let bare = fx
            .store
            .insert_user(UserCore {
                identity_document: None,
                email: "bare@example.com".to_string(),
                ..UserCore::example_voter()
            })
            .await
            .unwrap();
        let actor = Actor::new(bare.id, bare.role);
        let result = register(
            &fx.store,
            &actor,
            election.id,
            "0xabc",
            Fixture::whitelist_time(&election),
        )
        .await;
        assert!(matches!(result, Err(Error::ProfileIncomplete(_))));
    }

    #[rocket::async_test]
    async fn admins_do_not_register() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        let result = register(
            &fx.store,
            &fx.admin,
            election.id,
            "0xabc",
            Fixture::whitelist_time(&election),
        )
        .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[rocket::async_test]
    async fn decisions_notify() {
        let fx = Fixture::new().await;
        let notifier = RecordingNotifier::new();
        let outbox = notifier.outbox.clone();
        let postman = Postman::new(notifier);
        let election = fx.ongoing(2, 0).await;
        let now = Fixture::whitelist_time(&election);
        let entry = register(&fx.store, &fx.voter, election.id, "0xabc", now)
            .await
            .unwrap();

        let result = decide(
            &fx.store,
            &postman,
            &fx.voter,
            entry.id,
            WhitelistDecision::Accept,
            now,
        )
        .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert!(outbox.sent().is_empty());

        let decided = decide(
            &fx.store,
            &postman,
            &fx.admin,
            entry.id,
            WhitelistDecision::Decline,
            now,
        )
        .await
        .unwrap();
        assert_eq!(decided.status, WhitelistStatus::Decline);
        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "voter@example.com");
        assert_eq!(sent[0].1.template(), "whitelist-declined");
    }

    #[rocket::async_test]
    async fn failed_notifications_do_not_fail_decisions() {
        let fx = Fixture::new().await;
        let postman = Postman::new(RecordingNotifier::failing());
        let election = fx.ongoing(2, 0).await;
        let now = Fixture::whitelist_time(&election);
        let entry = register(&fx.store, &fx.voter, election.id, "0xabc", now)
            .await
            .unwrap();
        let decided = decide(
            &fx.store,
            &postman,
            &fx.admin,
            entry.id,
            WhitelistDecision::Accept,
            now,
        )
        .await
        .unwrap();
        assert_eq!(decided.status, WhitelistStatus::Accept);
    }

    #[rocket::async_test]
    async fn eligibility() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;

        let none = eligible_entry(&fx.store, election.id, fx.voter.id).await;
        assert!(matches!(none, Err(Error::NotWhitelisted)));

        fx.decided_entry(&election, &fx.voter2, "0xdef", WhitelistDecision::Decline)
            .await;
        let declined = eligible_entry(&fx.store, election.id, fx.voter2.id).await;
        assert!(matches!(declined, Err(Error::NotWhitelisted)));

        let accepted = fx.accepted_entry(&election, &fx.voter, "0xabc").await;
        let eligible = eligible_entry(&fx.store, election.id, fx.voter.id)
            .await
            .unwrap();
        assert_eq!(eligible.id, accepted.id);
    }

    #[rocket::async_test]
    async fn grouped_listing() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        fx.accepted_entry(&election, &fx.voter, "0xabc").await;
        let now = Fixture::whitelist_time(&election);
        register(&fx.store, &fx.voter2, election.id, "0xdef", now)
            .await
            .unwrap();

        let groups = list(&fx.store, &fx.witnesses[0], election.id, now)
            .await
            .unwrap();
        assert_eq!(groups.accepted.len(), 1);
        assert_eq!(groups.pending.len(), 1);
        assert!(groups.declined.is_empty());

        let result = list(&fx.store, &fx.voter, election.id, now).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }
}
