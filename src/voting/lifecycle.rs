//! The election state machine.
//!
//! ```text
//! DRAFT --start--> ONGOING --vote ends--> FINISH
//!                   |   ^
//!        terminate  |   |  de-terminate
//!                   v   |
//!                 TERMINATE
//! ```
//!
//! Drafts may also be deleted. Nothing but de-termination may act on a
//! terminated election.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{DraftUpdate, ElectionSpec, OngoingUpdate, StartRequest},
    common::{election::ElectionStatus, role::Role},
    db::{
        election::{CandidatePair, Election, ElectionCore, ElectionUpdate, ElectionWindows},
        exception::{ExceptionCore, WitnessException},
    },
    mongodb::Id,
};
use crate::store::Store;

use super::policy::{authorize, Action, Actor};
use super::{ensure_not_terminated, fetch_election};

/// Distinct objecting witnesses needed before an election is terminated,
/// provided they are also a majority of its witnesses.
pub const WITNESS_QUORUM_MIN: usize = 2;

/// What came of a termination request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// An administrator terminated the election.
    Terminated(Election),
    /// A witness's objection was recorded. `terminated` is set if it
    /// completed a quorum and the election was terminated as a result.
    Objected {
        exception: WitnessException,
        terminated: bool,
    },
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Every candidate must be a pair of distinct, existing users.
async fn check_candidates(store: &dyn Store, pairs: &[CandidatePair]) -> Result<()> {
    if pairs.is_empty() {
        return Err(Error::BadRequest(
            "An election needs at least one candidate".to_string(),
        ));
    }
    for pair in pairs {
        if pair.lead == pair.deputy {
            return Err(Error::BadRequest(format!(
                "Candidate {} cannot be their own deputy",
                pair.lead
            )));
        }
        for id in [pair.lead, pair.deputy] {
            if store.user(id).await?.is_none() {
                return Err(Error::BadRequest(format!("No such user: {id}")));
            }
        }
    }
    Ok(())
}

/// Every witness must be an existing user with the witness role.
/// Returns them with duplicates removed, in order.
async fn check_witnesses(store: &dyn Store, witnesses: Vec<Id>) -> Result<Vec<Id>> {
    let mut seen = HashSet::new();
    let mut checked = Vec::new();
    for id in witnesses {
        if !seen.insert(id) {
            continue;
        }
        match store.user(id).await? {
            Some(user) if user.role == Role::Witness => checked.push(id),
            _ => return Err(Error::BadRequest(format!("No such witness: {id}"))),
        }
    }
    Ok(checked)
}

/// Create a draft election together with its candidates.
pub async fn create(
    store: &dyn Store,
    actor: &Actor,
    spec: ElectionSpec,
    now: DateTime<Utc>,
) -> Result<Election> {
    authorize(actor, Action::ManageElections)?;
    require_text("name", &spec.name)?;
    require_text("organization", &spec.organization)?;
    check_candidates(store, &spec.candidates).await?;
    let witnesses = check_witnesses(store, spec.witnesses).await?;

    let core = ElectionCore::draft(
        spec.name,
        spec.organization,
        spec.description,
        witnesses,
        now,
    );
    let election = store.insert_election(core, spec.candidates).await?;
    info!("Created draft election {}", election.id);
    Ok(election)
}

/// Edit a draft election. New candidates replace the old set entirely.
pub async fn update_draft(
    store: &dyn Store,
    actor: &Actor,
    id: Id,
    update: DraftUpdate,
    now: DateTime<Utc>,
) -> Result<Election> {
    authorize(actor, Action::ManageElections)?;
    let election = fetch_election(store, id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Draft {
        return Err(Error::NotDraft);
    }

    if let Some(ref name) = update.name {
        require_text("name", name)?;
    }
    if let Some(ref organization) = update.organization {
        require_text("organization", organization)?;
    }
    if let Some(ref pairs) = update.candidates {
        check_candidates(store, pairs).await?;
    }
    let witnesses = match update.witnesses {
        Some(witnesses) => Some(check_witnesses(store, witnesses).await?),
        None => None,
    };

    let update = ElectionUpdate {
        name: update.name,
        organization: update.organization,
        description: update.description,
        witnesses,
        candidates: update.candidates,
        ..Default::default()
    };
    store
        .update_election(id, ElectionStatus::Draft, update)
        .await?
        .ok_or(Error::NotDraft)
}

/// Start a draft election, fixing its windows from the requested start and
/// durations.
pub async fn start(
    store: &dyn Store,
    actor: &Actor,
    id: Id,
    request: StartRequest,
    now: DateTime<Utc>,
) -> Result<Election> {
    authorize(actor, Action::ManageElections)?;
    let election = fetch_election(store, id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Draft || election.windows.is_some() {
        return Err(Error::NotDraft);
    }
    require_text("public_key", &request.public_key)?;

    let windows = ElectionWindows::from_durations(
        request.whitelist_start,
        request.whitelist_duration_hours,
        request.pending_duration_hours,
        request.vote_duration_hours,
    )
    .map_err(Error::InvalidWindow)?;
    windows.validate(now).map_err(Error::InvalidWindow)?;

    let update = ElectionUpdate {
        status: Some(ElectionStatus::Ongoing),
        windows: Some(windows),
        public_key: Some(request.public_key),
        ..Default::default()
    };
    let started = store
        .update_election(id, ElectionStatus::Draft, update)
        .await?
        .ok_or(Error::NotDraft)?;
    info!(
        "Started election {id}: whitelist from {}, voting until {}",
        windows.whitelist_start, windows.vote_end
    );
    Ok(started)
}

/// Edit an ongoing election. Window changes must keep every window ordered
/// and may not move a boundary into the past.
pub async fn update_ongoing(
    store: &dyn Store,
    actor: &Actor,
    id: Id,
    update: OngoingUpdate,
    now: DateTime<Utc>,
) -> Result<Election> {
    authorize(actor, Action::ManageElections)?;
    let election = fetch_election(store, id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Ongoing {
        return Err(Error::NotOngoing);
    }
    let current = election
        .windows
        .ok_or_else(|| Error::Internal(format!("Ongoing election {id} has no windows")))?;

    let window_update = update.windows();
    let windows = if window_update.is_empty() {
        None
    } else {
        Some(
            current
                .merge(&window_update, now)
                .map_err(Error::InvalidWindow)?,
        )
    };
    if let Some(ref key) = update.public_key {
        require_text("public_key", key)?;
    }

    let update = ElectionUpdate {
        windows,
        description: update.description,
        public_key: update.public_key,
        ..Default::default()
    };
    store
        .update_election(id, ElectionStatus::Ongoing, update)
        .await?
        .ok_or(Error::NotOngoing)
}

/// Terminate an ongoing election.
///
/// Administrators terminate outright. Witnesses of the election instead file
/// an exception; once enough distinct witnesses have done so the election is
/// terminated.
pub async fn terminate(
    store: &dyn Store,
    actor: &Actor,
    id: Id,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Termination> {
    authorize(actor, Action::Terminate)?;
    let election = fetch_election(store, id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Ongoing {
        return Err(Error::NotOngoing);
    }

    if actor.is_admin() {
        let terminated = store
            .update_election(
                id,
                ElectionStatus::Ongoing,
                ElectionUpdate::status(ElectionStatus::Terminate),
            )
            .await?
            .ok_or(Error::NotOngoing)?;
        warn!("Election {id} terminated by administrator {}", actor.id);
        return Ok(Termination::Terminated(terminated));
    }

    if !election.witnesses.contains(&actor.id) {
        return Err(Error::unauthorized("not a witness of this election"));
    }
    let exception = store
        .insert_exception(ExceptionCore {
            election_id: id,
            witness_id: actor.id,
            note: note.unwrap_or_default(),
            filed_at: now,
        })
        .await?;
    warn!("Witness {} filed an exception against election {id}", actor.id);

    let terminated = if witness_quorum_reached(store, &election).await? {
        let terminated = store
            .update_election(
                id,
                ElectionStatus::Ongoing,
                ElectionUpdate::status(ElectionStatus::Terminate),
            )
            .await?
            .is_some();
        if terminated {
            warn!("Election {id} terminated by witness quorum");
        }
        terminated
    } else {
        false
    };

    Ok(Termination::Objected {
        exception,
        terminated,
    })
}

/// Whether enough distinct assigned witnesses have objected to the election.
async fn witness_quorum_reached(store: &dyn Store, election: &Election) -> Result<bool> {
    let assigned: HashSet<Id> = election.witnesses.iter().copied().collect();
    let objectors: HashSet<Id> = store
        .exceptions(election.id)
        .await?
        .into_iter()
        .map(|e| e.witness_id)
        .filter(|w| assigned.contains(w))
        .collect();
    Ok(objectors.len() >= WITNESS_QUORUM_MIN && objectors.len() * 2 > assigned.len())
}

/// Reopen a terminated election with a fresh set of windows.
pub async fn de_terminate(
    store: &dyn Store,
    actor: &Actor,
    id: Id,
    windows: ElectionWindows,
    now: DateTime<Utc>,
) -> Result<Election> {
    authorize(actor, Action::ManageElections)?;
    let election = fetch_election(store, id, now).await?;
    if election.status != ElectionStatus::Terminate {
        return Err(Error::NotTerminated);
    }
    windows.validate(now).map_err(Error::InvalidWindow)?;

    let update = ElectionUpdate {
        status: Some(ElectionStatus::Ongoing),
        windows: Some(windows),
        ..Default::default()
    };
    let reopened = store
        .update_election(id, ElectionStatus::Terminate, update)
        .await?
        .ok_or(Error::NotTerminated)?;
    info!("Election {id} de-terminated, voting until {}", windows.vote_end);
    Ok(reopened)
}

/// Delete a draft election and its candidates.
pub async fn delete(store: &dyn Store, actor: &Actor, id: Id, now: DateTime<Utc>) -> Result<()> {
    authorize(actor, Action::ManageElections)?;
    let election = fetch_election(store, id, now).await?;
    ensure_not_terminated(&election)?;
    if election.status != ElectionStatus::Draft {
        return Err(Error::NotDraft);
    }
    if !store.delete_draft_election(id).await? {
        return Err(Error::NotDraft);
    }
    info!("Deleted draft election {id}");
    Ok(())
}

/// Move every ongoing election whose vote has ended to finished.
pub async fn sweep(store: &dyn Store, now: DateTime<Utc>) -> Result<()> {
    let finished = store.finish_expired(now).await?;
    if finished > 0 {
        info!("Finished {finished} election(s) whose vote has ended");
    }
    Ok(())
}

/// Whether an election in the given state may be seen by the viewer.
pub fn visible_to(viewer: Option<&Actor>, status: ElectionStatus) -> bool {
    match viewer.map(|v| v.role) {
        Some(Role::Admin) => true,
        Some(Role::Witness) => status != ElectionStatus::Draft,
        _ => !matches!(status, ElectionStatus::Draft | ElectionStatus::Terminate),
    }
}

/// Whether the viewer may read the exceptions filed against an election:
/// administrators always, witnesses only where they are assigned.
pub fn may_view_exceptions(viewer: Option<&Actor>, election: &Election) -> bool {
    match viewer {
        Some(actor) if authorize(actor, Action::ViewExceptions).is_ok() => {
            actor.is_admin() || election.witnesses.contains(&actor.id)
        }
        _ => false,
    }
}

/// List the elections the viewer may see, optionally in a single state.
pub async fn list(
    store: &dyn Store,
    viewer: Option<&Actor>,
    status: Option<ElectionStatus>,
    now: DateTime<Utc>,
) -> Result<Vec<Election>> {
    sweep(store, now).await?;
    let elections = store.elections(status).await?;
    Ok(elections
        .into_iter()
        .filter(|e| visible_to(viewer, e.status))
        .collect())
}

/// Get a single election, if the viewer may see it.
pub async fn get(
    store: &dyn Store,
    viewer: Option<&Actor>,
    id: Id,
    now: DateTime<Utc>,
) -> Result<Election> {
    let election = fetch_election(store, id, now).await?;
    if !visible_to(viewer, election.status) {
        return Err(Error::not_found(format!("election {id}")));
    }
    Ok(election)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::model::api::election::WindowsSpec;
    use crate::voting::fixtures::Fixture;
    use crate::voting::window::WindowViolation;

    #[rocket::async_test]
    async fn create_and_start() {
        let fx = Fixture::new().await;
        let draft = fx.draft(2, 1).await;
        assert_eq!(draft.status, ElectionStatus::Draft);
        assert_eq!(draft.windows, None);
        assert_eq!(draft.witnesses, vec![fx.witnesses[0].id]);
        let candidates = fx.store.candidates(draft.id).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].lead, fx.pairs[0].lead);

        let started = start(
            &fx.store,
            &fx.admin,
            draft.id,
            StartRequest::example(fx.now),
            fx.now,
        )
        .await
        .unwrap();
        assert_eq!(started.status, ElectionStatus::Ongoing);
        let windows = started.windows.unwrap();
        assert_eq!(windows.vote_end, fx.now + Duration::hours(7));
        assert!(windows.whitelist_start < windows.whitelist_end);
        assert!(windows.whitelist_end <= windows.vote_start);
        assert!(windows.vote_start < windows.vote_end);
        assert_eq!(started.public_key.as_deref(), Some("0x5f3c9a"));

        // Starting twice is not allowed.
        let again = start(
            &fx.store,
            &fx.admin,
            draft.id,
            StartRequest::example(fx.now),
            fx.now,
        )
        .await;
        assert!(matches!(again, Err(Error::NotDraft)));
    }

    #[rocket::async_test]
    async fn create_validates_participants() {
        let fx = Fixture::new().await;

        let no_candidates = ElectionSpec::example(Vec::new(), Vec::new());
        let result = create(&fx.store, &fx.admin, no_candidates, fx.now).await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        let ghost = CandidatePair {
            lead: Id::new(),
            deputy: fx.pairs[0].deputy,
        };
        let result = create(
            &fx.store,
            &fx.admin,
            ElectionSpec::example(vec![ghost], Vec::new()),
            fx.now,
        )
        .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        // A voter is not a witness.
        let result = create(
            &fx.store,
            &fx.admin,
            ElectionSpec::example(fx.pairs.clone(), vec![fx.voter.id]),
            fx.now,
        )
        .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        let result = create(
            &fx.store,
            &fx.voter,
            ElectionSpec::example(fx.pairs.clone(), Vec::new()),
            fx.now,
        )
        .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[rocket::async_test]
    async fn start_rejects_bad_windows() {
        let fx = Fixture::new().await;
        let draft = fx.draft(2, 0).await;

        let past = StartRequest {
            whitelist_start: fx.now - Duration::hours(1),
            ..StartRequest::example(fx.now)
        };
        let result = start(&fx.store, &fx.admin, draft.id, past, fx.now).await;
        assert!(matches!(
            result,
            Err(Error::InvalidWindow(WindowViolation::WhitelistStartNotFuture))
        ));

        let no_pause = StartRequest {
            pending_duration_hours: 0,
            ..StartRequest::example(fx.now)
        };
        let result = start(&fx.store, &fx.admin, draft.id, no_pause, fx.now).await;
        assert!(matches!(
            result,
            Err(Error::InvalidWindow(
                WindowViolation::VoteStartNotAfterWhitelistEnd
            ))
        ));

        let unchanged = fx.store.election(draft.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, ElectionStatus::Draft);
    }

    #[rocket::async_test]
    async fn missing_elections() {
        let fx = Fixture::new().await;
        let result = start(
            &fx.store,
            &fx.admin,
            Id::new(),
            StartRequest::example(fx.now),
            fx.now,
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn draft_updates() {
        let fx = Fixture::new().await;
        let draft = fx.draft(2, 0).await;
        let update = DraftUpdate {
            name: Some("Renamed".to_string()),
            candidates: Some(vec![fx.pairs[2]]),
            witnesses: Some(vec![fx.witnesses[1].id, fx.witnesses[1].id]),
            ..Default::default()
        };
        let updated = update_draft(&fx.store, &fx.admin, draft.id, update, fx.now)
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.organization, draft.organization);
        assert_eq!(updated.witnesses, vec![fx.witnesses[1].id]);
        let candidates = fx.store.candidates(draft.id).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lead, fx.pairs[2].lead);

        let ongoing = fx.ongoing(2, 0).await;
        let result = update_draft(
            &fx.store,
            &fx.admin,
            ongoing.id,
            DraftUpdate::default(),
            fx.now,
        )
        .await;
        assert!(matches!(result, Err(Error::NotDraft)));
    }

    #[rocket::async_test]
    async fn ongoing_updates_are_rejected_not_dropped() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        let windows = election.windows.unwrap();

        let bad = OngoingUpdate {
            vote_start: Some(windows.whitelist_start),
            description: Some("ignored".to_string()),
            ..Default::default()
        };
        let result = update_ongoing(&fx.store, &fx.admin, election.id, bad, fx.now).await;
        assert!(matches!(result, Err(Error::InvalidWindow(_))));
        let unchanged = fx.store.election(election.id).await.unwrap().unwrap();
        assert_eq!(unchanged.windows, Some(windows));
        assert_eq!(unchanged.description, election.description);

        let good = OngoingUpdate {
            vote_end: Some(windows.vote_end + Duration::hours(2)),
            description: Some("Extended".to_string()),
            ..Default::default()
        };
        let updated = update_ongoing(&fx.store, &fx.admin, election.id, good, fx.now)
            .await
            .unwrap();
        assert_eq!(
            updated.windows.unwrap().vote_end,
            windows.vote_end + Duration::hours(2)
        );
        assert_eq!(updated.windows.unwrap().vote_start, windows.vote_start);
        assert_eq!(updated.description.as_deref(), Some("Extended"));
    }

    #[rocket::async_test]
    async fn terminate_round_trip() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 1).await;

        let first: ElectionWindows = WindowsSpec::example(fx.now, 2).into();
        let second: ElectionWindows = WindowsSpec::example(fx.now, 10).into();

        for windows in [first, second] {
            let outcome = terminate(&fx.store, &fx.admin, election.id, None, fx.now)
                .await
                .unwrap();
            assert!(matches!(
                outcome,
                Termination::Terminated(ref e) if e.status == ElectionStatus::Terminate
            ));

            let reopened = de_terminate(&fx.store, &fx.admin, election.id, windows, fx.now)
                .await
                .unwrap();
            assert_eq!(reopened.status, ElectionStatus::Ongoing);
            assert_eq!(reopened.windows, Some(windows));
        }

        // De-terminating an ongoing election is meaningless.
        let result = de_terminate(&fx.store, &fx.admin, election.id, second, fx.now).await;
        assert!(matches!(result, Err(Error::NotTerminated)));
    }

    #[rocket::async_test]
    async fn terminated_elections_refuse_actions() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        terminate(&fx.store, &fx.admin, election.id, None, fx.now)
            .await
            .unwrap();

        let result = terminate(&fx.store, &fx.admin, election.id, None, fx.now).await;
        assert!(matches!(result, Err(Error::ElectionTerminated)));
        let result = update_ongoing(
            &fx.store,
            &fx.admin,
            election.id,
            OngoingUpdate::default(),
            fx.now,
        )
        .await;
        assert!(matches!(result, Err(Error::ElectionTerminated)));
        let result = delete(&fx.store, &fx.admin, election.id, fx.now).await;
        assert!(matches!(result, Err(Error::ElectionTerminated)));

        // Windows must still be valid to reopen.
        let stale: ElectionWindows = WindowsSpec::example(fx.now, -1).into();
        let result = de_terminate(&fx.store, &fx.admin, election.id, stale, fx.now).await;
        assert!(matches!(result, Err(Error::InvalidWindow(_))));
    }

    #[rocket::async_test]
    async fn witness_objections() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 3).await;

        let outcome = terminate(
            &fx.store,
            &fx.witnesses[0],
            election.id,
            Some("Ballot box left unattended".to_string()),
            fx.now,
        )
        .await
        .unwrap();
        match outcome {
            Termination::Objected {
                exception,
                terminated,
            } => {
                assert!(!terminated);
                assert_eq!(exception.witness_id, fx.witnesses[0].id);
                assert_eq!(exception.note, "Ballot box left unattended");
            }
            other => panic!("Unexpected outcome {other:?}"),
        }
        let still = fx.store.election(election.id).await.unwrap().unwrap();
        assert_eq!(still.status, ElectionStatus::Ongoing);

        // The same witness objecting again does not make a quorum.
        terminate(&fx.store, &fx.witnesses[0], election.id, None, fx.now)
            .await
            .unwrap();
        let still = fx.store.election(election.id).await.unwrap().unwrap();
        assert_eq!(still.status, ElectionStatus::Ongoing);

        // A second distinct witness out of three does.
        let outcome = terminate(&fx.store, &fx.witnesses[1], election.id, None, fx.now)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Termination::Objected {
                terminated: true,
                ..
            }
        ));
        let terminated = fx.store.election(election.id).await.unwrap().unwrap();
        assert_eq!(terminated.status, ElectionStatus::Terminate);
        assert_eq!(fx.store.exceptions(election.id).await.unwrap().len(), 3);
    }

    #[rocket::async_test]
    async fn unassigned_witnesses_cannot_object() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 1).await;
        let result = terminate(&fx.store, &fx.witnesses[2], election.id, None, fx.now).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        let result = terminate(&fx.store, &fx.voter, election.id, None, fx.now).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[rocket::async_test]
    async fn delete_only_drafts() {
        let fx = Fixture::new().await;
        let draft = fx.draft(2, 0).await;
        delete(&fx.store, &fx.admin, draft.id, fx.now).await.unwrap();
        assert!(fx.store.election(draft.id).await.unwrap().is_none());
        assert!(fx.store.candidates(draft.id).await.unwrap().is_empty());

        let ongoing = fx.ongoing(2, 0).await;
        let result = delete(&fx.store, &fx.admin, ongoing.id, fx.now).await;
        assert!(matches!(result, Err(Error::NotDraft)));
    }

    #[rocket::async_test]
    async fn reads_finish_expired_elections() {
        let fx = Fixture::new().await;
        let election = fx.ongoing(2, 0).await;
        let after = election.windows.unwrap().vote_end + Duration::seconds(1);

        let read = get(&fx.store, None, election.id, after).await.unwrap();
        assert_eq!(read.status, ElectionStatus::Finish);

        let other = fx.ongoing(2, 0).await;
        let listed = list(&fx.store, None, Some(ElectionStatus::Finish), after)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|e| e.id == other.id));

        // Once finished, an election cannot be terminated.
        let result = terminate(&fx.store, &fx.admin, other.id, None, after).await;
        assert!(matches!(result, Err(Error::NotOngoing)));
    }

    #[test]
    fn exceptions_are_for_admins_and_assigned_witnesses() {
        let now = Utc::now();
        let assigned = Actor::new(Id::new(), Role::Witness);
        let unassigned = Actor::new(Id::new(), Role::Witness);
        let election = Election::new(ElectionCore::draft(
            "Student Council".to_string(),
            "Student Union".to_string(),
            None,
            vec![assigned.id],
            now,
        ));

        assert!(may_view_exceptions(Some(&assigned), &election));
        assert!(!may_view_exceptions(Some(&unassigned), &election));
        let admin = Actor::new(Id::new(), Role::Admin);
        assert!(may_view_exceptions(Some(&admin), &election));
        let voter = Actor::new(Id::new(), Role::User);
        assert!(!may_view_exceptions(Some(&voter), &election));
        assert!(!may_view_exceptions(None, &election));
    }

    #[rocket::async_test]
    async fn visibility() {
        let fx = Fixture::new().await;
        let draft = fx.draft(2, 0).await;
        let ongoing = fx.ongoing(2, 0).await;
        let terminated = fx.ongoing(2, 0).await;
        terminate(&fx.store, &fx.admin, terminated.id, None, fx.now)
            .await
            .unwrap();

        let ids = |elections: Vec<Election>| -> Vec<Id> {
            elections.into_iter().map(|e| e.id).collect()
        };
        let all = ids(list(&fx.store, Some(&fx.admin), None, fx.now).await.unwrap());
        assert_eq!(all.len(), 3);
        let witness = ids(list(&fx.store, Some(&fx.witnesses[0]), None, fx.now)
            .await
            .unwrap());
        assert_eq!(witness, vec![ongoing.id, terminated.id]);
        let public = ids(list(&fx.store, None, None, fx.now).await.unwrap());
        assert_eq!(public, vec![ongoing.id]);

        let hidden = get(&fx.store, Some(&fx.voter), draft.id, fx.now).await;
        assert!(matches!(hidden, Err(Error::NotFound(_))));
    }
}
