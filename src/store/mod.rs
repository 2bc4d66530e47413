//! Storage access for every entity.
//!
//! The [`Store`] trait holds every query and every write the voting core
//! performs. Writes that must happen together are single methods, so no
//! caller can observe half of them.

use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

use crate::error::Result;
use crate::model::{
    common::{election::ElectionStatus, role::Role, whitelist::WhitelistStatus},
    db::{
        ballot::{Ballot, NewBallot},
        candidate::Candidate,
        election::{CandidatePair, Election, ElectionUpdate, NewElection},
        exception::{NewException, WitnessException},
        user::{NewUser, PasswordReset, User},
        whitelist::{NewWhitelistEntry, WhitelistEntry},
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user. Fails with `DuplicateEmail` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    async fn user(&self, id: Id) -> Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Mark the user holding the given verification digest as verified.
    async fn verify_email(&self, digest: &str) -> Result<Option<User>>;
    async fn set_identity_document(&self, id: Id, reference: String) -> Result<Option<User>>;
    async fn admin_exists(&self) -> Result<bool>;
    /// Every user, or only those holding `role`, oldest first.
    async fn users(&self, role: Option<Role>) -> Result<Vec<User>>;
    async fn set_user_role(&self, id: Id, role: Role) -> Result<Option<User>>;
    async fn set_user_suspended(&self, id: Id, suspended: bool) -> Result<Option<User>>;
    /// Record a password reset request, replacing any earlier one.
    async fn set_password_reset(&self, id: Id, reset: PasswordReset) -> Result<Option<User>>;
    /// Replace the password of the user holding the given reset digest, if
    /// that reset has not expired by `now`. Each reset works only once.
    async fn reset_password(
        &self,
        digest: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;
    /// Replace a user's password, cancelling any outstanding reset.
    async fn set_password_hash(&self, id: Id, password_hash: String) -> Result<Option<User>>;

    /// Atomically insert an election together with its candidates.
    async fn insert_election(
        &self,
        election: NewElection,
        candidates: Vec<CandidatePair>,
    ) -> Result<Election>;
    async fn election(&self, id: Id) -> Result<Option<Election>>;
    async fn elections(&self, status: Option<ElectionStatus>) -> Result<Vec<Election>>;
    /// Apply an update iff the election is still in the `expected` status.
    /// Returns the updated election, or `None` if nothing matched.
    async fn update_election(
        &self,
        id: Id,
        expected: ElectionStatus,
        update: ElectionUpdate,
    ) -> Result<Option<Election>>;
    /// Move every ongoing election whose vote has ended to finished.
    /// Returns how many moved.
    async fn finish_expired(&self, now: DateTime<Utc>) -> Result<u64>;
    /// Pin the winner of a finished election unless one is already pinned.
    /// Returns whichever winner is pinned afterwards.
    async fn pin_winner(&self, id: Id, winner: Id) -> Result<Option<Id>>;
    /// Delete a draft election and its candidates. Returns false if there
    /// was no draft election with this ID.
    async fn delete_draft_election(&self, id: Id) -> Result<bool>;
    /// Candidates of an election in ballot order.
    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>>;

    /// Fails with `DuplicateUser` or `DuplicateAddress` if the user or
    /// address is already registered for the election.
    async fn insert_whitelist(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry>;
    async fn whitelist_entry(&self, id: Id) -> Result<Option<WhitelistEntry>>;
    async fn whitelist_for_user(
        &self,
        election_id: Id,
        user_id: Id,
    ) -> Result<Option<WhitelistEntry>>;
    async fn whitelist_for_address(
        &self,
        election_id: Id,
        address: &str,
    ) -> Result<Option<WhitelistEntry>>;
    async fn whitelists(&self, election_id: Id) -> Result<Vec<WhitelistEntry>>;
    async fn count_whitelists(&self, election_id: Id) -> Result<u64>;
    async fn set_whitelist_status(
        &self,
        id: Id,
        status: WhitelistStatus,
    ) -> Result<Option<WhitelistEntry>>;

    async fn ballot_for_entry(&self, whitelist_id: Id) -> Result<Option<Ballot>>;
    /// Atomically insert a ballot and increment its candidate's tally.
    ///
    /// Fails with `AlreadyVoted` if the whitelist entry already has a ballot,
    /// `InvalidCandidate` if the candidate does not stand in the ballot's
    /// election, and `ElectionTerminated` or `NotOngoing` if the election is
    /// no longer ongoing when the write happens. Nothing is written on
    /// failure.
    async fn record_ballot(&self, ballot: NewBallot) -> Result<Ballot>;
    /// Atomically mark the entry's valid ballots invalid and decrement the
    /// tallies they contributed. Already-invalid ballots are left alone.
    /// Returns every ballot of the entry afterwards.
    async fn invalidate_ballots(&self, whitelist_id: Id) -> Result<Vec<Ballot>>;
    async fn ballots(&self, election_id: Id) -> Result<Vec<Ballot>>;
    async fn count_ballots(&self, election_id: Id) -> Result<u64>;

    async fn insert_exception(&self, exception: NewException) -> Result<WitnessException>;
    async fn exceptions(&self, election_id: Id) -> Result<Vec<WitnessException>>;
}

/// A shared handle on the configured [`Store`], held in managed state and
/// available as a request guard.
#[derive(Clone)]
pub struct Repo(Arc<dyn Store>);

impl Repo {
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self(Arc::new(store))
    }
}

impl Deref for Repo {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Repo {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.rocket().state::<Repo>() {
            Some(repo) => Outcome::Success(repo.clone()),
            None => {
                error!("No store is managed");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}
