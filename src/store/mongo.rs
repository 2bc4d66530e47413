use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, to_bson, DateTime as BsonDateTime, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rocket::{futures::TryStreamExt, tokio::time::sleep};

use crate::error::{Error, Result};
use crate::model::{
    common::{election::ElectionStatus, role::Role, whitelist::WhitelistStatus},
    db::{
        ballot::{Ballot, NewBallot},
        candidate::{Candidate, CandidateCore},
        election::{CandidatePair, Election, ElectionUpdate, NewElection},
        exception::{NewException, WitnessException},
        user::{NewUser, PasswordReset, User},
        whitelist::{NewWhitelistEntry, WhitelistEntry},
    },
    mongodb::{duplicate_key_message, ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::Store;

/// A [`Store`] backed by MongoDB.
///
/// Multi-document writes run inside transactions, which requires the server
/// to be part of a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the given server and ensure the required indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    fn user_coll(&self) -> Coll<User> {
        Coll::from_db(&self.db)
    }

    fn election_coll(&self) -> Coll<Election> {
        Coll::from_db(&self.db)
    }

    fn candidate_coll(&self) -> Coll<Candidate> {
        Coll::from_db(&self.db)
    }

    fn whitelist_coll(&self) -> Coll<WhitelistEntry> {
        Coll::from_db(&self.db)
    }

    fn ballot_coll(&self) -> Coll<Ballot> {
        Coll::from_db(&self.db)
    }

    fn exception_coll(&self) -> Coll<WitnessException> {
        Coll::from_db(&self.db)
    }

    /// The writes of one ballot, inside the session's open transaction.
    async fn write_ballot(&self, ballot: &Ballot, session: &mut ClientSession) -> Result<()> {
        // Writing to the election makes a concurrent status change conflict
        // with this transaction instead of slipping past it.
        let guard = doc! {"_id": ballot.election_id, "status": ElectionStatus::Ongoing};
        let touched = self
            .election_coll()
            .update_one_with_session(
                guard,
                doc! {"$currentDate": {"last_ballot_at": true}},
                None,
                session,
            )
            .await?;
        if touched.matched_count == 0 {
            return Err(match self.election(ballot.election_id).await? {
                Some(election) if election.status == ElectionStatus::Terminate => {
                    Error::ElectionTerminated
                }
                Some(_) => Error::NotOngoing,
                None => Error::not_found(format!("election {}", ballot.election_id)),
            });
        }

        // The unique index on `whitelist_id` serialises concurrent attempts.
        if let Err(err) = self
            .ballot_coll()
            .insert_one_with_session(ballot, None, session)
            .await
        {
            return Err(if is_duplicate_key_error(&err) {
                Error::AlreadyVoted
            } else {
                err.into()
            });
        }

        let filter = doc! {"_id": ballot.candidate_id, "election_id": ballot.election_id};
        let increment = doc! {"$inc": {"tally": 1_i64}};
        let incremented = self
            .candidate_coll()
            .update_one_with_session(filter, increment, None, session)
            .await?;
        if incremented.matched_count == 0 {
            return Err(Error::InvalidCandidate);
        }
        Ok(())
    }

    /// Flip the entry's valid ballot, if any, and take it off the tally,
    /// inside the session's open transaction.
    async fn void_ballots(&self, whitelist_id: Id, session: &mut ClientSession) -> Result<()> {
        // At most one ballot exists per entry.
        let valid = self
            .ballot_coll()
            .find_one_with_session(doc! {"whitelist_id": whitelist_id, "valid": true}, None, session)
            .await?;
        let ballot = match valid {
            Some(ballot) => ballot,
            None => return Ok(()),
        };
        let flipped = self
            .ballot_coll()
            .update_one_with_session(
                doc! {"_id": ballot.id, "valid": true},
                doc! {"$set": {"valid": false}},
                None,
                session,
            )
            .await?;
        if flipped.modified_count == 1 {
            self.candidate_coll()
                .update_one_with_session(
                    doc! {"_id": ballot.candidate_id, "tally": {"$gt": 0_i64}},
                    doc! {"$inc": {"tally": -1_i64}},
                    None,
                    session,
                )
                .await?;
        }
        Ok(())
    }
}

/// How many times a transaction is attempted before a write conflict is
/// reported to the caller.
const MAX_TRANSACTION_ATTEMPTS: u32 = 16;

/// Whether a failed transaction should run again. Waits a little longer
/// after each attempt so that the conflicting writer can commit.
async fn should_retry(err: &Error, attempt: u32) -> bool {
    let transient = matches!(err, Error::Db(db) if db.contains_label(TRANSIENT_TRANSACTION_ERROR));
    if !transient || attempt >= MAX_TRANSACTION_ATTEMPTS {
        return false;
    }
    debug!("Transaction attempt {attempt} hit a transient error, retrying: {err}");
    sleep(StdDuration::from_millis(5 * u64::from(attempt))).await;
    true
}

/// Abort the session's transaction so that another can start. Fails
/// harmlessly if the commit itself was what went wrong.
async fn abort(session: &mut ClientSession) {
    if let Err(err) = session.abort_transaction().await {
        debug!("Nothing to abort after a failed transaction: {err}");
    }
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

/// The `$set` fields of an election update. Candidates are handled
/// separately.
fn election_set(update: &ElectionUpdate) -> Result<Document> {
    let mut set = Document::new();
    if let Some(status) = update.status {
        set.insert("status", status);
    }
    if let Some(ref windows) = update.windows {
        set.insert("windows", to_bson(windows)?);
    }
    if let Some(ref key) = update.public_key {
        set.insert("public_key", key.clone());
    }
    if let Some(ref name) = update.name {
        set.insert("name", name.clone());
    }
    if let Some(ref organization) = update.organization {
        set.insert("organization", organization.clone());
    }
    if let Some(ref description) = update.description {
        set.insert("description", description.clone());
    }
    if let Some(ref witnesses) = update.witnesses {
        set.insert("witnesses", to_bson(witnesses)?);
    }
    Ok(set)
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let user = User::new(user);
        match self.user_coll().insert_one(&user, None).await {
            Ok(_) => Ok(user),
            Err(err) if is_duplicate_key_error(&err) => Err(Error::DuplicateEmail),
            Err(err) => Err(err.into()),
        }
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.user_coll().find_one(id.as_doc(), None).await?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.user_coll().find_one(doc! {"email": email}, None).await?)
    }

    async fn verify_email(&self, digest: &str) -> Result<Option<User>> {
        let filter = doc! {"verification_digest": digest};
        let update = doc! {
            "$set": {"email_verified": true, "verification_digest": null}
        };
        Ok(self
            .user_coll()
            .find_one_and_update(filter, update, return_updated())
            .await?)
    }

    async fn set_identity_document(&self, id: Id, reference: String) -> Result<Option<User>> {
        let update = doc! {"$set": {"identity_document": reference}};
        Ok(self
            .user_coll()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn admin_exists(&self) -> Result<bool> {
        let admins = self
            .user_coll()
            .count_documents(doc! {"role": Role::Admin}, None)
            .await?;
        Ok(admins > 0)
    }

    async fn users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let filter = role.map(|role| doc! {"role": role});
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let users = self
            .user_coll()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(users)
    }

    async fn set_user_role(&self, id: Id, role: Role) -> Result<Option<User>> {
        let update = doc! {"$set": {"role": role}};
        Ok(self
            .user_coll()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn set_user_suspended(&self, id: Id, suspended: bool) -> Result<Option<User>> {
        let update = doc! {"$set": {"suspended": suspended}};
        Ok(self
            .user_coll()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn set_password_reset(&self, id: Id, reset: PasswordReset) -> Result<Option<User>> {
        let update = doc! {"$set": {"password_reset": to_bson(&reset)?}};
        Ok(self
            .user_coll()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn reset_password(
        &self,
        digest: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let filter = doc! {
            "password_reset.digest": digest,
            "password_reset.expires_at": {"$gt": BsonDateTime::from_chrono(now)},
        };
        let update = doc! {
            "$set": {"password_hash": password_hash, "password_reset": null}
        };
        Ok(self
            .user_coll()
            .find_one_and_update(filter, update, return_updated())
            .await?)
    }

    async fn set_password_hash(&self, id: Id, password_hash: String) -> Result<Option<User>> {
        let update = doc! {
            "$set": {"password_hash": password_hash, "password_reset": null}
        };
        Ok(self
            .user_coll()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn insert_election(
        &self,
        election: NewElection,
        candidates: Vec<CandidatePair>,
    ) -> Result<Election> {
        let election = Election::new(election);
        let candidates: Vec<_> = CandidateCore::from_pairs(election.id, &candidates)
            .into_iter()
            .map(Candidate::new)
            .collect();

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        self.election_coll()
            .insert_one_with_session(&election, None, &mut session)
            .await?;
        if !candidates.is_empty() {
            self.candidate_coll()
                .insert_many_with_session(&candidates, None, &mut session)
                .await?;
        }
        session.commit_transaction().await?;

        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.election_coll().find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self, status: Option<ElectionStatus>) -> Result<Vec<Election>> {
        let filter = status.map(|status| doc! {"status": status});
        let options = FindOptions::builder().sort(doc! {"created_at": 1}).build();
        let elections = self
            .election_coll()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn update_election(
        &self,
        id: Id,
        expected: ElectionStatus,
        update: ElectionUpdate,
    ) -> Result<Option<Election>> {
        let filter = doc! {"_id": id, "status": expected};
        let set = election_set(&update)?;

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let updated = if set.is_empty() {
            self.election_coll()
                .find_one_with_session(filter, None, &mut session)
                .await?
        } else {
            self.election_coll()
                .find_one_and_update_with_session(
                    filter,
                    doc! {"$set": set},
                    return_updated(),
                    &mut session,
                )
                .await?
        };
        // Dropping the session without committing aborts the transaction.
        let election = match updated {
            Some(election) => election,
            None => return Ok(None),
        };

        if let Some(ref pairs) = update.candidates {
            let candidates: Vec<_> = CandidateCore::from_pairs(id, pairs)
                .into_iter()
                .map(Candidate::new)
                .collect();
            self.candidate_coll()
                .delete_many_with_session(doc! {"election_id": id}, None, &mut session)
                .await?;
            if !candidates.is_empty() {
                self.candidate_coll()
                    .insert_many_with_session(&candidates, None, &mut session)
                    .await?;
            }
        }
        session.commit_transaction().await?;

        Ok(Some(election))
    }

    async fn finish_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let filter = doc! {
            "status": ElectionStatus::Ongoing,
            "windows.vote_end": {"$lt": BsonDateTime::from_chrono(now)},
        };
        let update = doc! {"$set": {"status": ElectionStatus::Finish}};
        let result = self.election_coll().update_many(filter, update, None).await?;
        Ok(result.modified_count)
    }

    async fn pin_winner(&self, id: Id, winner: Id) -> Result<Option<Id>> {
        let filter = doc! {"_id": id, "status": ElectionStatus::Finish, "winner": null};
        let update = doc! {"$set": {"winner": winner}};
        let pinned = self
            .election_coll()
            .find_one_and_update(filter, update, return_updated())
            .await?;
        match pinned {
            Some(election) => Ok(election.winner),
            // Lost the race, or not finished: report whatever is there.
            None => Ok(self.election(id).await?.and_then(|e| e.winner)),
        }
    }

    async fn delete_draft_election(&self, id: Id) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let deleted = self
            .election_coll()
            .delete_one_with_session(
                doc! {"_id": id, "status": ElectionStatus::Draft},
                None,
                &mut session,
            )
            .await?;
        if deleted.deleted_count == 0 {
            return Ok(false);
        }
        self.candidate_coll()
            .delete_many_with_session(doc! {"election_id": id}, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! {"position": 1}).build();
        let candidates = self
            .candidate_coll()
            .find(doc! {"election_id": election_id}, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_whitelist(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry> {
        let entry = WhitelistEntry::new(entry);
        match self.whitelist_coll().insert_one(&entry, None).await {
            Ok(_) => Ok(entry),
            Err(err) => match duplicate_key_message(&err) {
                Some(message) if message.contains("address") => Err(Error::DuplicateAddress),
                Some(_) => Err(Error::DuplicateUser),
                None => Err(err.into()),
            },
        }
    }

    async fn whitelist_entry(&self, id: Id) -> Result<Option<WhitelistEntry>> {
        Ok(self.whitelist_coll().find_one(id.as_doc(), None).await?)
    }

    async fn whitelist_for_user(
        &self,
        election_id: Id,
        user_id: Id,
    ) -> Result<Option<WhitelistEntry>> {
        let filter = doc! {"election_id": election_id, "user_id": user_id};
        Ok(self.whitelist_coll().find_one(filter, None).await?)
    }

    async fn whitelist_for_address(
        &self,
        election_id: Id,
        address: &str,
    ) -> Result<Option<WhitelistEntry>> {
        let filter = doc! {"election_id": election_id, "address": address};
        Ok(self.whitelist_coll().find_one(filter, None).await?)
    }

    async fn whitelists(&self, election_id: Id) -> Result<Vec<WhitelistEntry>> {
        let options = FindOptions::builder().sort(doc! {"created_at": 1}).build();
        let entries = self
            .whitelist_coll()
            .find(doc! {"election_id": election_id}, options)
            .await?
            .try_collect()
            .await?;
        Ok(entries)
    }

    async fn count_whitelists(&self, election_id: Id) -> Result<u64> {
        Ok(self
            .whitelist_coll()
            .count_documents(doc! {"election_id": election_id}, None)
            .await?)
    }

    async fn set_whitelist_status(
        &self,
        id: Id,
        status: WhitelistStatus,
    ) -> Result<Option<WhitelistEntry>> {
        let update = doc! {"$set": {"status": status}};
        Ok(self
            .whitelist_coll()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn ballot_for_entry(&self, whitelist_id: Id) -> Result<Option<Ballot>> {
        Ok(self
            .ballot_coll()
            .find_one(doc! {"whitelist_id": whitelist_id}, None)
            .await?)
    }

    async fn record_ballot(&self, ballot: NewBallot) -> Result<Ballot> {
        let ballot = Ballot::new(ballot);
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            let result = match self.write_ballot(&ballot, &mut session).await {
                Ok(()) => session.commit_transaction().await.map_err(Error::from),
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => return Ok(ballot),
                Err(err) => {
                    abort(&mut session).await;
                    if !should_retry(&err, attempt).await {
                        return Err(err);
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn invalidate_ballots(&self, whitelist_id: Id) -> Result<Vec<Ballot>> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            let result = match self.void_ballots(whitelist_id, &mut session).await {
                Ok(()) => session.commit_transaction().await.map_err(Error::from),
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => break,
                Err(err) => {
                    abort(&mut session).await;
                    if !should_retry(&err, attempt).await {
                        return Err(err);
                    }
                    attempt += 1;
                }
            }
        }

        let ballots = self
            .ballot_coll()
            .find(doc! {"whitelist_id": whitelist_id}, None)
            .await?
            .try_collect()
            .await?;
        Ok(ballots)
    }

    async fn ballots(&self, election_id: Id) -> Result<Vec<Ballot>> {
        let ballots = self
            .ballot_coll()
            .find(doc! {"election_id": election_id}, None)
            .await?
            .try_collect()
            .await?;
        Ok(ballots)
    }

    async fn count_ballots(&self, election_id: Id) -> Result<u64> {
        Ok(self
            .ballot_coll()
            .count_documents(doc! {"election_id": election_id}, None)
            .await?)
    }

    async fn insert_exception(&self, exception: NewException) -> Result<WitnessException> {
        let exception = WitnessException::new(exception);
        self.exception_coll().insert_one(&exception, None).await?;
        Ok(exception)
    }

    async fn exceptions(&self, election_id: Id) -> Result<Vec<WitnessException>> {
        let options = FindOptions::builder().sort(doc! {"filed_at": 1}).build();
        let exceptions = self
            .exception_coll()
            .find(doc! {"election_id": election_id}, options)
            .await?
            .try_collect()
            .await?;
        Ok(exceptions)
    }
}

#[cfg(test)]
impl MongoStore {
    /// Environment variable naming the server the database tests run against.
    pub const TEST_DB_URI_VAR: &'static str = "EVOTE_TEST_DB_URI";

    /// Connect to a fresh, uniquely named database, or `None` if no test
    /// server is configured.
    pub async fn for_test() -> Option<Self> {
        let uri = std::env::var(Self::TEST_DB_URI_VAR).ok()?;
        let db_name = format!("evote_test_{}", Id::new());
        Some(Self::connect(&uri, &db_name).await.unwrap())
    }

    pub async fn drop_database(&self) {
        self.db.drop(None).await.unwrap();
    }
}
