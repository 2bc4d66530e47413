use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

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
    mongodb::Id,
};

use super::Store;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    elections: Vec<Election>,
    candidates: Vec<Candidate>,
    whitelists: Vec<WhitelistEntry>,
    ballots: Vec<Ballot>,
    exceptions: Vec<WitnessException>,
}

/// A [`Store`] kept entirely in process memory.
///
/// Every method holds a single lock for its whole duration, which makes
/// each of them atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_candidates(tables: &Tables, election_id: Id) -> Vec<Candidate> {
    let mut candidates: Vec<_> = tables
        .candidates
        .iter()
        .filter(|c| c.election_id == election_id)
        .cloned()
        .collect();
    candidates.sort_by_key(|c| c.position);
    candidates
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(Error::DuplicateEmail);
        }
        let user = User::new(user);
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn verify_email(&self, digest: &str) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.verification_digest.as_deref() == Some(digest));
        Ok(user.map(|user| {
            user.email_verified = true;
            user.verification_digest = None;
            user.clone()
        }))
    }

    async fn set_identity_document(&self, id: Id, reference: String) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.identity_document = Some(reference);
            user.clone()
        }))
    }

    async fn admin_exists(&self) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().any(|u| u.role == Role::Admin))
    }

    async fn users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| role.map_or(true, |role| u.role == role))
            .cloned()
            .collect())
    }

    async fn set_user_role(&self, id: Id, role: Role) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn set_user_suspended(&self, id: Id, suspended: bool) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.suspended = suspended;
            user.clone()
        }))
    }

    async fn set_password_reset(&self, id: Id, reset: PasswordReset) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.password_reset = Some(reset);
            user.clone()
        }))
    }

    async fn reset_password(
        &self,
        digest: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.iter_mut().find(|u| {
            u.password_reset
                .as_ref()
                .map_or(false, |r| r.digest == digest && r.is_live(now))
        });
        Ok(user.map(|user| {
            user.password_hash = password_hash;
            user.password_reset = None;
            user.clone()
        }))
    }

    async fn set_password_hash(&self, id: Id, password_hash: String) -> Result<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.password_hash = password_hash;
            user.password_reset = None;
            user.clone()
        }))
    }

    async fn insert_election(
        &self,
        election: NewElection,
        candidates: Vec<CandidatePair>,
    ) -> Result<Election> {
        let mut tables = self.tables.lock().await;
        let election = Election::new(election);
        tables.candidates.extend(
            CandidateCore::from_pairs(election.id, &candidates)
                .into_iter()
                .map(Candidate::new),
        );
        tables.elections.push(election.clone());
        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables.elections.iter().find(|e| e.id == id).cloned())
    }

    async fn elections(&self, status: Option<ElectionStatus>) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .iter()
            .filter(|e| status.map_or(true, |status| e.status == status))
            .cloned()
            .collect())
    }

    async fn update_election(
        &self,
        id: Id,
        expected: ElectionStatus,
        update: ElectionUpdate,
    ) -> Result<Option<Election>> {
        let mut tables = self.tables.lock().await;
        let election = match tables
            .elections
            .iter_mut()
            .find(|e| e.id == id && e.status == expected)
        {
            Some(election) => {
                update.apply(election);
                election.clone()
            }
            None => return Ok(None),
        };
        if let Some(ref pairs) = update.candidates {
            tables.candidates.retain(|c| c.election_id != id);
            tables.candidates.extend(
                CandidateCore::from_pairs(id, pairs)
                    .into_iter()
                    .map(Candidate::new),
            );
        }
        Ok(Some(election))
    }

    async fn finish_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut finished = 0;
        for election in tables.elections.iter_mut() {
            let expired = election.windows.map_or(false, |w| w.vote_end < now);
            if election.status == ElectionStatus::Ongoing && expired {
                election.status = ElectionStatus::Finish;
                finished += 1;
            }
        }
        Ok(finished)
    }

    async fn pin_winner(&self, id: Id, winner: Id) -> Result<Option<Id>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .elections
            .iter_mut()
            .find(|e| e.id == id)
            .and_then(|election| {
                if election.status == ElectionStatus::Finish && election.winner.is_none() {
                    election.winner = Some(winner);
                }
                election.winner
            }))
    }

    async fn delete_draft_election(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.elections.len();
        tables
            .elections
            .retain(|e| !(e.id == id && e.status == ElectionStatus::Draft));
        if tables.elections.len() == before {
            return Ok(false);
        }
        tables.candidates.retain(|c| c.election_id != id);
        Ok(true)
    }

    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        let tables = self.tables.lock().await;
        Ok(sorted_candidates(&tables, election_id))
    }

    async fn insert_whitelist(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry> {
        let mut tables = self.tables.lock().await;
        let same_election = || {
            tables
                .whitelists
                .iter()
                .filter(|w| w.election_id == entry.election_id)
        };
        if same_election().any(|w| w.user_id == entry.user_id) {
            return Err(Error::DuplicateUser);
        }
        if same_election().any(|w| w.address == entry.address) {
            return Err(Error::DuplicateAddress);
        }
        let entry = WhitelistEntry::new(entry);
        tables.whitelists.push(entry.clone());
        Ok(entry)
    }

    async fn whitelist_entry(&self, id: Id) -> Result<Option<WhitelistEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables.whitelists.iter().find(|w| w.id == id).cloned())
    }

    async fn whitelist_for_user(
        &self,
        election_id: Id,
        user_id: Id,
    ) -> Result<Option<WhitelistEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .whitelists
            .iter()
            .find(|w| w.election_id == election_id && w.user_id == user_id)
            .cloned())
    }

    async fn whitelist_for_address(
        &self,
        election_id: Id,
        address: &str,
    ) -> Result<Option<WhitelistEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .whitelists
            .iter()
            .find(|w| w.election_id == election_id && w.address == address)
            .cloned())
    }

    async fn whitelists(&self, election_id: Id) -> Result<Vec<WhitelistEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .whitelists
            .iter()
            .filter(|w| w.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn count_whitelists(&self, election_id: Id) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .whitelists
            .iter()
            .filter(|w| w.election_id == election_id)
            .count() as u64)
    }

    async fn set_whitelist_status(
        &self,
        id: Id,
        status: WhitelistStatus,
    ) -> Result<Option<WhitelistEntry>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.whitelists.iter_mut().find(|w| w.id == id).map(|w| {
            w.entry.status = status;
            w.clone()
        }))
    }

    async fn ballot_for_entry(&self, whitelist_id: Id) -> Result<Option<Ballot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballots
            .iter()
            .find(|b| b.whitelist_id == whitelist_id)
            .cloned())
    }

    async fn record_ballot(&self, ballot: NewBallot) -> Result<Ballot> {
        let mut tables = self.tables.lock().await;
        let status = tables
            .elections
            .iter()
            .find(|e| e.id == ballot.election_id)
            .map(|e| e.status)
            .ok_or_else(|| Error::not_found(format!("election {}", ballot.election_id)))?;
        match status {
            ElectionStatus::Ongoing => {}
            ElectionStatus::Terminate => return Err(Error::ElectionTerminated),
            _ => return Err(Error::NotOngoing),
        }
        if tables
            .ballots
            .iter()
            .any(|b| b.whitelist_id == ballot.whitelist_id)
        {
            return Err(Error::AlreadyVoted);
        }
        let candidate = tables
            .candidates
            .iter_mut()
            .find(|c| c.id == ballot.candidate_id && c.election_id == ballot.election_id)
            .ok_or(Error::InvalidCandidate)?;
        candidate.candidate.tally += 1;
        let ballot = Ballot::new(ballot);
        tables.ballots.push(ballot.clone());
        Ok(ballot)
    }

    async fn invalidate_ballots(&self, whitelist_id: Id) -> Result<Vec<Ballot>> {
        let mut tables = self.tables.lock().await;
        let Tables {
            ballots,
            candidates,
            ..
        } = &mut *tables;
        for ballot in ballots
            .iter_mut()
            .filter(|b| b.whitelist_id == whitelist_id && b.valid)
        {
            ballot.ballot.valid = false;
            if let Some(candidate) = candidates.iter_mut().find(|c| c.id == ballot.candidate_id) {
                candidate.candidate.tally = candidate.candidate.tally.saturating_sub(1);
            }
        }
        Ok(ballots
            .iter()
            .filter(|b| b.whitelist_id == whitelist_id)
            .cloned()
            .collect())
    }

    async fn ballots(&self, election_id: Id) -> Result<Vec<Ballot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballots
            .iter()
            .filter(|b| b.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn count_ballots(&self, election_id: Id) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballots
            .iter()
            .filter(|b| b.election_id == election_id)
            .count() as u64)
    }

    async fn insert_exception(&self, exception: NewException) -> Result<WitnessException> {
        let mut tables = self.tables.lock().await;
        let exception = WitnessException::new(exception);
        tables.exceptions.push(exception.clone());
        Ok(exception)
    }

    async fn exceptions(&self, election_id: Id) -> Result<Vec<WitnessException>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .exceptions
            .iter()
            .filter(|e| e.election_id == election_id)
            .cloned()
            .collect())
    }
}
