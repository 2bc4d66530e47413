//! Computing and checking the ordered time windows of an election.
//!
//! Every election that has been started carries four boundaries which must
//! always satisfy
//! `whitelist_start < whitelist_end < vote_start < vote_end`.
//! Whitelist registration is open on `[whitelist_start, whitelist_end]` and
//! voting on `[vote_start, vote_end]`, both inclusive.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::election::ElectionWindows;

/// How long after voting closes an administrator may still invalidate ballots.
pub const CORRECTION_GRACE_HOURS: i64 = 24;

/// One of the four window boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    WhitelistStart,
    WhitelistEnd,
    VoteStart,
    VoteEnd,
}

impl Display for Boundary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WhitelistStart => "whitelist_start",
            Self::WhitelistEnd => "whitelist_end",
            Self::VoteStart => "vote_start",
            Self::VoteEnd => "vote_end",
        };
        write!(f, "{name}")
    }
}

/// The first constraint a proposed set of windows breaks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowViolation {
    /// `whitelist_start` must lie in the future.
    WhitelistStartNotFuture,
    WhitelistEndNotAfterStart,
    VoteStartNotAfterWhitelistEnd,
    VoteEndNotAfterVoteStart,
    /// A boundary supplied in an update lies in the past.
    BoundaryInPast(Boundary),
    /// A duration pushed a boundary beyond the representable range.
    OutOfRange,
}

impl Display for WindowViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WhitelistStartNotFuture => write!(f, "whitelist_start must be in the future"),
            Self::WhitelistEndNotAfterStart => {
                write!(f, "whitelist_end must be after whitelist_start")
            }
            Self::VoteStartNotAfterWhitelistEnd => {
                write!(f, "vote_start must be after whitelist_end")
            }
            Self::VoteEndNotAfterVoteStart => write!(f, "vote_end must be after vote_start"),
            Self::BoundaryInPast(boundary) => write!(f, "{boundary} must not be in the past"),
            Self::OutOfRange => write!(f, "durations are out of range"),
        }
    }
}

/// Replacement values for some of an ongoing election's boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowUpdate {
    pub whitelist_start: Option<DateTime<Utc>>,
    pub whitelist_end: Option<DateTime<Utc>>,
    pub vote_start: Option<DateTime<Utc>>,
    pub vote_end: Option<DateTime<Utc>>,
}

impl WindowUpdate {
    pub fn is_empty(&self) -> bool {
        self.whitelist_start.is_none()
            && self.whitelist_end.is_none()
            && self.vote_start.is_none()
            && self.vote_end.is_none()
    }

    fn supplied(&self) -> [(Boundary, Option<DateTime<Utc>>); 4] {
        [
            (Boundary::WhitelistStart, self.whitelist_start),
            (Boundary::WhitelistEnd, self.whitelist_end),
            (Boundary::VoteStart, self.vote_start),
            (Boundary::VoteEnd, self.vote_end),
        ]
    }
}

impl ElectionWindows {
    /// Derive absolute windows from a start time and a chain of durations:
    /// the whitelist phase, the pause before voting, and the vote itself.
    pub fn from_durations(
        whitelist_start: DateTime<Utc>,
        whitelist_hours: u32,
        pending_hours: u32,
        vote_hours: u32,
    ) -> Result<Self, WindowViolation> {
        let after = |time: DateTime<Utc>, hours: u32| {
            time.checked_add_signed(Duration::hours(hours.into()))
                .ok_or(WindowViolation::OutOfRange)
        };
        let whitelist_end = after(whitelist_start, whitelist_hours)?;
        let vote_start = after(whitelist_end, pending_hours)?;
        let vote_end = after(vote_start, vote_hours)?;
        Ok(Self {
            whitelist_start,
            whitelist_end,
            vote_start,
            vote_end,
        })
    }

    /// Check the strict ordering of the four boundaries.
    pub fn check_order(&self) -> Result<(), WindowViolation> {
        if self.whitelist_end <= self.whitelist_start {
            return Err(WindowViolation::WhitelistEndNotAfterStart);
        }
        if self.vote_start <= self.whitelist_end {
            return Err(WindowViolation::VoteStartNotAfterWhitelistEnd);
        }
        if self.vote_end <= self.vote_start {
            return Err(WindowViolation::VoteEndNotAfterVoteStart);
        }
        Ok(())
    }

    /// Validate a fresh set of windows: entirely in the future and ordered.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), WindowViolation> {
        if self.whitelist_start <= now {
            return Err(WindowViolation::WhitelistStartNotFuture);
        }
        self.check_order()
    }

    /// Merge an update into these windows.
    ///
    /// Every supplied boundary must not lie in the past, and the merged set
    /// must remain strictly ordered. Boundaries left out keep their current
    /// value even if that has already passed.
    pub fn merge(&self, update: &WindowUpdate, now: DateTime<Utc>) -> Result<Self, WindowViolation> {
        for (boundary, value) in update.supplied() {
            if matches!(value, Some(time) if time < now) {
                return Err(WindowViolation::BoundaryInPast(boundary));
            }
        }
        let merged = Self {
            whitelist_start: update.whitelist_start.unwrap_or(self.whitelist_start),
            whitelist_end: update.whitelist_end.unwrap_or(self.whitelist_end),
            vote_start: update.vote_start.unwrap_or(self.vote_start),
            vote_end: update.vote_end.unwrap_or(self.vote_end),
        };
        merged.check_order()?;
        Ok(merged)
    }

    pub fn whitelist_open(&self, now: DateTime<Utc>) -> bool {
        self.whitelist_start <= now && now <= self.whitelist_end
    }

    pub fn voting_open(&self, now: DateTime<Utc>) -> bool {
        self.vote_start <= now && now <= self.vote_end
    }

    /// Whether voting has closed for good.
    pub fn vote_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.vote_end
    }

    /// The last instant at which ballots may still be invalidated.
    pub fn correction_deadline(&self) -> DateTime<Utc> {
        self.vote_end + Duration::hours(CORRECTION_GRACE_HOURS)
    }
}
