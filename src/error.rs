use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::{bson::ser::Error as BsonSerError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::voting::window::WindowViolation;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Faults from the collaborators; never shown to clients.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonSer(#[from] BsonSerError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Internal error: {0}")]
    Internal(String),

    // Rejections, shown to clients.
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not logged in")]
    Unauthenticated,
    #[error("Not permitted: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid election window: {0}")]
    InvalidWindow(WindowViolation),
    #[error("Outside the permitted time window")]
    OutOfWindow,
    #[error("Election is not ongoing")]
    NotOngoing,
    #[error("Election is not a draft")]
    NotDraft,
    #[error("Election is not terminated")]
    NotTerminated,
    #[error("Election has been terminated")]
    ElectionTerminated,
    #[error("User is already registered for this election")]
    DuplicateUser,
    #[error("Address is already registered for this election")]
    DuplicateAddress,
    #[error("Email address is already in use")]
    DuplicateEmail,
    #[error("Profile is incomplete: {0}")]
    ProfileIncomplete(String),
    #[error("Not whitelisted for this election")]
    NotWhitelisted,
    #[error("Already voted in this election")]
    AlreadyVoted,
    #[error("Candidate does not stand in this election")]
    InvalidCandidate,
    #[error("Correction window has expired")]
    WindowExpired,
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(what: impl Into<String>) -> Self {
        Self::Unauthorized(what.into())
    }

    /// Stable machine-readable name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) | Self::BsonSer(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                "Internal"
            }
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthenticated => "Unauthenticated",
            Self::Unauthorized(_) => "Unauthorized",
            Self::NotFound(_) => "NotFound",
            Self::InvalidWindow(_) => "InvalidWindow",
            Self::OutOfWindow => "OutOfWindow",
            Self::NotOngoing => "NotOngoing",
            Self::NotDraft => "NotDraft",
            Self::NotTerminated => "NotTerminated",
            Self::ElectionTerminated => "ElectionTerminated",
            Self::DuplicateUser => "DuplicateUser",
            Self::DuplicateAddress => "DuplicateAddress",
            Self::DuplicateEmail => "DuplicateEmail",
            Self::ProfileIncomplete(_) => "ProfileIncomplete",
            Self::NotWhitelisted => "NotWhitelisted",
            Self::AlreadyVoted => "AlreadyVoted",
            Self::InvalidCandidate => "InvalidCandidate",
            Self::WindowExpired => "WindowExpired",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::BsonSer(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
            Self::BadRequest(_) | Self::InvalidWindow(_) => Status::BadRequest,
            Self::Unauthenticated => Status::Unauthorized,
            Self::Unauthorized(_)
            | Self::OutOfWindow
            | Self::WindowExpired
            | Self::NotWhitelisted
            | Self::ElectionTerminated => Status::Forbidden,
            Self::NotFound(_) | Self::InvalidCandidate => Status::NotFound,
            Self::NotOngoing
            | Self::NotDraft
            | Self::NotTerminated
            | Self::DuplicateUser
            | Self::DuplicateAddress
            | Self::DuplicateEmail
            | Self::AlreadyVoted => Status::Conflict,
            Self::ProfileIncomplete(_) => Status::UnprocessableEntity,
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let message = if err.status() == Status::InternalServerError {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Self {
            error: err.kind(),
            message,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        (status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
