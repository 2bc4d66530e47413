use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{common::role::Role, db::user::User, mongodb::Id};
use crate::store::Repo;
use crate::voting::policy::Actor;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with a specific role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: Id,
    pub role: Role,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }

    /// The actor this token authenticates.
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .build())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and check that its user still
    /// exists and may act. Forwards with `401` otherwise.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            Outcome::Success(config) => config,
            _ => {
                let err = Error::Internal("Config is not managed".to_string());
                return Outcome::Error((Status::InternalServerError, err));
            }
        };

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .or_forward(Status::Unauthorized));

        // Decode the token.
        let token: Self = try_outcome!(Self::from_cookie(cookie, config)
            .ok()
            .or_forward(Status::Unauthorized));

        // Check the user actually exists, and has not been suspended or had
        // their role changed since the token was issued.
        let repo = match req.guard::<Repo>().await {
            Outcome::Success(repo) => repo,
            _ => {
                let err = Error::Internal("Store is not managed".to_string());
                return Outcome::Error((Status::InternalServerError, err));
            }
        };
        match repo.user(token.id).await {
            Ok(Some(user)) if user.is_active() && user.role == token.role => {
                Outcome::Success(token)
            }
            Ok(_) => Outcome::Forward(Status::Unauthorized),
            Err(err) => Outcome::Error((Status::InternalServerError, err)),
        }
    }
}
