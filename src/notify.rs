//! Outbound notifications to users.
//!
//! Templates are rendered by whatever consumes the published messages; this
//! service only names the template and supplies its parameters.

use std::ops::Deref;
use std::sync::Arc;

use aws_sdk_sns::Client as SnsClient;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
    serde::json,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::api::id::ApiId;

/// A message to a user, identified by a stable template name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", content = "params", rename_all = "kebab-case")]
pub enum Notification {
    VerifyEmail { token: String },
    ResetPassword { token: String },
    WhitelistAccepted { election_id: ApiId, entry_id: ApiId },
    WhitelistDeclined { election_id: ApiId, entry_id: ApiId },
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Self::VerifyEmail { .. } => "verify-email",
            Self::ResetPassword { .. } => "reset-password",
            Self::WhitelistAccepted { .. } => "whitelist-accepted",
            Self::WhitelistDeclined { .. } => "whitelist-declined",
        }
    }
}

/// The envelope published for each notification.
#[derive(Serialize)]
struct Message<'a> {
    to: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

fn encode(to: &str, notification: &Notification) -> Result<String> {
    json::to_string(&Message { to, notification })
        .map_err(|err| Error::Internal(format!("Failed to encode notification: {err}")))
}

#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to the given email address.
    async fn send(&self, to: &str, notification: &Notification) -> Result<()>;
}

/// Publishes notifications to an Amazon SNS topic.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }
}

#[rocket::async_trait]
impl Notifier for SnsNotifier {
    async fn send(&self, to: &str, notification: &Notification) -> Result<()> {
        let message = encode(to, notification)?;
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|err| Error::Internal(format!("Failed to publish notification: {err}")))?;
        debug!("Published {} notification", notification.template());
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[rocket::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, notification: &Notification) -> Result<()> {
        info!("Notification: {}", encode(to, notification)?);
        Ok(())
    }
}

/// A shared handle on the configured [`Notifier`], held in managed state and
/// available as a request guard.
#[derive(Clone)]
pub struct Postman(Arc<dyn Notifier>);

impl Postman {
    pub fn new<N: Notifier + 'static>(notifier: N) -> Self {
        Self(Arc::new(notifier))
    }

    /// Send a notification whose delivery must not affect the caller.
    /// Failures are logged and dropped.
    pub async fn send_or_warn(&self, to: &str, notification: &Notification) {
        if let Err(err) = self.0.send(to, notification).await {
            warn!("Dropped {} notification: {err}", notification.template());
        }
    }
}

impl Deref for Postman {
    type Target = dyn Notifier;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Postman {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.rocket().state::<Postman>() {
            Some(postman) => Outcome::Success(postman.clone()),
            None => {
                error!("No notifier is managed");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_names_template() {
        let notification = Notification::VerifyEmail {
            token: "ABC".to_string(),
        };
        let message = encode("a@example.com", &notification).unwrap();
        let value: json::Value = json::from_str(&message).unwrap();
        assert_eq!(value["to"], "a@example.com");
        assert_eq!(value["template"], notification.template());
        assert_eq!(value["params"]["token"], "ABC");
    }

    #[rocket::async_test]
    async fn failures_are_swallowed() {
        let notifier = recording::RecordingNotifier::failing();
        let outbox = notifier.outbox.clone();
        let postman = Postman::new(notifier);
        postman
            .send_or_warn(
                "a@example.com",
                &Notification::VerifyEmail {
                    token: "ABC".to_string(),
                },
            )
            .await;
        assert!(outbox.sent().is_empty());
    }
}
