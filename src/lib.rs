#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

#[cfg(test)]
#[macro_use]
extern crate db_test;

use rocket::{http::Status, serde::json::Json, Build, Catcher, Request, Rocket};

use crate::config::{ConfigFairing, NotifierFairing, StoreFairing};
use crate::error::ErrorBody;
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod store;
pub mod voting;

/// Assemble the server. Fairings load the configuration, open the store and
/// set up notifications at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(NotifierFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", catchers())
}

fn catchers() -> Vec<Catcher> {
    catchers![bad_request, unauthenticated, forbidden, not_found, unprocessable, internal]
}

fn error_body(status: Status, kind: &'static str, message: &str) -> (Status, Json<ErrorBody>) {
    let body = ErrorBody {
        error: kind,
        message: message.to_string(),
    };
    (status, Json(body))
}

#[catch(400)]
fn bad_request(_req: &Request) -> (Status, Json<ErrorBody>) {
    error_body(Status::BadRequest, "BadRequest", "Malformed request")
}

#[catch(401)]
fn unauthenticated(_req: &Request) -> (Status, Json<ErrorBody>) {
    error_body(Status::Unauthorized, "Unauthenticated", "Not logged in")
}

#[catch(403)]
fn forbidden(_req: &Request) -> (Status, Json<ErrorBody>) {
    error_body(Status::Forbidden, "Unauthorized", "Not permitted")
}

#[catch(404)]
fn not_found(req: &Request) -> (Status, Json<ErrorBody>) {
    error_body(Status::NotFound, "NotFound", &format!("No route for {}", req.uri()))
}

#[catch(422)]
fn unprocessable(_req: &Request) -> (Status, Json<ErrorBody>) {
    error_body(
        Status::UnprocessableEntity,
        "BadRequest",
        "Request body could not be understood",
    )
}

#[catch(500)]
fn internal(_req: &Request) -> (Status, Json<ErrorBody>) {
    error_body(Status::InternalServerError, "Internal", "Internal server error")
}

/// A server over the given store and notifier, configured for tests.
#[cfg(test)]
pub(crate) fn rocket_for_store(repo: store::Repo, postman: notify::Postman) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("auth_ttl", 3600))
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("admin_email", "root@example.com"))
        .merge(("admin_password", "root-password"))
        .merge(("log_level", "off"));
    rocket::custom(figment)
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(repo)
        .manage(postman)
        .mount("/", api::routes())
        .register("/", catchers())
}
