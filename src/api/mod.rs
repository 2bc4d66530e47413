use rocket::Route;

mod auth;
mod ballot;
mod election;
mod profile;
mod results;
mod user;
mod whitelist;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(profile::routes());
    routes.extend(election::routes());
    routes.extend(whitelist::routes());
    routes.extend(ballot::routes());
    routes.extend(results::routes());
    routes.extend(user::routes());
    routes
}
