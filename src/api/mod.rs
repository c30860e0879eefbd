use rocket::{
    http::Status, response::status::Custom, serde::json::Json, Catcher, Request, Route,
};

use crate::model::api::response::Failure;

mod admin;
mod auth;
mod candidate;
mod common;
mod election;
mod results;
mod voter;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(candidate::routes());
    routes.extend(election::routes());
    routes.extend(results::routes());
    routes.extend(voter::routes());
    routes.extend(voting::routes());
    routes
}

/// Catchers rendering every error in the standard failure envelope.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        internal_error,
        fallback
    ]
}

#[catch(400)]
fn bad_request() -> Json<Failure> {
    Json(Failure::new("Bad request"))
}

#[catch(401)]
fn unauthorized() -> Json<Failure> {
    Json(Failure::new("Authentication required"))
}

#[catch(403)]
fn forbidden() -> Json<Failure> {
    Json(Failure::new("Forbidden"))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Failure> {
    Json(Failure::new(format!("No route for {}", req.uri())))
}

/// Bodies that parse as JSON (or a form) but have missing or mistyped fields are
/// reported as plain validation failures.
#[catch(422)]
fn unprocessable() -> Custom<Json<Failure>> {
    Custom(
        Status::BadRequest,
        Json(Failure::new("Missing or invalid fields in request body")),
    )
}

#[catch(500)]
fn internal_error() -> Json<Failure> {
    Json(Failure::new("Internal server error"))
}

#[catch(default)]
fn fallback(status: Status, _req: &Request) -> Json<Failure> {
    Json(Failure::new(status.reason_lossy()))
}
