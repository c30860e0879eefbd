use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        voter::{ProfileUpdate, VoterCredentials, VoterProfile, VoterRegistration},
    },
    db::{
        candidate::Candidate,
        election::Election,
        voter::{NewVoter, Voter},
    },
    mongodb::{is_duplicate_key_error, Coll, Id, IdParam},
};
use crate::Config;

use super::common::{created, ok, resolve_votes, ApiResult, Created};

pub fn routes() -> Vec<Route> {
    routes![register, login, own_profile, profile, update_profile]
}

#[post("/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<VoterRegistration>,
    new_voters: Coll<NewVoter>,
    voters: Coll<Voter>,
) -> Created<VoterProfile> {
    let voter: NewVoter = registration.0.try_into()?;
    let new_id: Id = match new_voters.insert_one(&voter, None).await {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::Status(Status::InternalServerError, "Bad voter ID".into()))?
            .into(),
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::bad_request("Username or email already exists"))
        }
        Err(err) => return Err(err.into()),
    };

    let voter = voters
        .find_one(new_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Voter"))?;
    created(VoterProfile::new(voter, Vec::new()))
}

#[post("/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    config: &State<Config>,
) -> ApiResult<VoterProfile> {
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(Error::bad_request("Username and password are required"));
    }

    let voter = voters
        .find_one(doc! {"username": &credentials.username}, None)
        .await?
        .filter(|voter| voter.password_hash.verify(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config)?);

    let votes = resolve_votes(&voter.votes, &elections, &candidates).await?;
    ok(VoterProfile::new(voter, votes))
}

#[get("/profile")]
async fn own_profile(
    token: AuthToken<Voter>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<VoterProfile> {
    voter_profile(token.id, &voters, &elections, &candidates).await
}

#[get("/profile/<voter_id>")]
async fn profile(
    voter_id: IdParam,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<VoterProfile> {
    voter_profile(voter_id?, &voters, &elections, &candidates).await
}

async fn voter_profile(
    voter_id: Id,
    voters: &Coll<Voter>,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
) -> ApiResult<VoterProfile> {
    let voter = voters
        .find_one(voter_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Voter"))?;
    let votes = resolve_votes(&voter.votes, elections, candidates).await?;
    ok(VoterProfile::new(voter, votes))
}

#[put("/profile/<voter_id>", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken<Voter>,
    voter_id: IdParam,
    update: Json<ProfileUpdate>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<VoterProfile> {
    let voter_id = voter_id?;
    if token.id != voter_id {
        return Err(Error::Status(
            Status::Forbidden,
            "Cannot update another voter's profile".to_string(),
        ));
    }

    let voter = apply_update(voter_id, &update, &voters).await?;
    let votes = resolve_votes(&voter.votes, &elections, &candidates).await?;
    ok(VoterProfile::new(voter, votes))
}

/// Change a voter's contact details, returning the updated voter.
pub(super) async fn apply_update(
    voter_id: Id,
    update: &ProfileUpdate,
    voters: &Coll<Voter>,
) -> Result<Voter> {
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    match voters
        .find_one_and_update(voter_id.as_doc(), update.to_update()?, options)
        .await
    {
        Ok(voter) => voter.ok_or_else(|| Error::not_found("Voter")),
        Err(err) if is_duplicate_key_error(&err) => Err(Error::bad_request("Email already in use")),
        Err(err) => Err(err.into()),
    }
}
