use log::info;
use mongodb::{bson::doc, options::FindOptions, Client};
use rocket::{
    form::Form,
    futures::TryStreamExt,
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        candidate::{
            CandidateCredentials, CandidateDescription, CandidateProfile, CandidateRegistration,
            CandidateVotes,
        },
        election::ElectionSummary,
        response::Message,
    },
    common::{election::ElectionStatus, password::PasswordHash},
    db::{
        admin::Admin,
        candidate::{Candidate, NewCandidate},
        election::Election,
    },
    ledger,
    mongodb::{is_duplicate_key_error, Coll, Id, IdParam},
    photo::{remove_photo, save_photo},
};
use crate::Config;

use super::common::{created, election_by_id, ok, resolve_votes, ApiResult, Created};

pub fn routes() -> Vec<Route> {
    routes![
        register,
        login,
        election_candidates,
        candidate_votes,
        candidate_profile,
        delete_candidate,
    ]
}

#[post("/candidates/register", data = "<registration>")]
pub async fn register(
    mut registration: Form<CandidateRegistration<'_>>,
    elections: Coll<Election>,
    new_candidates: Coll<NewCandidate>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Created<CandidateDescription> {
    registration.validate()?;

    // Candidates can only join elections that have not finished.
    let election = election_by_id(&elections, registration.election_id).await?;
    if !matches!(
        election.current_status(),
        ElectionStatus::Upcoming | ElectionStatus::Active
    ) {
        return Err(Error::bad_request("Election is not open for registration"));
    }

    let photo = match registration.photo.as_mut() {
        Some(file) => Some(save_photo(file, config.upload_dir()).await?),
        None => None,
    };
    let candidate = NewCandidate::new(
        registration.name.trim().to_string(),
        registration.email.trim().to_string(),
        PasswordHash::new(&registration.password)?,
        election.id,
        photo.clone(),
    );

    match enrol(candidate, &new_candidates, &candidates, &elections, db_client).await {
        Ok(candidate) => {
            info!(
                "Registered candidate {} in election {}",
                candidate.id, election.id
            );
            created(candidate.into())
        }
        Err(err) => {
            if let Some(photo) = photo {
                remove_photo(&photo, config.upload_dir()).await;
            }
            Err(err)
        }
    }
}

/// Insert a candidate and add it to its election, atomically.
async fn enrol(
    candidate: NewCandidate,
    new_candidates: &Coll<NewCandidate>,
    candidates: &Coll<Candidate>,
    elections: &Coll<Election>,
    db_client: &Client,
) -> Result<Candidate> {
    let election_id = candidate.election_id;
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let new_id: Id = match new_candidates
        .insert_one_with_session(&candidate, None, &mut session)
        .await
    {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::Status(Status::InternalServerError, "Bad candidate ID".into()))?
            .into(),
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::bad_request("Email already registered"))
        }
        Err(err) => return Err(err.into()),
    };

    let mut election = elections
        .find_one_with_session(election_id.as_doc(), None, &mut session)
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;
    election.refresh_status();
    let update = doc! {
        "$push": {"candidates": new_id},
        "$set": {"status": election.status},
    };
    elections
        .update_one_with_session(election_id.as_doc(), update, None, &mut session)
        .await?;

    ledger::commit(&mut session).await?;

    candidates
        .find_one(new_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))
}

#[post("/candidates/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<CandidateCredentials>,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
    config: &State<Config>,
) -> ApiResult<CandidateProfile> {
    if credentials.email.is_empty() || credentials.password.is_empty() {
        return Err(Error::bad_request("Email and password are required"));
    }

    let candidate = candidates
        .find_one(doc! {"email": &credentials.email}, None)
        .await?
        .filter(|candidate| candidate.password_hash.verify(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid email or password"))?;

    let token = AuthToken::new(&candidate);
    cookies.add(token.into_cookie(config)?);

    profile_of(candidate, &elections, &candidates).await
}

/// All candidates standing in an election, most votes first.
#[get("/candidates/<election_id>")]
async fn election_candidates(
    election_id: IdParam,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<Vec<CandidateDescription>> {
    let election = election_by_id(&elections, election_id?).await?;

    let options = FindOptions::builder()
        .sort(doc! {"votes": -1, "_id": 1})
        .build();
    let standing = candidates
        .find(doc! {"electionId": election.id}, options)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    ok(standing)
}

#[get("/candidates/votes/<candidate_id>")]
async fn candidate_votes(
    candidate_id: IdParam,
    candidates: Coll<Candidate>,
) -> ApiResult<CandidateVotes> {
    let candidate = candidates
        .find_one(candidate_id?.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    ok(candidate.into())
}

#[get("/profile/candidate/<candidate_id>")]
async fn candidate_profile(
    candidate_id: IdParam,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
) -> ApiResult<CandidateProfile> {
    let candidate = candidates
        .find_one(candidate_id?.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    profile_of(candidate, &elections, &candidates).await
}

async fn profile_of(
    candidate: Candidate,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
) -> ApiResult<CandidateProfile> {
    let election = elections
        .find_one(candidate.election_id.as_doc(), None)
        .await?
        .map(ElectionSummary::from);
    let votes_cast = resolve_votes(&candidate.votes_cast, elections, candidates).await?;
    ok(CandidateProfile::new(candidate, election, votes_cast))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: IdParam,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> ApiResult<Message> {
    let candidate_id = candidate_id?;

    let candidate = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let candidate = candidates
            .find_one_with_session(candidate_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found("Candidate"))?;

        // Take the candidate out of its election, along with its votes.
        let election = elections
            .find_one_with_session(candidate.election_id.as_doc(), None, &mut session)
            .await?;
        if let Some(mut election) = election {
            election.refresh_status();
            let update = doc! {
                "$pull": {"candidates": candidate_id},
                "$inc": {"totalVotes": -i64::from(candidate.votes)},
                "$set": {"status": election.status},
            };
            elections
                .update_one_with_session(election.id.as_doc(), update, None, &mut session)
                .await?;
        }

        candidates
            .delete_one_with_session(candidate_id.as_doc(), None, &mut session)
            .await?;

        ledger::commit(&mut session).await?;
        candidate
    };

    if let Some(photo) = &candidate.photo {
        remove_photo(photo, config.upload_dir()).await;
    }
    info!("Deleted candidate {candidate_id}");
    ok(Message::new("Candidate deleted successfully"))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{serde_json::json, Value},
    };

    use crate::api::common::fixtures::{insert_candidate, insert_election, multipart};
    use crate::model::{
        api::{auth::AUTH_TOKEN_COOKIE, response::Success},
        db::election::ElectionCore,
    };

    use super::*;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n not really a png";

    fn registration_fields(election_id: Id) -> Vec<(&'static str, String)> {
        vec![
            ("name", "Alice".to_string()),
            ("email", "alice@example.com".to_string()),
            ("password", "candidate-password".to_string()),
            ("electionId", election_id.to_string()),
        ]
    }

    #[backend_test]
    async fn register_with_photo(client: Client, elections: Coll<Election>) {
        let election = insert_election(&elections, ElectionCore::future_example()).await;

        let (content_type, body) = multipart(
            &registration_fields(election.id),
            Some(("alice.png", ContentType::PNG, PNG_BYTES)),
        );
        let response = client
            .post(uri!(register))
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let body: Success<CandidateDescription> = response.into_json().await.unwrap();
        let candidate = body.data;
        assert_eq!(candidate.name, "Alice");
        assert_eq!(candidate.votes, 0);
        assert_eq!(Id::from(candidate.election_id), election.id);
        let photo = candidate.photo.unwrap();
        assert!(photo.starts_with("/uploads/") && photo.ends_with(".png"));

        // The photo is served.
        let response = client.get(photo.as_str()).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(response.into_bytes().await.unwrap(), PNG_BYTES);

        // The election lists the candidate.
        let election = election_by_id(&elections, election.id).await.unwrap();
        assert_eq!(election.candidates, vec![Id::from(candidate.id)]);

        // Tidy up the stored photo.
        let config = client.rocket().state::<Config>().unwrap();
        remove_photo(&photo, config.upload_dir()).await;
    }

    #[backend_test]
    async fn register_rejected(client: Client, elections: Coll<Election>, candidates: Coll<Candidate>) {
        // Finished elections are closed.
        let past = insert_election(&elections, ElectionCore::past_example()).await;
        let (content_type, body) = multipart(&registration_fields(past.id), None);
        let response = client
            .post(uri!(register))
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Unknown election.
        let (content_type, body) = multipart(&registration_fields(Id::new()), None);
        let response = client
            .post(uri!(register))
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        // Missing fields.
        let current = insert_election(&elections, ElectionCore::current_example()).await;
        let mut fields = registration_fields(current.id);
        fields.retain(|(name, _)| *name != "password");
        let (content_type, body) = multipart(&fields, None);
        let response = client
            .post(uri!(register))
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Duplicate email.
        for expected in [Status::Created, Status::BadRequest] {
            let (content_type, body) = multipart(&registration_fields(current.id), None);
            let response = client
                .post(uri!(register))
                .header(content_type)
                .body(body)
                .dispatch()
                .await;
            assert_eq!(expected, response.status());
        }

        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 1);
        let current = election_by_id(&elections, current.id).await.unwrap();
        assert_eq!(current.candidates.len(), 1);
    }

    #[backend_test]
    async fn login_and_profile(client: Client, elections: Coll<Election>, candidates: Coll<Candidate>) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let alice = insert_candidate(&elections, &candidates, "Alice", election.id).await;

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(CandidateCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let raw: Value = response.into_json().await.unwrap();
        assert_eq!(raw["data"]["role"], "candidate");
        assert_eq!(raw["data"]["election"]["name"], election.name.as_str());
        assert_eq!(raw["data"]["election"]["status"], "active");
        assert!(raw["data"].get("passwordHash").is_none());

        let response = client
            .get(uri!(candidate_profile(alice.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let profile: Success<CandidateProfile> = response.into_json().await.unwrap();
        assert_eq!(profile.data.name, "Alice");
        assert!(profile.data.votes_cast.is_empty());

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!({"email": "alice@example.com", "password": "wrong-password"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn list_and_count(client: Client, elections: Coll<Election>, candidates: Coll<Candidate>) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let alice = insert_candidate(&elections, &candidates, "Alice", election.id).await;
        let bob = insert_candidate(&elections, &candidates, "Bob", election.id).await;
        candidates
            .update_one(bob.id.as_doc(), doc! {"$inc": {"votes": 2}}, None)
            .await
            .unwrap();

        let response = client
            .get(uri!(election_candidates(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let listed: Success<Vec<CandidateDescription>> = response.into_json().await.unwrap();
        let names: Vec<_> = listed.data.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Alice"]);

        let response = client.get(uri!(candidate_votes(alice.id))).dispatch().await;
        let votes: Success<CandidateVotes> = response.into_json().await.unwrap();
        assert_eq!(votes.data.votes, 0);
        assert_eq!(Id::from(votes.data.election_id), election.id);

        let response = client
            .get(uri!(election_candidates(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get("/candidates/votes/12345").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(admin)]
    async fn delete_cascades(client: Client, elections: Coll<Election>, candidates: Coll<Candidate>) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let alice = insert_candidate(&elections, &candidates, "Alice", election.id).await;
        let bob = insert_candidate(&elections, &candidates, "Bob", election.id).await;
        candidates
            .update_one(bob.id.as_doc(), doc! {"$inc": {"votes": 3}}, None)
            .await
            .unwrap();
        elections
            .update_one(election.id.as_doc(), doc! {"$inc": {"totalVotes": 3}}, None)
            .await
            .unwrap();

        // A candidate with no votes.
        let response = client
            .delete(uri!(delete_candidate(alice.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let after = election_by_id(&elections, election.id).await.unwrap();
        assert_eq!(after.candidates, vec![bob.id]);
        assert_eq!(after.total_votes, 3);

        // A candidate with votes takes them along.
        let response = client
            .delete(uri!(delete_candidate(bob.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let after = election_by_id(&elections, election.id).await.unwrap();
        assert!(after.candidates.is_empty());
        assert_eq!(after.total_votes, 0);
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);

        let response = client
            .delete(uri!(delete_candidate(bob.id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn delete_requires_admin(client: Client, elections: Coll<Election>, candidates: Coll<Candidate>) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let alice = insert_candidate(&elections, &candidates, "Alice", election.id).await;

        let response = client
            .delete(uri!(delete_candidate(alice.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 1);
    }
}
