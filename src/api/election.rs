use chrono::Utc;
use log::info;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        candidate::CandidateTally,
        election::{ElectionDescription, ElectionSpec, StatusUpdate},
        response::Message,
    },
    common::election::ElectionStatus,
    db::{
        admin::Admin,
        candidate::Candidate,
        election::{Election, NewElection},
        voter::Voter,
    },
    ledger,
    mongodb::{Coll, Id, IdParam},
    photo::remove_photo,
};
use crate::Config;

use super::common::{
    created, election_by_id, election_candidates, ok, ApiResult, Created,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        get_elections,
        get_active_elections,
        get_election,
        update_status,
        delete_election,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Created<ElectionDescription> {
    let election: NewElection = spec.0.try_into()?;
    let new_id: Id = new_elections
        .insert_one(&election, None)
        .await?
        .inserted_id
        .as_object_id()
        .ok_or_else(|| Error::not_found("Election"))?
        .into();
    info!("Created election {new_id} ({})", election.name);

    let election = election_by_id(&elections, new_id).await?;
    created(election.into())
}

/// Every election, newest first.
#[get("/elections")]
async fn get_elections(elections: Coll<Election>) -> ApiResult<Vec<ElectionDescription>> {
    let options = FindOptions::builder().sort(doc! {"createdAt": -1}).build();
    let all = elections
        .find(None, options)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    ok(all)
}

/// Elections accepting votes right now, newest first.
#[get("/elections/active")]
async fn get_active_elections(
    elections: Coll<Election>,
) -> ApiResult<Vec<ElectionDescription>> {
    let options = FindOptions::builder().sort(doc! {"createdAt": -1}).build();
    let active = elections
        .find(ElectionStatus::active_filter(Utc::now()), options)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    ok(active)
}

#[get("/elections/<election_id>")]
async fn get_election(
    election_id: IdParam,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<ElectionDescription<CandidateTally>> {
    let election = election_by_id(&elections, election_id?).await?;
    let standing = election_candidates(&candidates, election.id)
        .await?
        .into_iter()
        .map(CandidateTally::from)
        .collect();
    ok(ElectionDescription::with_candidates(election, standing))
}

/// Manually set an election's status. The requested status is subject to the usual
/// derivation, so a finished election stays completed.
#[put("/elections/<election_id>/status", data = "<update>", format = "json")]
async fn update_status(
    _token: AuthToken<Admin>,
    election_id: IdParam,
    update: Json<StatusUpdate>,
    elections: Coll<Election>,
) -> ApiResult<ElectionDescription> {
    let election_id = election_id?;
    let election = election_by_id(&elections, election_id).await?;

    let status = ElectionStatus::derive(
        update.status,
        election.start_date,
        election.end_date,
        Utc::now(),
    );
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let election = elections
        .find_one_and_update(
            election_id.as_doc(),
            doc! {"$set": {"status": status}},
            options,
        )
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;
    info!(
        "Election {election_id} status set to {status:?} (requested {:?})",
        update.status
    );

    ok(election.into())
}

/// Delete an election along with its candidates and every vote cast in it.
#[delete("/elections/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: IdParam,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    voters: Coll<Voter>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> ApiResult<Message> {
    let election_id = election_id?;
    let removed = remove_election(election_id, &elections, &candidates, &voters, db_client).await?;

    for photo in removed.iter().filter_map(|candidate| candidate.photo.as_ref()) {
        remove_photo(photo, config.upload_dir()).await;
    }
    info!(
        "Deleted election {election_id} and {} candidates",
        removed.len()
    );
    ok(Message::new("Election deleted successfully"))
}

/// Remove an election and everything that refers to it, returning the removed candidates.
async fn remove_election(
    election_id: Id,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
    voters: &Coll<Voter>,
    db_client: &Client,
) -> Result<Vec<Candidate>> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = elections
        .delete_one_with_session(election_id.as_doc(), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found("Election"));
    }

    let standing = doc! {"electionId": election_id};
    let mut cursor = candidates
        .find_with_session(standing.clone(), None, &mut session)
        .await?;
    let removed: Vec<Candidate> = cursor.stream(&mut session).try_collect().await?;
    candidates
        .delete_many_with_session(standing, None, &mut session)
        .await?;

    // Forget the votes cast in this election.
    voters
        .update_many_with_session(
            doc! {"votes.electionId": election_id},
            doc! {"$pull": {"votes": {"electionId": election_id}}},
            None,
            &mut session,
        )
        .await?;
    candidates
        .update_many_with_session(
            doc! {"votesCast.electionId": election_id},
            doc! {"$pull": {"votesCast": {"electionId": election_id}}},
            None,
            &mut session,
        )
        .await?;

    ledger::commit(&mut session).await?;
    Ok(removed)
}
