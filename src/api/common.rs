use std::collections::{HashMap, HashSet};

use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    futures::TryStreamExt,
    http::Status,
    response::status::Custom,
    serde::json::Json,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{response::Success, vote::VoteDescription},
    db::{candidate::Candidate, election::Election, vote::VoteRecord},
    mongodb::{Coll, Id},
};

/// A successful JSON response.
pub type ApiResult<T> = Result<Json<Success<T>>>;

/// A successful JSON response for a newly created resource.
pub type Created<T> = Result<Custom<Json<Success<T>>>>;

/// Wrap `data` in the success envelope.
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Success::new(data)))
}

/// Wrap `data` in the success envelope, with status 201.
pub fn created<T>(data: T) -> Created<T> {
    Ok(Custom(Status::Created, Json(Success::new(data))))
}

/// Get an election by ID, or fail with not found.
pub async fn election_by_id(elections: &Coll<Election>, election_id: Id) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Election"))
}

/// Get every candidate standing in an election, in registration order.
pub async fn election_candidates(
    candidates: &Coll<Candidate>,
    election_id: Id,
) -> Result<Vec<Candidate>> {
    let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
    let candidates = candidates
        .find(doc! {"electionId": election_id}, options)
        .await?
        .try_collect()
        .await?;
    Ok(candidates)
}

/// Look up the elections and candidates named by some vote records.
pub async fn resolve_votes(
    records: &[VoteRecord],
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
) -> Result<Vec<VoteDescription>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let election_ids: HashSet<Id> = records.iter().map(|vote| vote.election_id).collect();
    let candidate_ids: HashSet<Id> = records.iter().map(|vote| vote.candidate_id).collect();

    let elections: HashMap<Id, Election> = elections
        .find(doc! {"_id": {"$in": election_ids.into_iter().collect::<Vec<_>>()}}, None)
        .await?
        .map_ok(|election| (election.id, election))
        .try_collect()
        .await?;
    let candidates: HashMap<Id, Candidate> = candidates
        .find(doc! {"_id": {"$in": candidate_ids.into_iter().collect::<Vec<_>>()}}, None)
        .await?
        .map_ok(|candidate| (candidate.id, candidate))
        .try_collect()
        .await?;

    Ok(records
        .iter()
        .map(|vote| {
            VoteDescription::resolve(
                vote,
                elections.get(&vote.election_id),
                candidates.get(&vote.candidate_id),
            )
        })
        .collect())
}
