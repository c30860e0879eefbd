use log::info;
use mongodb::{bson::doc, options::FindOptions, Client};
use rocket::{futures::TryStreamExt, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{auth::AuthToken, election::ElectionResults},
    db::{admin::Admin, candidate::Candidate, election::Election},
    ledger,
    mongodb::{Coll, Id, IdParam},
};

use super::common::{election_by_id, election_candidates, ok, ApiResult};

pub fn routes() -> Vec<Route> {
    routes![get_results, snapshot_results]
}

/// Current results, computed on the fly.
#[get("/elections/<election_id>/results")]
async fn get_results(
    election_id: IdParam,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<ElectionResults> {
    let election = election_by_id(&elections, election_id?).await?;
    let standing = election_candidates(&candidates, election.id).await?;
    ok(ElectionResults::tally(&election, standing))
}

/// Compute the results and store them on the election.
#[post("/elections/<election_id>/results")]
async fn snapshot_results(
    _token: AuthToken<Admin>,
    election_id: IdParam,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
) -> ApiResult<ElectionResults> {
    let election_id = election_id?;
    let results = snapshot(election_id, &elections, &candidates, db_client).await?;
    info!(
        "Stored results for election {election_id}: {} votes across {} candidates",
        results.election.total_votes,
        results.candidates.len()
    );
    ok(results)
}

async fn snapshot(
    election_id: Id,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
    db_client: &Client,
) -> Result<ElectionResults> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let election = elections
        .find_one_with_session(election_id.as_doc(), None, &mut session)
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;
    let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
    let mut cursor = candidates
        .find_with_session(doc! {"electionId": election_id}, options, &mut session)
        .await?;
    let standing: Vec<Candidate> = cursor.stream(&mut session).try_collect().await?;

    let results = ElectionResults::tally(&election, standing);
    let update = doc! {
        "$set": {
            "totalVotes": results.election.total_votes,
            "candidates": results.ranking(),
            "status": results.election.status,
        }
    };
    elections
        .update_one_with_session(election_id.as_doc(), update, None, &mut session)
        .await?;

    ledger::commit(&mut session).await?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::api::common::fixtures::{insert_candidate, insert_election};
    use crate::model::{
        api::response::Success,
        common::election::ElectionStatus,
        db::election::ElectionCore,
    };

    use super::*;

    /// Store candidates with the given tallies, in registration order.
    async fn standing_with(
        elections: &Coll<Election>,
        candidates: &Coll<Candidate>,
        election_id: Id,
        tallies: &[(&str, u32)],
    ) -> Vec<Id> {
        let mut ids = Vec::new();
        for (name, votes) in tallies {
            let candidate = insert_candidate(elections, candidates, name, election_id).await;
            candidates
                .update_one(candidate.id.as_doc(), doc! {"$set": {"votes": *votes}}, None)
                .await
                .unwrap();
            ids.push(candidate.id);
        }
        ids
    }

    #[backend_test]
    async fn results_are_ranked(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let ids = standing_with(
            &elections,
            &candidates,
            election.id,
            &[("Alice", 1), ("Bob", 5), ("Carol", 3), ("Dave", 3)],
        )
        .await;

        let response = client
            .get(uri!(get_results(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let results: Success<ElectionResults> = response.into_json().await.unwrap();
        let results = results.data;

        assert_eq!(results.election.total_votes, 12);
        assert_eq!(results.ranking(), vec![ids[1], ids[2], ids[3], ids[0]]);
        let percentages: Vec<u32> = results.candidates.iter().map(|c| c.percentage).collect();
        assert_eq!(percentages, vec![42, 25, 25, 8]);
        assert_eq!(results.winner.map(|w| w.name), Some("Bob".to_string()));

        // Reading results writes nothing.
        let stored = election_by_id(&elections, election.id).await.unwrap();
        assert_eq!(stored.total_votes, 0);
        assert_eq!(stored.candidates, ids);
    }

    #[backend_test]
    async fn results_without_votes(client: Client, elections: Coll<Election>) {
        let election = insert_election(&elections, ElectionCore::future_example()).await;

        let response = client
            .get(uri!(get_results(election.id)))
            .dispatch()
            .await;
        let results: Success<ElectionResults> = response.into_json().await.unwrap();
        assert_eq!(results.data.election.total_votes, 0);
        assert!(results.data.candidates.is_empty());
        assert!(results.data.winner.is_none());

        let response = client.get(uri!(get_results(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn snapshot_is_stored(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        // Stored as active, but ended an hour ago.
        let mut core = ElectionCore::past_example();
        core.status = ElectionStatus::Active;
        let election = insert_election(&elections, core).await;
        let ids = standing_with(
            &elections,
            &candidates,
            election.id,
            &[("Alice", 2), ("Bob", 7)],
        )
        .await;

        let response = client
            .post(uri!(snapshot_results(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let results: Success<ElectionResults> = response.into_json().await.unwrap();
        assert_eq!(results.data.election.status, ElectionStatus::Completed);
        assert_eq!(results.data.election.total_votes, 9);

        let stored = election_by_id(&elections, election.id).await.unwrap();
        assert_eq!(stored.total_votes, 9);
        assert_eq!(stored.candidates, vec![ids[1], ids[0]]);
        assert_eq!(stored.election.status, ElectionStatus::Completed);
    }

    #[backend_test]
    async fn snapshot_requires_admin(client: Client, elections: Coll<Election>) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let response = client
            .post(uri!(snapshot_results(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
