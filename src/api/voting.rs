use log::info;
use mongodb::{Client, Database};
use rocket::{serde::json::Json, Route, State};

use crate::error::Error;
use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::Caster,
        vote::{VoteReceipt, VoteRequest},
        voter::VotingStatus,
    },
    db::{candidate::Candidate, voter::Voter},
    ledger::{self, Ballotbox},
    mongodb::{Coll, Id, IdParam},
};

use super::common::{ok, ApiResult};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, voting_status]
}

/// Cast a vote as whoever is logged in, voter or candidate.
#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    caster: Caster,
    election_id: IdParam,
    vote: Json<VoteRequest>,
    request_id: &RequestId,
    db_client: &State<Client>,
    db: &State<Database>,
) -> ApiResult<VoteReceipt> {
    let election_id = election_id?;
    let candidate_id = Id::from(vote.candidate_id);
    let voter_id = caster.id();

    let record = match caster {
        Caster::Voter(_) => {
            ledger::cast_vote::<Voter>(db_client, db, voter_id, election_id, candidate_id).await
        }
        Caster::Candidate(_) => {
            ledger::cast_vote::<Candidate>(db_client, db, voter_id, election_id, candidate_id)
                .await
        }
    }?;
    info!("[{request_id}] Vote by {voter_id} recorded in election {election_id}");

    ok(record.into())
}

/// Has the given user voted in the given election? Voters are checked first, then
/// candidates.
#[get("/elections/<election_id>/voting-status/<user_id>")]
async fn voting_status(
    election_id: IdParam,
    user_id: IdParam,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
) -> ApiResult<VotingStatus> {
    let election_id = election_id?;
    let user_id = user_id?;

    let has_voted = match voters.find_one(user_id.as_doc(), None).await? {
        Some(voter) => voter.has_voted_in(election_id),
        None => candidates
            .find_one(user_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found("Voter"))?
            .has_voted_in(election_id),
    };
    ok(VotingStatus { has_voted })
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{
        futures::future::join,
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{serde_json::json, Value},
    };

    use crate::api::common::fixtures::{
        insert_candidate, insert_election, insert_voter, login_as_voter,
    };
    use crate::model::{
        api::{
            candidate::CandidateCredentials, election::ElectionResults, response::Success,
            voter::VoterRegistration,
        },
        db::election::{Election, ElectionCore},
    };

    use super::*;

    async fn vote_for(client: &Client, election_id: Id, candidate_id: Id) -> (Status, Value) {
        let response = client
            .post(uri!(cast_vote(election_id)))
            .header(ContentType::JSON)
            .body(json!({ "candidateId": candidate_id.to_string() }).to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json().await.unwrap())
    }

    async fn has_voted(client: &Client, election_id: Id, user_id: Id) -> bool {
        let response = client
            .get(uri!(voting_status(election_id, user_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let status: Success<VotingStatus> = response.into_json().await.unwrap();
        status.data.has_voted
    }

    #[backend_test(voter)]
    async fn one_vote_per_election(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
        voters: Coll<Voter>,
    ) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let a = insert_candidate(&elections, &candidates, "Alice", election.id).await;
        let b = insert_candidate(&elections, &candidates, "Bob", election.id).await;
        let u = voters
            .find_one(doc! {"username": VoterRegistration::example().username}, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!has_voted(&client, election.id, u.id).await);

        let (status, body) = vote_for(&client, election.id, a.id).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(body["data"]["candidateId"], a.id.to_string());
        assert!(has_voted(&client, election.id, u.id).await);

        // A second vote in the same election is refused and changes nothing.
        let (status, body) = vote_for(&client, election.id, b.id).await;
        assert_eq!(Status::Conflict, status);
        assert_eq!(body["message"], "Already voted in this election");
        let stored = voters.find_one(u.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.votes.len(), 1);
        assert_eq!(stored.votes[0].candidate_id, a.id);

        login_as_voter(&client, VoterRegistration::example2()).await;
        let (status, _) = vote_for(&client, election.id, b.id).await;
        assert_eq!(Status::Ok, status);

        let a = candidates.find_one(a.id.as_doc(), None).await.unwrap().unwrap();
        let b = candidates.find_one(b.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!((a.votes, b.votes), (1, 1));
        let election = elections.find_one(election.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(election.total_votes, 2);

        let results = ElectionResults::tally(&election, vec![a, b]);
        assert_eq!(results.election.total_votes, 2);
        let percentages: Vec<u32> = results.candidates.iter().map(|c| c.percentage).collect();
        assert_eq!(percentages, vec![50, 50]);
    }

    #[backend_test]
    async fn concurrent_votes_count_once(
        client: Client,
        db: Database,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
        voters: Coll<Voter>,
    ) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let a = insert_candidate(&elections, &candidates, "Alice", election.id).await;
        let b = insert_candidate(&elections, &candidates, "Bob", election.id).await;
        let voter_id = insert_voter(&voters, VoterRegistration::example()).await;
        let db_client = client.rocket().state::<mongodb::Client>().unwrap();

        let (first, second) = join(
            ledger::cast_vote::<Voter>(db_client, &db, voter_id, election.id, a.id),
            ledger::cast_vote::<Voter>(db_client, &db, voter_id, election.id, b.id),
        )
        .await;
        let outcomes = [first, second];
        let recorded: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        let refused: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();
        assert_eq!(recorded.len(), 1);
        assert_eq!(refused.len(), 1);
        assert_eq!(refused[0].status(), Status::Conflict);
        assert_eq!(refused[0].message(), "Already voted in this election");

        let voter = voters.find_one(voter_id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(voter.votes.len(), 1);
        assert_eq!(voter.votes[0].candidate_id, recorded[0].candidate_id);
        let election = elections.find_one(election.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(election.total_votes, 1);
        let a = candidates.find_one(a.id.as_doc(), None).await.unwrap().unwrap();
        let b = candidates.find_one(b.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(a.votes + b.votes, 1);
    }

    #[backend_test]
    async fn candidates_can_vote(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let home = insert_election(&elections, ElectionCore::current_example()).await;
        let alice = insert_candidate(&elections, &candidates, "Alice", home.id).await;
        let bob = insert_candidate(&elections, &candidates, "Bob", home.id).await;

        let response = client
            .post(uri!(crate::api::candidate::login))
            .header(ContentType::JSON)
            .body(json!(CandidateCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let (status, _) = vote_for(&client, home.id, bob.id).await;
        assert_eq!(Status::Ok, status);
        let (status, _) = vote_for(&client, home.id, alice.id).await;
        assert_eq!(Status::Conflict, status);

        let alice = candidates.find_one(alice.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(alice.votes, 0);
        assert_eq!(alice.votes_cast.len(), 1);
        assert_eq!(alice.votes_cast[0].candidate_id, bob.id);
        assert!(has_voted(&client, home.id, alice.id).await);
    }

    #[backend_test(voter)]
    async fn rejected_votes(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
        voters: Coll<Voter>,
    ) {
        let current = insert_election(&elections, ElectionCore::current_example()).await;
        let future = insert_election(&elections, ElectionCore::future_example()).await;
        let past = insert_election(&elections, ElectionCore::past_example()).await;
        let here = insert_candidate(&elections, &candidates, "Alice", current.id).await;
        let elsewhere = insert_candidate(&elections, &candidates, "Bob", future.id).await;
        let gone = insert_candidate(&elections, &candidates, "Carol", past.id).await;

        let (status, body) = vote_for(&client, future.id, elsewhere.id).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(body["message"], "Election is not active");

        let (status, _) = vote_for(&client, past.id, gone.id).await;
        assert_eq!(Status::BadRequest, status);

        let (status, body) = vote_for(&client, current.id, elsewhere.id).await;
        assert_eq!(Status::NotFound, status);
        assert_eq!(body["message"], "Candidate not found in this election");

        let (status, _) = vote_for(&client, Id::new(), here.id).await;
        assert_eq!(Status::NotFound, status);

        let response = client
            .post(uri!(cast_vote(current.id)))
            .header(ContentType::JSON)
            .body(json!({"candidateId": "not-an-id"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Nothing was recorded anywhere.
        let voter = voters
            .find_one(doc! {"username": VoterRegistration::example().username}, None)
            .await
            .unwrap()
            .unwrap();
        assert!(voter.votes.is_empty());
        let here = candidates.find_one(here.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(here.votes, 0);
        let current = elections.find_one(current.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(current.total_votes, 0);
    }

    #[backend_test]
    async fn voting_requires_login(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let election = insert_election(&elections, ElectionCore::current_example()).await;
        let alice = insert_candidate(&elections, &candidates, "Alice", election.id).await;

        let (status, body) = vote_for(&client, election.id, alice.id).await;
        assert_eq!(Status::Unauthorized, status);
        assert_eq!(body["success"], false);

        let response = client
            .get(uri!(voting_status(election.id, Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
