//! The vote ledger: recording votes so that nobody votes twice in one election.
//!
//! Voters and candidates both keep a list of the votes they have cast. A vote is
//! recorded by a single transaction which appends to that list (only if it has no
//! entry for the election yet), then bumps the candidate's and the election's tallies.

use std::fmt::Display;

use log::{debug, warn};
use mongodb::{
    bson::doc,
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rocket::{
    http::Status,
    tokio::time::{sleep, Duration},
};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::model::{
    common::election::ElectionStatus,
    db::{candidate::Candidate, election::Election, vote::VoteRecord, voter::Voter},
    mongodb::{Coll, Id, MongoCollection},
};

/// How many times a vote transaction is attempted before giving up on transient errors.
pub const MAX_TRANSACTION_ATTEMPTS: usize = 3;

/// Pause before retrying a vote, multiplied by the number of attempts so far.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// A collection of users who can cast votes, each holding a list of the votes they cast.
pub trait Ballotbox: MongoCollection + DeserializeOwned + Send + Sync + Unpin {
    /// The field holding the list of cast votes.
    const VOTES_FIELD: &'static str;
    /// What to call this kind of user in error messages.
    const NOUN: &'static str;

    /// The votes this user has cast.
    fn votes(&self) -> &[VoteRecord];

    /// Has this user voted in the given election?
    fn has_voted_in(&self, election_id: Id) -> bool {
        self.votes()
            .iter()
            .any(|vote| vote.election_id == election_id)
    }
}

impl Ballotbox for Voter {
    const VOTES_FIELD: &'static str = "votes";
    const NOUN: &'static str = "Voter";

    fn votes(&self) -> &[VoteRecord] {
        &self.voter.votes
    }
}

impl Ballotbox for Candidate {
    const VOTES_FIELD: &'static str = "votesCast";
    const NOUN: &'static str = "Candidate";

    fn votes(&self) -> &[VoteRecord] {
        &self.candidate.votes_cast
    }
}

/// Cast a vote by `voter_id` for `candidate_id` in `election_id`.
///
/// Either the vote is recorded against the voter, the candidate and the election, or
/// nothing changes.
pub async fn cast_vote<B: Ballotbox>(
    db_client: &Client,
    db: &Database,
    voter_id: Id,
    election_id: Id,
    candidate_id: Id,
) -> Result<VoteRecord> {
    let mut session = db_client.start_session(None).await?;

    let mut attempt = 1;
    loop {
        session.start_transaction(None).await?;
        let result =
            match record_vote::<B>(db, &mut session, voter_id, election_id, candidate_id).await {
                Ok(record) => commit(&mut session)
                    .await
                    .map(|_| record)
                    .map_err(Error::from),
                Err(err) => {
                    // The server may have aborted already.
                    let _ = session.abort_transaction().await;
                    Err(err)
                }
            };

        match result {
            Err(err) if is_transient(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                warn!("Retrying vote by {voter_id} in election {election_id} after transient error: {err}");
                // Give the conflicting transaction a chance to finish.
                sleep(RETRY_BACKOFF * attempt as u32).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// The body of the vote transaction.
async fn record_vote<B: Ballotbox>(
    db: &Database,
    session: &mut ClientSession,
    voter_id: Id,
    election_id: Id,
    candidate_id: Id,
) -> Result<VoteRecord> {
    // The election must be open.
    let elections = Coll::<Election>::from_db(db);
    let election = elections
        .find_one_with_session(election_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;
    if election.current_status() != ElectionStatus::Active {
        return Err(Error::bad_request("Election is not active"));
    }

    // The candidate must stand in it.
    let candidates = Coll::<Candidate>::from_db(db);
    let in_election = doc! {
        "_id": candidate_id,
        "electionId": election_id,
    };
    if candidates
        .find_one_with_session(in_election.clone(), None, session)
        .await?
        .is_none()
    {
        return Err(Error::Status(
            Status::NotFound,
            "Candidate not found in this election".to_string(),
        ));
    }

    // Append the vote, only if the voter has no vote in this election yet.
    let record = VoteRecord::new(election_id, candidate_id);
    let votes_field = B::VOTES_FIELD;
    let voted_in_election = format!("{votes_field}.electionId");
    let not_yet_voted = doc! {
        "_id": voter_id,
        voted_in_election: {"$ne": election_id},
    };
    let push = doc! {
        "$push": { votes_field: record.clone() },
    };
    let voters = Coll::<B>::from_db(db);
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = voters
        .find_one_and_update_with_session(not_yet_voted, push, options, session)
        .await?;
    if updated.is_none() {
        let voter = voters
            .find_one_with_session(voter_id.as_doc(), None, session)
            .await?;
        return Err(match voter {
            Some(_) => Error::Status(
                Status::Conflict,
                "Already voted in this election".to_string(),
            ),
            None => Error::not_found(B::NOUN),
        });
    }

    // Bump the tallies.
    let result = candidates
        .update_one_with_session(in_election, doc! {"$inc": {"votes": 1}}, None, session)
        .await?;
    if result.matched_count != 1 {
        return Err(Error::not_found("Candidate"));
    }
    elections
        .update_one_with_session(
            election_id.as_doc(),
            doc! {"$inc": {"totalVotes": 1}},
            None,
            session,
        )
        .await?;

    debug!("Recorded vote by {voter_id} for {candidate_id} in election {election_id}");
    Ok(record)
}

/// Something holding a transaction that can be committed.
#[rocket::async_trait]
pub trait Commit: Send {
    type Error: Display + Send;

    /// Attempt to commit once.
    async fn try_commit(&mut self) -> std::result::Result<(), Self::Error>;

    /// Whether a failed commit may in fact have succeeded, so that retrying is safe.
    fn outcome_unknown(err: &Self::Error) -> bool;
}

#[rocket::async_trait]
impl Commit for ClientSession {
    type Error = DbError;

    async fn try_commit(&mut self) -> std::result::Result<(), DbError> {
        self.commit_transaction().await
    }

    fn outcome_unknown(err: &DbError) -> bool {
        err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
    }
}

/// Commit the current transaction, retrying at most [`MAX_TRANSACTION_ATTEMPTS`] times in
/// total while the outcome is unknown.
pub async fn commit<C: Commit>(session: &mut C) -> std::result::Result<(), C::Error> {
    let mut attempt = 1;
    loop {
        match session.try_commit().await {
            Err(err) if C::outcome_unknown(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                warn!("Retrying transaction commit (attempt {attempt}): {err}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_voted_in() {
        let election = Id::new();
        let mut candidate = Candidate::example("Alice", Id::new(), 0);
        assert!(!candidate.has_voted_in(election));
        candidate
            .votes_cast
            .push(VoteRecord::new(Id::new(), Id::new()));
        assert!(!candidate.has_voted_in(election));
        candidate.votes_cast.push(VoteRecord::new(election, Id::new()));
        assert!(candidate.has_voted_in(election));
    }

    /// A transaction whose commit fails a given number of times with the given kind of error.
    struct Flaky {
        failures: usize,
        attempts: usize,
        kind: &'static str,
    }

    impl Flaky {
        fn new(failures: usize, kind: &'static str) -> Self {
            Self {
                failures,
                attempts: 0,
                kind,
            }
        }
    }

    #[rocket::async_trait]
    impl Commit for Flaky {
        type Error = String;

        async fn try_commit(&mut self) -> std::result::Result<(), String> {
            self.attempts += 1;
            if self.attempts <= self.failures {
                Err(format!("{} {}", self.kind, self.attempts))
            } else {
                Ok(())
            }
        }

        fn outcome_unknown(err: &String) -> bool {
            err.starts_with("unknown")
        }
    }

    #[rocket::async_test]
    async fn commit_retries_unknown_outcomes() {
        let mut flaky = Flaky::new(MAX_TRANSACTION_ATTEMPTS - 1, "unknown");
        assert_eq!(commit(&mut flaky).await, Ok(()));
        assert_eq!(flaky.attempts, MAX_TRANSACTION_ATTEMPTS);
    }

    #[rocket::async_test]
    async fn commit_gives_up_eventually() {
        let mut unreachable = Flaky::new(usize::MAX, "unknown");
        assert_eq!(
            commit(&mut unreachable).await,
            Err(format!("unknown {MAX_TRANSACTION_ATTEMPTS}"))
        );
        assert_eq!(unreachable.attempts, MAX_TRANSACTION_ATTEMPTS);
    }

    #[rocket::async_test]
    async fn commit_does_not_retry_definite_failures() {
        let mut aborted = Flaky::new(1, "aborted");
        assert_eq!(commit(&mut aborted).await, Err("aborted 1".to_string()));
        assert_eq!(aborted.attempts, 1);
    }
}
