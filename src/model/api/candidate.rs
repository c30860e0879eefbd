use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{auth::Rights, election::ElectionSummary, id::ApiId, vote::VoteDescription},
    common::password::{self, MIN_PASSWORD_LENGTH},
    db::candidate::Candidate,
    mongodb::Id,
};

/// A candidate registration, submitted as a multipart form so that a photo can be attached.
#[derive(Debug, FromForm)]
pub struct CandidateRegistration<'r> {
    pub name: String,
    pub email: String,
    pub password: String,
    #[field(name = "electionId")]
    pub election_id: Id,
    pub photo: Option<TempFile<'r>>,
}

impl CandidateRegistration<'_> {
    /// Check that the text fields are present and acceptable.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty()
        {
            return Err(Error::bad_request("Missing required fields"));
        }
        if !self.email.contains('@') {
            return Err(Error::bad_request("Invalid email address"));
        }
        if !password::is_acceptable(&self.password) {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Raw candidate credentials, received from a user.
#[derive(Clone, Deserialize, Serialize)]
pub struct CandidateCredentials {
    pub email: String,
    pub password: String,
}

/// Public view of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub election_id: ApiId,
    pub photo: Option<String>,
    pub votes: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            email: candidate.candidate.email,
            election_id: candidate.candidate.election_id.into(),
            photo: candidate.candidate.photo,
            votes: candidate.candidate.votes,
            created_at: candidate.candidate.created_at,
        }
    }
}

/// A candidate's name and tally, as listed within an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub id: ApiId,
    pub name: String,
    pub votes: u32,
}

impl From<Candidate> for CandidateTally {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            votes: candidate.candidate.votes,
        }
    }
}

/// A candidate's tally along with the election it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVotes {
    pub candidate_id: ApiId,
    pub name: String,
    pub votes: u32,
    pub election_id: ApiId,
}

impl From<Candidate> for CandidateVotes {
    fn from(candidate: Candidate) -> Self {
        Self {
            candidate_id: candidate.id.into(),
            name: candidate.candidate.name,
            votes: candidate.candidate.votes,
            election_id: candidate.candidate.election_id.into(),
        }
    }
}

/// A candidate's own profile, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub votes: u32,
    /// The election this candidate stands in, if it still exists.
    pub election: Option<ElectionSummary>,
    pub votes_cast: Vec<VoteDescription>,
    pub role: String,
}

impl CandidateProfile {
    pub fn new(
        candidate: Candidate,
        election: Option<ElectionSummary>,
        votes_cast: Vec<VoteDescription>,
    ) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            email: candidate.candidate.email,
            photo: candidate.candidate.photo,
            votes: candidate.candidate.votes,
            election,
            votes_cast,
            role: Rights::Candidate.to_string(),
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCredentials {
        /// Matches `Candidate::example("Alice", ..)`.
        pub fn example() -> Self {
            Self {
                email: "alice@example.com".into(),
                password: "candidate-password".into(),
            }
        }
    }
}
