use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::password::PasswordHash, mongodb::Id};

use super::vote::VoteRecord;

/// Core candidate data, as stored in the database.
///
/// Candidates stand in exactly one election, but may also vote (in any election)
/// just like a registered voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCore {
    pub name: String,
    pub email: String,
    pub password_hash: PasswordHash,
    /// The election this candidate stands in.
    pub election_id: Id,
    /// Public path of the candidate's photo, if one was uploaded.
    pub photo: Option<String>,
    /// Votes received.
    #[serde(default)]
    pub votes: u32,
    /// Votes this candidate has cast, at most one per election.
    #[serde(default)]
    pub votes_cast: Vec<VoteRecord>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CandidateCore {
    /// Create a new candidate with no votes received or cast.
    pub fn new(
        name: String,
        email: String,
        password_hash: PasswordHash,
        election_id: Id,
        photo: Option<String>,
    ) -> Self {
        Self {
            name,
            email,
            password_hash,
            election_id,
            photo,
            votes: 0,
            votes_cast: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
