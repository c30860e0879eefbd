use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::CandidateTally, id::ApiId},
    common::election::ElectionStatus,
    db::election::Election,
};

/// An API-friendly election description.
///
/// Candidates are listed by ID unless resolved to something richer, such as
/// [`CandidateTally`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription<C = ApiId> {
    /// Election unique ID.
    pub id: ApiId,
    /// Election name.
    pub name: String,
    /// The position being elected.
    pub position: String,
    /// Voting opens at this time.
    pub start_date: DateTime<Utc>,
    /// Voting closes at this time.
    pub end_date: DateTime<Utc>,
    /// Election status, derived at the time of reading.
    pub status: ElectionStatus,
    /// Candidates standing in this election.
    pub candidates: Vec<C>,
    /// Sum of all candidate tallies.
    pub total_votes: u32,
    pub created_at: DateTime<Utc>,
}

impl<C> ElectionDescription<C> {
    /// Describe an election, listing its candidates as given.
    ///
    /// Use this with [`CandidateTally`] to include the name and tally of each candidate.
    pub fn with_candidates(election: Election, candidates: Vec<C>) -> Self {
        let election = election.refreshed();
        Self {
            id: election.id.into(),
            name: election.election.name,
            position: election.election.position,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            status: election.election.status,
            candidates,
            total_votes: election.election.total_votes,
            created_at: election.election.created_at,
        }
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let candidates = election.candidates.iter().copied().map(ApiId::from).collect();
        Self::with_candidates(election, candidates)
    }
}

/// A summary of an election, shorter than the full [`ElectionDescription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    /// Election unique ID.
    pub id: ApiId,
    /// Election name.
    pub name: String,
    /// The position being elected.
    pub position: String,
    /// Election status, derived at the time of reading.
    pub status: ElectionStatus,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        let election = election.refreshed();
        Self {
            id: election.id.into(),
            name: election.election.name,
            position: election.election.position,
            status: election.election.status,
        }
    }
}
