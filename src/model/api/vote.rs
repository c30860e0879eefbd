use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::{candidate::Candidate, election::Election, vote::VoteRecord},
};

/// A request to cast a vote in an election, which is named by the route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: ApiId,
}

/// Confirmation of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub voted_at: DateTime<Utc>,
}

impl From<VoteRecord> for VoteReceipt {
    fn from(record: VoteRecord) -> Self {
        Self {
            election_id: record.election_id.into(),
            candidate_id: record.candidate_id.into(),
            voted_at: record.voted_at,
        }
    }
}

/// A cast vote with its election and candidate resolved to names.
///
/// Names are missing if the election or candidate no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDescription {
    pub election_id: ApiId,
    pub election_name: Option<String>,
    pub position: Option<String>,
    pub candidate_id: ApiId,
    pub candidate_name: Option<String>,
    pub candidate_photo: Option<String>,
    pub voted_at: DateTime<Utc>,
}

impl VoteDescription {
    pub fn resolve(
        record: &VoteRecord,
        election: Option<&Election>,
        candidate: Option<&Candidate>,
    ) -> Self {
        Self {
            election_id: record.election_id.into(),
            election_name: election.map(|e| e.name.clone()),
            position: election.map(|e| e.position.clone()),
            candidate_id: record.candidate_id.into(),
            candidate_name: candidate.map(|c| c.name.clone()),
            candidate_photo: candidate.and_then(|c| c.photo.clone()),
            voted_at: record.voted_at,
        }
    }
}
