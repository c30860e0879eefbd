use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One entry in a voter's list of cast votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub election_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(election_id: Id, candidate_id: Id) -> Self {
        Self {
            election_id,
            candidate_id,
            voted_at: Utc::now(),
        }
    }
}

impl From<VoteRecord> for Bson {
    fn from(record: VoteRecord) -> Self {
        Bson::Document(doc! {
            "electionId": record.election_id,
            "candidateId": record.candidate_id,
            "votedAt": mongodb::bson::DateTime::from_chrono(record.voted_at),
        })
    }
}
