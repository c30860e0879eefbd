use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::password::PasswordHash, mongodb::Id};

use super::vote::VoteRecord;

/// Core voter user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterCore {
    pub username: String,
    pub email: String,
    /// Mobile number in E.164 format.
    pub mobile: String,
    pub national_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub date_of_birth: DateTime<Utc>,
    pub password_hash: PasswordHash,
    /// Votes already cast, at most one per election.
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
