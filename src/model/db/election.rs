use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionStatus, mongodb::Id};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// The position being elected.
    pub position: String,
    /// Voting opens at this time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    /// Voting closes at this time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    /// Lifecycle status, as of the last write.
    pub status: ElectionStatus,
    /// Candidates standing in this election.
    #[serde(default)]
    pub candidates: Vec<Id>,
    /// Sum of all candidate tallies.
    #[serde(default)]
    pub total_votes: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// Create a new election with no candidates, deriving its initial status.
    pub fn new(
        name: String,
        position: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name,
            position,
            start_date,
            end_date,
            status: ElectionStatus::derive(ElectionStatus::Upcoming, start_date, end_date, now),
            candidates: Vec::new(),
            total_votes: 0,
            created_at: now,
        }
    }

    /// The status of this election at time `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        ElectionStatus::derive(self.status, self.start_date, self.end_date, now)
    }

    /// The status of this election right now.
    pub fn current_status(&self) -> ElectionStatus {
        self.status_at(Utc::now())
    }

    /// Bring the stored status up to date.
    pub fn refresh_status(&mut self) {
        self.status = self.current_status();
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// This election with its status brought up to date, for returning from reads.
    pub fn refreshed(mut self) -> Self {
        self.refresh_status();
        self
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
