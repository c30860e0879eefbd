use chrono::{DateTime, Utc};
use mongodb::bson::{doc, to_bson, Bson, Document};
use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Not started yet.
    Upcoming,
    /// Accepting votes.
    Active,
    /// Past its end time; can never become active again.
    Completed,
    /// Manually taken offline by an administrator.
    Inactive,
}

impl ElectionStatus {
    /// Derive the status of an election from its stored status and its voting window
    /// `[start, end)` at time `now`.
    ///
    /// Completion is enforced one-way: once `now >= end` the result is always
    /// [`ElectionStatus::Completed`]. Inside the window the election is always active,
    /// whatever was stored. Before the window opens the stored status is kept, so a
    /// manually forced `Active` or `Inactive` is not reverted.
    pub fn derive(
        stored: ElectionStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if now >= end {
            Self::Completed
        } else if start <= now {
            Self::Active
        } else {
            match stored {
                Self::Completed => Self::Upcoming,
                other => other,
            }
        }
    }

    /// A filter matching every election whose derived status at `now` is
    /// [`ElectionStatus::Active`].
    pub fn active_filter(now: DateTime<Utc>) -> Document {
        doc! {
            "$or": [
                {
                    "startDate": { "$lte": now },
                    "endDate": { "$gt": now },
                },
                {
                    "startDate": { "$gt": now },
                    "status": ElectionStatus::Active,
                },
            ]
        }
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
