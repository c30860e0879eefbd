use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::election::ElectionStatus, db::election::NewElection};

/// Election names longer than this are rejected.
pub const MAX_NAME_LENGTH: usize = 100;

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    /// Election name.
    pub name: String,
    /// The position being elected.
    pub position: String,
    /// Voting opens at this time.
    pub start_date: DateTime<Utc>,
    /// Voting closes at this time.
    pub end_date: DateTime<Utc>,
}

impl TryFrom<ElectionSpec> for NewElection {
    type Error = Error;

    /// Validate the spec and build a fresh election from it.
    fn try_from(spec: ElectionSpec) -> Result<Self> {
        let name = spec.name.trim();
        let position = spec.position.trim();
        if name.is_empty() || position.is_empty() {
            return Err(Error::bad_request("Missing required fields"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::bad_request(format!(
                "Election name cannot exceed {MAX_NAME_LENGTH} characters"
            )));
        }
        if spec.end_date <= spec.start_date {
            return Err(Error::bad_request("End date must be after start date"));
        }

        Ok(NewElection::new(
            name.to_string(),
            position.to_string(),
            spec.start_date,
            spec.end_date,
        ))
    }
}

/// A manual status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ElectionStatus,
}
