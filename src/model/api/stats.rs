use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::percentage, db::election::Election};

/// Voter turnout across the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterStats {
    pub total_users: u64,
    /// Voters who have voted in at least one election.
    pub voted_users: u64,
    pub voting_percentage: u32,
    pub active_elections: u64,
}

impl VoterStats {
    pub fn new(total_users: u64, voted_users: u64, active_elections: u64) -> Self {
        Self {
            total_users,
            voted_users,
            voting_percentage: percentage(voted_users, total_users),
            active_elections,
        }
    }
}

/// Headline figures for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_elections: u64,
    /// Candidates standing in currently active elections.
    pub registered_candidates: u64,
    /// Votes cast across every election.
    pub total_votes: u64,
}

/// An active election, as listed on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveElection {
    pub id: ApiId,
    pub name: String,
    pub position: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_votes: u32,
    pub candidate_count: u64,
}

impl ActiveElection {
    pub fn new(election: Election, candidate_count: u64) -> Self {
        Self {
            id: election.id.into(),
            name: election.election.name,
            position: election.election.position,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            total_votes: election.election.total_votes,
            candidate_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turnout() {
        assert_eq!(VoterStats::new(0, 0, 0).voting_percentage, 0);
        assert_eq!(VoterStats::new(3, 1, 2).voting_percentage, 33);
        assert_eq!(VoterStats::new(4, 4, 1).voting_percentage, 100);
    }
}
