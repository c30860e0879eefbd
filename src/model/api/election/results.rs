use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{election::ElectionStatus, percentage},
    db::{candidate::Candidate, election::Election},
    mongodb::Id,
};

/// The outcome of an election, as computed from candidate tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election: ResultsHeader,
    /// Candidates in ranked order, most votes first.
    pub candidates: Vec<RankedCandidate>,
    /// The first ranked candidate, if there are any candidates.
    pub winner: Option<RankedCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsHeader {
    pub id: ApiId,
    pub name: String,
    pub position: String,
    pub status: ElectionStatus,
    pub total_votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub id: ApiId,
    pub name: String,
    pub votes: u32,
    pub photo: Option<String>,
    /// Share of the total vote, rounded to the nearest whole percent.
    pub percentage: u32,
}

impl ElectionResults {
    /// Rank the given candidates of `election`.
    ///
    /// Candidates should be supplied in registration order; equal tallies keep that order.
    pub fn tally(election: &Election, mut candidates: Vec<Candidate>) -> Self {
        let total_votes: u32 = candidates.iter().map(|candidate| candidate.votes).sum();
        // `sort_by` is stable.
        candidates.sort_by(|a, b| b.votes.cmp(&a.votes));

        let candidates: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|candidate| RankedCandidate {
                id: candidate.id.into(),
                percentage: percentage(candidate.votes.into(), total_votes.into()),
                name: candidate.candidate.name,
                votes: candidate.candidate.votes,
                photo: candidate.candidate.photo,
            })
            .collect();

        Self {
            election: ResultsHeader {
                id: election.id.into(),
                name: election.name.clone(),
                position: election.position.clone(),
                status: election.current_status(),
                total_votes,
            },
            winner: candidates.first().cloned(),
            candidates,
        }
    }

    /// Candidate IDs in ranked order.
    pub fn ranking(&self) -> Vec<Id> {
        self.candidates
            .iter()
            .map(|candidate| Id::from(candidate.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::db::election::ElectionCore;

    fn election() -> Election {
        Election {
            id: Id::new(),
            election: ElectionCore::current_example(),
        }
    }

    #[test]
    fn even_split() {
        let election = election();
        let a = Candidate::example("Alice", election.id, 1);
        let b = Candidate::example("Bob", election.id, 1);
        let results = ElectionResults::tally(&election, vec![a.clone(), b.clone()]);

        assert_eq!(results.election.total_votes, 2);
        assert_eq!(results.candidates.len(), 2);
        assert!(results.candidates.iter().all(|c| c.percentage == 50));
        // Ties keep registration order.
        assert_eq!(results.ranking(), vec![a.id, b.id]);
        assert_eq!(results.winner.unwrap().name, "Alice");
    }

    #[test]
    fn ranked_by_votes() {
        let election = election();
        let candidates = vec![
            Candidate::example("Alice", election.id, 1),
            Candidate::example("Bob", election.id, 5),
            Candidate::example("Carol", election.id, 3),
            Candidate::example("Dave", election.id, 3),
        ];
        let results = ElectionResults::tally(&election, candidates);

        let names: Vec<_> = results.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Carol", "Dave", "Alice"]);
        let percentages: Vec<_> = results.candidates.iter().map(|c| c.percentage).collect();
        assert_eq!(percentages, vec![42, 25, 25, 8]);
        assert_eq!(results.election.total_votes, 12);
    }

    #[test]
    fn no_votes() {
        let election = election();
        let results = ElectionResults::tally(
            &election,
            vec![
                Candidate::example("Alice", election.id, 0),
                Candidate::example("Bob", election.id, 0),
            ],
        );
        assert_eq!(results.election.total_votes, 0);
        assert!(results.candidates.iter().all(|c| c.percentage == 0));

        let empty = ElectionResults::tally(&election, Vec::new());
        assert!(empty.candidates.is_empty());
        assert!(empty.winner.is_none());
    }
}
