//! Domain entities for Ranked Voting

use super::value_objects::{ArticleId, Score, Timestamp};
use serde::{Deserialize, Serialize};

/// A votable article and its ranking state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    /// Opaque payload, immutable after creation
    pub link: String,
    pub submitted_at: Timestamp,
    pub score: Score,
    pub votes: u64,
}

impl Article {
    /// A freshly submitted article with no votes.
    pub fn new(id: ArticleId, link: impl Into<String>, submitted_at: Timestamp) -> Self {
        Self {
            id,
            link: link.into(),
            submitted_at,
            score: 0.0,
            votes: 0,
        }
    }

    pub fn with_score(mut self, score: Score) -> Self {
        self.score = score;
        self
    }

    pub fn with_votes(mut self, votes: u64) -> Self {
        self.votes = votes;
        self
    }
}

/// One entry of the score index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub id: ArticleId,
    pub score: Score,
}

impl ScoredArticle {
    pub fn new(id: ArticleId, score: Score) -> Self {
        Self { id, score }
    }

    /// Score ascending, then id ascending.
    pub fn rank_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.id.cmp(&other.id))
    }
}
