//! Inbound Ports (Driving Ports / API)

use crate::domain::entities::{Article, ScoredArticle};
use crate::domain::errors::RankingError;
use crate::domain::value_objects::{ArticleId, Score, UserId};
use async_trait::async_trait;

/// Primary Ranked Voting API
#[async_trait]
pub trait RankingApi: Send + Sync {
    /// Record `user`'s vote for `article`.
    ///
    /// Returns `Ok(true)` when the vote was counted, `Ok(false)` when the
    /// article is past its voting window or the user already voted.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: unknown article
    /// - `StoreUnavailable` / `Timeout` / `TransactionConflict`: transient,
    ///   safe to retry
    async fn vote(&self, user: &UserId, article: &ArticleId) -> Result<bool, RankingError>;

    /// Move `user`'s vote from `from` to `to` as one atomic step.
    ///
    /// Returns `Ok(false)` without changes when `from == to`, when either
    /// article is past its window, when the user has no vote on `from`, or
    /// when the user already voted for `to`.
    async fn switch_vote(
        &self,
        user: &UserId,
        from: &ArticleId,
        to: &ArticleId,
    ) -> Result<bool, RankingError>;

    /// All articles scored within `[min, max]`, ascending by score, ties by id.
    async fn top_in_range(&self, min: Score, max: Score)
        -> Result<Vec<ScoredArticle>, RankingError>;

    /// Full article record.
    async fn article(&self, article: &ArticleId) -> Result<Article, RankingError>;

    /// Create an article at the current time with zero score and votes.
    ///
    /// Returns `Ok(false)` if the id is already taken.
    async fn submit_article(&self, article: &ArticleId, link: &str)
        -> Result<bool, RankingError>;
}
