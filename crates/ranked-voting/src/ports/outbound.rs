//! Outbound Ports (Driven Ports / SPI)
//!
//! What `RankingStore` needs from the host: a sorted-set store and a clock.

use crate::domain::entities::{Article, ScoredArticle};
use crate::domain::errors::StoreError;
use crate::domain::value_objects::{ArticleId, Score, Timestamp, UserId};
use async_trait::async_trait;

/// External key-value / sorted-set store holding all ranking state.
///
/// Production: `RedisVotingStore` (feature `redis`)
/// Testing: `MemoryVotingStore`
#[async_trait]
pub trait VotingStore: Send + Sync {
    /// Acquire connections. Calls before `open` fail with `StoreError::Closed`.
    async fn open(&self) -> Result<(), StoreError>;

    /// Release connections. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;

    /// Submission time from the time index, `None` for unknown articles.
    async fn submitted_at(&self, article: &ArticleId) -> Result<Option<Timestamp>, StoreError>;

    /// Current score from the score index, `None` for unknown articles.
    async fn score(&self, article: &ArticleId) -> Result<Option<Score>, StoreError>;

    /// Vote counter of the article, `None` for unknown articles.
    async fn vote_count(&self, article: &ArticleId) -> Result<Option<u64>, StoreError>;

    /// Link payload of the article, `None` for unknown articles.
    async fn link(&self, article: &ArticleId) -> Result<Option<String>, StoreError>;

    /// Whether `user` is in the voter set of `article`.
    async fn is_voter(&self, article: &ArticleId, user: &UserId) -> Result<bool, StoreError>;

    /// Articles with `min <= score <= max`, ascending by score then id,
    /// skipping `offset` entries and returning at most `limit`.
    ///
    /// Each call reads one consistent snapshot. `limit == usize::MAX` means
    /// no limit.
    async fn range_by_score(
        &self,
        min: Score,
        max: Score,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoredArticle>, StoreError>;

    /// Create the article and its index entries iff the id is unused.
    ///
    /// Returns `false` and leaves the store untouched if the article exists.
    async fn insert_article(&self, article: &Article) -> Result<bool, StoreError>;

    /// Apply `txn.writes` atomically iff every guard in `txn.guards` holds.
    ///
    /// ## Atomicity
    ///
    /// Either every write is applied or none is. No reader observes a state
    /// in between.
    async fn commit(&self, txn: &Transaction) -> Result<CommitOutcome, StoreError>;
}

/// Injectable clock.
pub trait TimeSource: Send + Sync {
    /// Current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}

/// Membership precondition re-checked at commit time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Guard {
    Voter {
        article: ArticleId,
        user: UserId,
        present: bool,
    },
}

impl Guard {
    pub fn voter_absent(article: &ArticleId, user: &UserId) -> Self {
        Guard::Voter {
            article: article.clone(),
            user: user.clone(),
            present: false,
        }
    }

    pub fn voter_present(article: &ArticleId, user: &UserId) -> Self {
        Guard::Voter {
            article: article.clone(),
            user: user.clone(),
            present: true,
        }
    }
}

/// Single write inside a transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Add `user` to the voter set of `article`.
    AddVoter { article: ArticleId, user: UserId },
    /// Move `user` between voter sets.
    MoveVoter {
        from: ArticleId,
        to: ArticleId,
        user: UserId,
    },
    /// Add `delta` to the article's score.
    IncrScore { article: ArticleId, delta: Score },
    /// Add `delta` to the article's vote counter.
    IncrVotes { article: ArticleId, delta: i64 },
}

/// Guarded batch of writes, applied all-or-nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    pub guards: Vec<Guard>,
    pub writes: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn write(mut self, op: WriteOp) -> Self {
        self.writes.push(op);
        self
    }
}

/// Result of a guarded commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All guards held and every write was applied.
    Committed,
    /// A guard no longer held; nothing was written.
    GuardFailed,
}
