//! Error types for Ranked Voting
//!
//! Business non-events (duplicate vote, closed window, same article) are
//! `Ok(false)` results, not errors.

use super::value_objects::ArticleId;
use std::time::Duration;
use thiserror::Error;

/// All errors surfaced by `RankingStore`.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Article id is not present in the store
    #[error("Article not found: {article}")]
    NotFound { article: ArticleId },

    /// Store connection or backend failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store call exceeded the configured timeout
    #[error("Store call timed out after {after:?}")]
    Timeout { after: Duration },

    /// Optimistic commit kept losing to concurrent writers
    #[error("Transaction conflict: gave up after {attempts} attempts")]
    TransactionConflict { attempts: u32 },

    /// Stored data could not be decoded or breaks an invariant
    #[error("Corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },
}

impl RankingError {
    /// Whether the whole operation may be retried by the caller.
    ///
    /// `vote` and `switch_vote` are idempotent per (user, article), so a
    /// retry after one of these never double-counts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RankingError::StoreUnavailable(_)
                | RankingError::Timeout { .. }
                | RankingError::TransactionConflict { .. }
        )
    }
}

/// Errors reported by `VotingStore` adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is closed")]
    Closed,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for RankingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Closed => RankingError::StoreUnavailable("store is closed".to_string()),
            StoreError::Unavailable(msg) | StoreError::Backend(msg) => {
                RankingError::StoreUnavailable(msg)
            }
            StoreError::Corrupt { key, reason } => RankingError::CorruptRecord { key, reason },
        }
    }
}
