//! # Ranked Voting
//!
//! Article voting and score ranking over an external sorted-set store.
//! One vote per user per article, votes only inside a time window after
//! submission, and atomic vote switching between two articles.
//!
//! ## Architecture
//!
//! - **Domain**: Core entities (Article, ScoredArticle), value objects, invariants
//! - **Ports**: Inbound (RankingApi) and Outbound (VotingStore, TimeSource)
//! - **Application**: `RankingStore`, optimistic guarded commits with bounded retry
//! - **Adapters**: In-memory store, Redis store (feature `redis`), clocks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ranked_voting::{MemoryVotingStore, RankingApi, RankingConfig, RankingStore, SystemTimeSource};
//!
//! let ranking = RankingStore::open(MemoryVotingStore::new(), SystemTimeSource, RankingConfig::default()).await?;
//! ranking.submit_article(&"article:1".into(), "http://example.com").await?;
//! assert!(ranking.vote(&"user:3".into(), &"article:1".into()).await?);
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(feature = "redis")]
pub use adapters::RedisVotingStore;
pub use adapters::{ManualTimeSource, MemoryVotingStore, SystemTimeSource};
pub use application::{RangeCursor, RankingStore};
pub use config::RankingConfig;
pub use domain::entities::*;
pub use domain::errors::{RankingError, StoreError};
pub use domain::value_objects::*;
pub use ports::inbound::RankingApi;
pub use ports::outbound::{CommitOutcome, Guard, TimeSource, Transaction, VotingStore, WriteOp};
