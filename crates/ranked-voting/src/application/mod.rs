//! Application layer for Ranked Voting

pub mod service;

pub use service::{RangeCursor, RankingStore};
