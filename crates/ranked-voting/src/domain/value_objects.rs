//! Value objects for Ranked Voting
//!
//! Identifiers, timestamps and the voting window.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the unix epoch.
pub type Timestamp = u64;

/// Ranking score. Sorted-set stores keep scores as doubles.
pub type Score = f64;

/// Article identifier, conventionally `article:<n>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArticleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// User identifier, conventionally `user:<n>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Period after submission during which an article accepts votes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    pub length_secs: u64,
}

impl VotingWindow {
    pub const ONE_WEEK: VotingWindow = VotingWindow {
        length_secs: 7 * 86_400,
    };

    pub fn new(length_secs: u64) -> Self {
        Self { length_secs }
    }

    /// Oldest submission time still open for voting at `now`.
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.length_secs)
    }

    /// An article submitted exactly at the cutoff is still eligible.
    pub fn is_open(&self, submitted_at: Timestamp, now: Timestamp) -> bool {
        submitted_at >= self.cutoff(now)
    }
}

impl Default for VotingWindow {
    fn default() -> Self {
        Self::ONE_WEEK
    }
}
