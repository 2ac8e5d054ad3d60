//! Configuration for Ranked Voting

use crate::domain::value_objects::{Score, VotingWindow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ranking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// How long after submission an article accepts votes (seconds)
    pub eligibility_window_secs: u64,
    /// Points added or removed per vote
    pub vote_score: Score,
    /// Guarded commits attempted before giving up with a conflict
    pub max_commit_retries: u32,
    /// Upper bound for any single store call (milliseconds)
    pub store_timeout_ms: u64,
    /// Entries fetched per page when scanning a score range
    pub scan_page_size: usize,
}

impl RankingConfig {
    pub fn voting_window(&self) -> VotingWindow {
        VotingWindow::new(self.eligibility_window_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            eligibility_window_secs: VotingWindow::ONE_WEEK.length_secs,
            vote_score: 432.0,
            max_commit_retries: 5,
            store_timeout_ms: 2_000,
            scan_page_size: 100,
        }
    }
}
