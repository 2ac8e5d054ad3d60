//! Domain invariants for Ranked Voting

use super::entities::ScoredArticle;
use super::value_objects::Score;

/// INVARIANT-1: Ranked Order
/// Range results are ascending by score, ties ascending by article id.
pub fn invariant_ranked_order(entries: &[ScoredArticle]) -> bool {
    entries
        .windows(2)
        .all(|pair| pair[0].rank_cmp(&pair[1]).is_le())
}

/// INVARIANT-2: Range Bounds
/// Every returned score lies in `[min, max]`.
pub fn invariant_within_range(entries: &[ScoredArticle], min: Score, max: Score) -> bool {
    entries.iter().all(|e| e.score >= min && e.score <= max)
}

/// INVARIANT-3: Vote Count Tracks Membership
/// The stored vote counter equals the voter set cardinality.
pub fn invariant_votes_match_voters(votes: u64, voter_count: usize) -> bool {
    votes == voter_count as u64
}

/// INVARIANT-4: Score Tracks Votes
/// For an article created at `base_score`, the score moved by exactly
/// `vote_score` per recorded vote.
pub fn invariant_score_tracks_votes(
    score: Score,
    base_score: Score,
    votes: u64,
    vote_score: Score,
) -> bool {
    let expected = base_score + votes as f64 * vote_score;
    (score - expected).abs() < f64::EPSILON * expected.abs().max(1.0)
}
