use crate::domain::entities::{Article, ScoredArticle};
use crate::domain::errors::StoreError;
use crate::domain::value_objects::{ArticleId, Score, Timestamp, UserId};
use crate::ports::outbound::{CommitOutcome, Guard, Transaction, VotingStore, WriteOp};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Debug)]
struct ArticleRecord {
    link: String,
    submitted_at: Timestamp,
    score: Score,
    votes: u64,
}

#[derive(Default)]
struct MemoryState {
    articles: HashMap<ArticleId, ArticleRecord>,
    voters: HashMap<ArticleId, HashSet<UserId>>,
}

impl MemoryState {
    fn is_voter(&self, article: &ArticleId, user: &UserId) -> bool {
        self.voters
            .get(article)
            .is_some_and(|set| set.contains(user))
    }

    fn guard_holds(&self, guard: &Guard) -> bool {
        match guard {
            Guard::Voter {
                article,
                user,
                present,
            } => self.is_voter(article, user) == *present,
        }
    }
}

/// Copies of every record a transaction touches. Writes land here first so
/// a failing write leaves the live state untouched.
#[derive(Default)]
struct Staged {
    articles: HashMap<ArticleId, ArticleRecord>,
    voters: HashMap<ArticleId, HashSet<UserId>>,
}

impl Staged {
    fn voter_set(&mut self, state: &MemoryState, article: &ArticleId) -> &mut HashSet<UserId> {
        self.voters
            .entry(article.clone())
            .or_insert_with_key(|key| state.voters.get(key).cloned().unwrap_or_default())
    }

    fn record(
        &mut self,
        state: &MemoryState,
        article: &ArticleId,
    ) -> Result<&mut ArticleRecord, StoreError> {
        if !self.articles.contains_key(article) {
            let record = state
                .articles
                .get(article)
                .cloned()
                .ok_or_else(|| StoreError::Corrupt {
                    key: article.to_string(),
                    reason: "write to missing article".to_string(),
                })?;
            self.articles.insert(article.clone(), record);
        }
        // Inserted above when absent.
        self.articles
            .get_mut(article)
            .ok_or_else(|| StoreError::Backend("staging lost a record".to_string()))
    }

    fn apply(&mut self, state: &MemoryState, op: &WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::AddVoter { article, user } => {
                self.voter_set(state, article).insert(user.clone());
            }
            WriteOp::MoveVoter { from, to, user } => {
                // Sorted-set store semantics: moving an absent member is a no-op.
                if self.voter_set(state, from).remove(user) {
                    self.voter_set(state, to).insert(user.clone());
                }
            }
            WriteOp::IncrScore { article, delta } => {
                self.record(state, article)?.score += delta;
            }
            WriteOp::IncrVotes { article, delta } => {
                let record = self.record(state, article)?;
                let current = record.votes;
                record.votes =
                    current
                        .checked_add_signed(*delta)
                        .ok_or_else(|| StoreError::Corrupt {
                            key: article.to_string(),
                            reason: format!("vote count {} cannot move by {}", current, delta),
                        })?;
            }
        }
        Ok(())
    }

    fn merge_into(self, state: &mut MemoryState) {
        state.articles.extend(self.articles);
        state.voters.extend(self.voters);
    }
}

/// In-memory `VotingStore` for tests and single-process use.
///
/// Every commit runs under one write lock, so guards and writes are atomic
/// with respect to all other calls.
pub struct MemoryVotingStore {
    state: RwLock<MemoryState>,
    open: AtomicBool,
}

impl MemoryVotingStore {
    /// A closed, empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            open: AtomicBool::new(false),
        }
    }

    /// Insert or overwrite an article, bypassing the open check.
    pub fn seed(&self, article: Article) {
        let record = ArticleRecord {
            link: article.link,
            submitted_at: article.submitted_at,
            score: article.score,
            votes: article.votes,
        };
        self.state.write().articles.insert(article.id, record);
    }

    /// Add a voter without touching score or counter, bypassing the open check.
    pub fn seed_voter(&self, article: &ArticleId, user: &UserId) {
        self.state
            .write()
            .voters
            .entry(article.clone())
            .or_default()
            .insert(user.clone());
    }

    /// Voters of `article`, sorted.
    pub fn voters(&self, article: &ArticleId) -> Vec<UserId> {
        let state = self.state.read();
        let mut voters: Vec<UserId> = state
            .voters
            .get(article)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        voters.sort();
        voters
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    fn read_record<R>(
        &self,
        article: &ArticleId,
        f: impl FnOnce(&ArticleRecord) -> R,
    ) -> Result<Option<R>, StoreError> {
        self.ensure_open()?;
        Ok(self.state.read().articles.get(article).map(f))
    }
}

impl Default for MemoryVotingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VotingStore for MemoryVotingStore {
    async fn open(&self) -> Result<(), StoreError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn submitted_at(&self, article: &ArticleId) -> Result<Option<Timestamp>, StoreError> {
        self.read_record(article, |r| r.submitted_at)
    }

    async fn score(&self, article: &ArticleId) -> Result<Option<Score>, StoreError> {
        self.read_record(article, |r| r.score)
    }

    async fn vote_count(&self, article: &ArticleId) -> Result<Option<u64>, StoreError> {
        self.read_record(article, |r| r.votes)
    }

    async fn link(&self, article: &ArticleId) -> Result<Option<String>, StoreError> {
        self.read_record(article, |r| r.link.clone())
    }

    async fn is_voter(&self, article: &ArticleId, user: &UserId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.state.read().is_voter(article, user))
    }

    async fn range_by_score(
        &self,
        min: Score,
        max: Score,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoredArticle>, StoreError> {
        self.ensure_open()?;
        let state = self.state.read();
        let mut entries: Vec<ScoredArticle> = state
            .articles
            .iter()
            .filter(|(_, r)| r.score >= min && r.score <= max)
            .map(|(id, r)| ScoredArticle::new(id.clone(), r.score))
            .collect();
        entries.sort_by(|a, b| a.rank_cmp(b));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_article(&self, article: &Article) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut state = self.state.write();
        if state.articles.contains_key(&article.id) {
            return Ok(false);
        }
        state.articles.insert(
            article.id.clone(),
            ArticleRecord {
                link: article.link.clone(),
                submitted_at: article.submitted_at,
                score: article.score,
                votes: article.votes,
            },
        );
        Ok(true)
    }

    async fn commit(&self, txn: &Transaction) -> Result<CommitOutcome, StoreError> {
        self.ensure_open()?;
        let mut state = self.state.write();

        if !txn.guards.iter().all(|g| state.guard_holds(g)) {
            return Ok(CommitOutcome::GuardFailed);
        }

        let mut staged = Staged::default();
        for op in &txn.writes {
            staged.apply(&state, op)?;
        }
        staged.merge_into(&mut state);

        Ok(CommitOutcome::Committed)
    }
}
