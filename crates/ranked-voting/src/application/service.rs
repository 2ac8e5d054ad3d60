//! Ranking Store Service
//!
//! Main service implementing RankingApi.
//!
//! Mutations use optimistic guarded commits: read eligibility and
//! membership, build a `Transaction` whose guards restate the membership
//! that was read, and let the store apply it all-or-nothing. A failed guard
//! means another caller got there first; the service re-reads and retries up
//! to `max_commit_retries` times.

use crate::config::RankingConfig;
use crate::domain::entities::{Article, ScoredArticle};
use crate::domain::errors::{RankingError, StoreError};
use crate::domain::invariants::{invariant_ranked_order, invariant_within_range};
use crate::domain::value_objects::{ArticleId, Score, Timestamp, UserId};
use crate::ports::inbound::RankingApi;
use crate::ports::outbound::{CommitOutcome, Guard, TimeSource, Transaction, VotingStore, WriteOp};
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, info, warn};

/// Ranking Store
///
/// Stateless logic over an injected `VotingStore`; share it across tasks
/// behind an `Arc`.
pub struct RankingStore<S, T>
where
    S: VotingStore,
    T: TimeSource,
{
    store: S,
    clock: T,
    config: RankingConfig,
}

impl<S, T> RankingStore<S, T>
where
    S: VotingStore,
    T: TimeSource,
{
    /// Wrap an already opened store.
    pub fn new(store: S, clock: T, config: RankingConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Open `store` and wrap it.
    pub async fn open(store: S, clock: T, config: RankingConfig) -> Result<Self, RankingError> {
        let ranking = Self::new(store, clock, config);
        ranking.call(ranking.store.open()).await?;
        info!(
            eligibility_window_secs = ranking.config.eligibility_window_secs,
            vote_score = ranking.config.vote_score,
            "Ranking store opened"
        );
        Ok(ranking)
    }

    /// Release the underlying store. Later calls fail with `StoreUnavailable`.
    pub async fn close(&self) -> Result<(), RankingError> {
        self.call(self.store.close()).await?;
        info!("Ranking store closed");
        Ok(())
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one store call under the configured timeout.
    async fn call<F, R>(&self, fut: F) -> Result<R, RankingError>
    where
        F: Future<Output = Result<R, StoreError>>,
    {
        let after = self.config.store_timeout();
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result.map_err(RankingError::from),
            Err(_) => {
                warn!(timeout_ms = after.as_millis() as u64, "Store call timed out");
                Err(RankingError::Timeout { after })
            }
        }
    }

    async fn require_submitted_at(&self, article: &ArticleId) -> Result<Timestamp, RankingError> {
        self.call(self.store.submitted_at(article))
            .await?
            .ok_or_else(|| RankingError::NotFound {
                article: article.clone(),
            })
    }

    fn attempts(&self) -> u32 {
        self.config.max_commit_retries.max(1)
    }

    fn vote_transaction(&self, user: &UserId, article: &ArticleId) -> Transaction {
        Transaction::new()
            .guard(Guard::voter_absent(article, user))
            .write(WriteOp::AddVoter {
                article: article.clone(),
                user: user.clone(),
            })
            .write(WriteOp::IncrScore {
                article: article.clone(),
                delta: self.config.vote_score,
            })
            .write(WriteOp::IncrVotes {
                article: article.clone(),
                delta: 1,
            })
    }

    fn switch_transaction(&self, user: &UserId, from: &ArticleId, to: &ArticleId) -> Transaction {
        Transaction::new()
            .guard(Guard::voter_present(from, user))
            .guard(Guard::voter_absent(to, user))
            .write(WriteOp::MoveVoter {
                from: from.clone(),
                to: to.clone(),
                user: user.clone(),
            })
            .write(WriteOp::IncrScore {
                article: from.clone(),
                delta: -self.config.vote_score,
            })
            .write(WriteOp::IncrVotes {
                article: from.clone(),
                delta: -1,
            })
            .write(WriteOp::IncrScore {
                article: to.clone(),
                delta: self.config.vote_score,
            })
            .write(WriteOp::IncrVotes {
                article: to.clone(),
                delta: 1,
            })
    }

    /// Lazy, restartable scan over `[min, max]`.
    pub fn scan_range(&self, min: Score, max: Score) -> RangeCursor<'_, S, T> {
        RangeCursor::new(self, min, max, self.config.scan_page_size.max(1))
    }

    /// Link payload of `article`.
    pub async fn link(&self, article: &ArticleId) -> Result<String, RankingError> {
        self.call(self.store.link(article))
            .await?
            .ok_or_else(|| RankingError::NotFound {
                article: article.clone(),
            })
    }

    /// Whether `user` currently holds a vote on `article`.
    pub async fn has_voted(&self, user: &UserId, article: &ArticleId) -> Result<bool, RankingError> {
        self.require_submitted_at(article).await?;
        self.call(self.store.is_voter(article, user)).await
    }

    /// Link of the lowest ranked article scored within `[min, max]`.
    pub async fn first_link_in_range(
        &self,
        min: Score,
        max: Score,
    ) -> Result<Option<String>, RankingError> {
        let mut cursor = RangeCursor::new(self, min, max, 1);
        match cursor.next_page().await? {
            Some(page) => match page.into_iter().next() {
                Some(entry) => self.link(&entry.id).await.map(Some),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<S, T> RankingApi for RankingStore<S, T>
where
    S: VotingStore,
    T: TimeSource,
{
    async fn vote(&self, user: &UserId, article: &ArticleId) -> Result<bool, RankingError> {
        let submitted_at = self.require_submitted_at(article).await?;
        let now = self.clock.now();

        if !self.config.voting_window().is_open(submitted_at, now) {
            debug!(%user, %article, submitted_at, now, "Vote rejected: voting window closed");
            return Ok(false);
        }

        let txn = self.vote_transaction(user, article);
        let attempts = self.attempts();

        for attempt in 1..=attempts {
            if self.call(self.store.is_voter(article, user)).await? {
                debug!(%user, %article, "Vote rejected: already voted");
                return Ok(false);
            }

            match self.call(self.store.commit(&txn)).await? {
                CommitOutcome::Committed => {
                    info!(%user, %article, attempt, "Vote recorded");
                    return Ok(true);
                }
                CommitOutcome::GuardFailed => {
                    warn!(%user, %article, attempt, "Vote commit lost a race, retrying");
                }
            }
        }

        Err(RankingError::TransactionConflict { attempts })
    }

    async fn switch_vote(
        &self,
        user: &UserId,
        from: &ArticleId,
        to: &ArticleId,
    ) -> Result<bool, RankingError> {
        if from == to {
            debug!(%user, %from, "Switch rejected: same article");
            return Ok(false);
        }

        let from_submitted = self.require_submitted_at(from).await?;
        let to_submitted = self.require_submitted_at(to).await?;
        let now = self.clock.now();
        let window = self.config.voting_window();

        if !window.is_open(from_submitted, now) || !window.is_open(to_submitted, now) {
            debug!(%user, %from, %to, now, "Switch rejected: voting window closed");
            return Ok(false);
        }

        let txn = self.switch_transaction(user, from, to);
        let attempts = self.attempts();

        for attempt in 1..=attempts {
            if !self.call(self.store.is_voter(from, user)).await? {
                debug!(%user, %from, "Switch rejected: no vote to move");
                return Ok(false);
            }
            if self.call(self.store.is_voter(to, user)).await? {
                debug!(%user, %to, "Switch rejected: already voted for target");
                return Ok(false);
            }

            match self.call(self.store.commit(&txn)).await? {
                CommitOutcome::Committed => {
                    info!(%user, %from, %to, attempt, "Vote switched");
                    return Ok(true);
                }
                CommitOutcome::GuardFailed => {
                    warn!(%user, %from, %to, attempt, "Switch commit lost a race, retrying");
                }
            }
        }

        Err(RankingError::TransactionConflict { attempts })
    }

    async fn top_in_range(
        &self,
        min: Score,
        max: Score,
    ) -> Result<Vec<ScoredArticle>, RankingError> {
        // Inverted or NaN bounds
        if !(min <= max) {
            return Ok(Vec::new());
        }

        // One read, so a concurrent commit is either fully in or fully out.
        let entries = self
            .call(self.store.range_by_score(min, max, 0, usize::MAX))
            .await?;
        debug_assert!(invariant_ranked_order(&entries));
        debug_assert!(invariant_within_range(&entries, min, max));
        debug!(min, max, count = entries.len(), "Range query complete");
        Ok(entries)
    }

    async fn article(&self, article: &ArticleId) -> Result<Article, RankingError> {
        let submitted_at = self.require_submitted_at(article).await?;
        let missing = |what: &str| RankingError::CorruptRecord {
            key: article.to_string(),
            reason: format!("indexed article has no {}", what),
        };

        let score = self
            .call(self.store.score(article))
            .await?
            .ok_or_else(|| missing("score"))?;
        let votes = self
            .call(self.store.vote_count(article))
            .await?
            .ok_or_else(|| missing("vote count"))?;
        let link = self
            .call(self.store.link(article))
            .await?
            .ok_or_else(|| missing("link"))?;

        Ok(Article {
            id: article.clone(),
            link,
            submitted_at,
            score,
            votes,
        })
    }

    async fn submit_article(&self, article: &ArticleId, link: &str) -> Result<bool, RankingError> {
        let record = Article::new(article.clone(), link, self.clock.now());
        let inserted = self.call(self.store.insert_article(&record)).await?;
        if inserted {
            info!(%article, submitted_at = record.submitted_at, "Article submitted");
        } else {
            debug!(%article, "Article already exists");
        }
        Ok(inserted)
    }
}

/// Page-by-page view of the score index.
///
/// Finite and restartable: `rewind` starts over from the lowest score. Each
/// page reflects the index at the time it was fetched.
pub struct RangeCursor<'a, S, T>
where
    S: VotingStore,
    T: TimeSource,
{
    ranking: &'a RankingStore<S, T>,
    min: Score,
    max: Score,
    page_size: usize,
    offset: usize,
    exhausted: bool,
}

impl<'a, S, T> RangeCursor<'a, S, T>
where
    S: VotingStore,
    T: TimeSource,
{
    fn new(ranking: &'a RankingStore<S, T>, min: Score, max: Score, page_size: usize) -> Self {
        Self {
            ranking,
            min,
            max,
            page_size,
            offset: 0,
            // Also catches NaN bounds
            exhausted: !(min <= max),
        }
    }

    /// Next page, or `None` once the range is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ScoredArticle>>, RankingError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .ranking
            .call(
                self.ranking
                    .store
                    .range_by_score(self.min, self.max, self.offset, self.page_size),
            )
            .await?;

        self.offset += page.len();
        if page.len() < self.page_size {
            self.exhausted = true;
        }

        if page.is_empty() {
            Ok(None)
        } else {
            Ok(Some(page))
        }
    }

    /// Drain the remaining pages.
    pub async fn collect_all(mut self) -> Result<Vec<ScoredArticle>, RankingError> {
        let mut entries = Vec::new();
        while let Some(page) = self.next_page().await? {
            entries.extend(page);
        }
        Ok(entries)
    }

    /// Restart from the lowest score.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.exhausted = !(self.min <= self.max);
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ManualTimeSource, MemoryVotingStore};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const NOW: Timestamp = 1_700_000_000;

    fn id(s: &str) -> ArticleId {
        ArticleId::from(s)
    }

    fn user(s: &str) -> UserId {
        UserId::from(s)
    }

    async fn ranking_with(
        articles: &[(&str, Timestamp, Score)],
    ) -> (RankingStore<MemoryVotingStore, ManualTimeSource>, ManualTimeSource) {
        let store = MemoryVotingStore::new();
        for (name, submitted_at, score) in articles {
            store.seed(Article::new(id(name), format!("http://{}", name), *submitted_at).with_score(*score));
        }
        let clock = ManualTimeSource::new(NOW);
        let ranking = RankingStore::open(store, clock.clone(), RankingConfig::default())
            .await
            .unwrap();
        (ranking, clock)
    }

    /// Store whose commits report a lost race a fixed number of times, and
    /// which can slip another caller's commit in after a range read.
    struct ContendedStore {
        inner: MemoryVotingStore,
        failures_left: AtomicU32,
        commits: AtomicU32,
        range_calls: AtomicU32,
        after_range: Mutex<Option<Transaction>>,
    }

    impl ContendedStore {
        fn new(inner: MemoryVotingStore, failures: u32) -> Self {
            Self {
                inner,
                failures_left: AtomicU32::new(failures),
                commits: AtomicU32::new(0),
                range_calls: AtomicU32::new(0),
                after_range: Mutex::new(None),
            }
        }

        fn commit_after_next_range(self, txn: Transaction) -> Self {
            *self.after_range.lock() = Some(txn);
            self
        }
    }

    fn switch_txn(u: &UserId, from: &ArticleId, to: &ArticleId) -> Transaction {
        RankingStore::new(
            MemoryVotingStore::new(),
            ManualTimeSource::new(NOW),
            RankingConfig::default(),
        )
        .switch_transaction(u, from, to)
    }

    #[async_trait]
    impl VotingStore for ContendedStore {
        async fn open(&self) -> Result<(), StoreError> {
            self.inner.open().await
        }
        async fn close(&self) -> Result<(), StoreError> {
            self.inner.close().await
        }
        async fn submitted_at(&self, a: &ArticleId) -> Result<Option<Timestamp>, StoreError> {
            self.inner.submitted_at(a).await
        }
        async fn score(&self, a: &ArticleId) -> Result<Option<Score>, StoreError> {
            self.inner.score(a).await
        }
        async fn vote_count(&self, a: &ArticleId) -> Result<Option<u64>, StoreError> {
            self.inner.vote_count(a).await
        }
        async fn link(&self, a: &ArticleId) -> Result<Option<String>, StoreError> {
            self.inner.link(a).await
        }
        async fn is_voter(&self, a: &ArticleId, u: &UserId) -> Result<bool, StoreError> {
            self.inner.is_voter(a, u).await
        }
        async fn range_by_score(
            &self,
            min: Score,
            max: Score,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<ScoredArticle>, StoreError> {
            let page = self.inner.range_by_score(min, max, offset, limit).await?;
            self.range_calls.fetch_add(1, Ordering::SeqCst);
            let pending = self.after_range.lock().take();
            if let Some(txn) = pending {
                self.inner.commit(&txn).await?;
            }
            Ok(page)
        }
        async fn insert_article(&self, a: &Article) -> Result<bool, StoreError> {
            self.inner.insert_article(a).await
        }
        async fn commit(&self, txn: &Transaction) -> Result<CommitOutcome, StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Ok(CommitOutcome::GuardFailed);
            }
            self.inner.commit(txn).await
        }
    }

    /// Store whose every call takes longer than any sane timeout.
    struct StalledStore {
        inner: MemoryVotingStore,
    }

    #[async_trait]
    impl VotingStore for StalledStore {
        async fn open(&self) -> Result<(), StoreError> {
            self.inner.open().await
        }
        async fn close(&self) -> Result<(), StoreError> {
            self.inner.close().await
        }
        async fn submitted_at(&self, a: &ArticleId) -> Result<Option<Timestamp>, StoreError> {
            self.inner.submitted_at(a).await
        }
        async fn score(&self, a: &ArticleId) -> Result<Option<Score>, StoreError> {
            self.inner.score(a).await
        }
        async fn vote_count(&self, a: &ArticleId) -> Result<Option<u64>, StoreError> {
            self.inner.vote_count(a).await
        }
        async fn link(&self, a: &ArticleId) -> Result<Option<String>, StoreError> {
            self.inner.link(a).await
        }
        async fn is_voter(&self, a: &ArticleId, u: &UserId) -> Result<bool, StoreError> {
            self.inner.is_voter(a, u).await
        }
        async fn range_by_score(
            &self,
            min: Score,
            max: Score,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<ScoredArticle>, StoreError> {
            self.inner.range_by_score(min, max, offset, limit).await
        }
        async fn insert_article(&self, a: &Article) -> Result<bool, StoreError> {
            self.inner.insert_article(a).await
        }
        async fn commit(&self, txn: &Transaction) -> Result<CommitOutcome, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.inner.commit(txn).await
        }
    }

    #[tokio::test]
    async fn test_vote_counts_once() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0)]).await;

        assert!(ranking.vote(&user("user:3"), &id("article:1")).await.unwrap());
        assert!(!ranking.vote(&user("user:3"), &id("article:1")).await.unwrap());

        let article = ranking.article(&id("article:1")).await.unwrap();
        assert_eq!(article.score, 432.0);
        assert_eq!(article.votes, 1);
    }

    #[tokio::test]
    async fn test_vote_unknown_article() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0)]).await;

        let result = ranking.vote(&user("user:3"), &id("article:3")).await;
        assert!(matches!(result, Err(RankingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_vote_after_window_closes() {
        let (ranking, clock) = ranking_with(&[("article:1", NOW, 0.0)]).await;

        clock.advance(604_800);
        assert!(ranking.vote(&user("user:1"), &id("article:1")).await.unwrap());

        clock.advance(1);
        assert!(!ranking.vote(&user("user:2"), &id("article:1")).await.unwrap());
        assert_eq!(ranking.article(&id("article:1")).await.unwrap().votes, 1);
    }

    #[tokio::test]
    async fn test_switch_moves_vote() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0), ("article:8", NOW, 0.0)]).await;
        let u = user("user:2");

        assert!(ranking.vote(&u, &id("article:8")).await.unwrap());
        assert!(ranking
            .switch_vote(&u, &id("article:8"), &id("article:1"))
            .await
            .unwrap());

        let from = ranking.article(&id("article:8")).await.unwrap();
        let to = ranking.article(&id("article:1")).await.unwrap();
        assert_eq!((from.score, from.votes), (0.0, 0));
        assert_eq!((to.score, to.votes), (432.0, 1));
        assert!(!ranking.has_voted(&u, &id("article:8")).await.unwrap());
        assert!(ranking.has_voted(&u, &id("article:1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_switch_same_article_is_noop() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0)]).await;
        let u = user("user:1");
        ranking.vote(&u, &id("article:1")).await.unwrap();

        assert!(!ranking
            .switch_vote(&u, &id("article:1"), &id("article:1"))
            .await
            .unwrap());
        assert_eq!(ranking.article(&id("article:1")).await.unwrap().votes, 1);
    }

    #[tokio::test]
    async fn test_switch_into_already_voted_target_is_noop() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0), ("article:2", NOW, 0.0)]).await;
        let u = user("user:1");
        ranking.vote(&u, &id("article:1")).await.unwrap();
        ranking.vote(&u, &id("article:2")).await.unwrap();

        assert!(!ranking
            .switch_vote(&u, &id("article:1"), &id("article:2"))
            .await
            .unwrap());
        assert_eq!(ranking.article(&id("article:1")).await.unwrap().votes, 1);
        assert_eq!(ranking.article(&id("article:2")).await.unwrap().votes, 1);
    }

    async fn ranking_with_voter(
        u: &UserId,
    ) -> RankingStore<MemoryVotingStore, ManualTimeSource> {
        let store = MemoryVotingStore::new();
        store.seed(
            Article::new(id("article:1"), "http://one", NOW)
                .with_score(432.0)
                .with_votes(1),
        );
        store.seed_voter(&id("article:1"), u);
        RankingStore::open(store, ManualTimeSource::new(NOW), RankingConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_switch_to_unknown_article_is_not_found() {
        let u = user("user:1");
        let ranking = ranking_with_voter(&u).await;

        let result = ranking
            .switch_vote(&u, &id("article:1"), &id("article:404"))
            .await;
        assert!(matches!(
            result,
            Err(RankingError::NotFound { ref article }) if article.as_str() == "article:404"
        ));

        let kept = ranking.article(&id("article:1")).await.unwrap();
        assert_eq!((kept.score, kept.votes), (432.0, 1));
        assert!(ranking.has_voted(&u, &id("article:1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_switch_from_unknown_article_is_not_found() {
        let u = user("user:1");
        let ranking = ranking_with_voter(&u).await;

        let result = ranking
            .switch_vote(&u, &id("article:404"), &id("article:1"))
            .await;
        assert!(matches!(
            result,
            Err(RankingError::NotFound { ref article }) if article.as_str() == "article:404"
        ));

        let kept = ranking.article(&id("article:1")).await.unwrap();
        assert_eq!((kept.score, kept.votes), (432.0, 1));
        assert_eq!(ranking.store().voters(&id("article:1")), vec![u]);
    }

    #[tokio::test]
    async fn test_ids_sharing_a_suffix_vote_independently() {
        let (ranking, _) = ranking_with(&[("article:8", NOW, 0.0), ("post:8", NOW, 0.0)]).await;
        let u = user("user:1");

        assert!(ranking.vote(&u, &id("article:8")).await.unwrap());
        assert!(ranking.vote(&u, &id("post:8")).await.unwrap());

        for name in ["article:8", "post:8"] {
            let article = ranking.article(&id(name)).await.unwrap();
            assert_eq!((article.score, article.votes), (432.0, 1));
            assert!(ranking.has_voted(&u, &id(name)).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_switch_with_one_side_expired_is_noop() {
        let old = NOW - 604_801;
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0), ("article:2", old, 0.0)]).await;
        let u = user("user:1");
        ranking.store().seed_voter(&id("article:2"), &u);

        assert!(!ranking
            .switch_vote(&u, &id("article:2"), &id("article:1"))
            .await
            .unwrap());
        assert!(ranking.has_voted(&u, &id("article:2")).await.unwrap());
        assert!(!ranking.has_voted(&u, &id("article:1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_retries_after_lost_race() {
        let inner = MemoryVotingStore::new();
        inner.seed(Article::new(id("article:1"), "http://a", NOW));
        let store = ContendedStore::new(inner, 2);
        let ranking = RankingStore::open(store, ManualTimeSource::new(NOW), RankingConfig::default())
            .await
            .unwrap();

        assert!(ranking.vote(&user("user:1"), &id("article:1")).await.unwrap());
        assert_eq!(ranking.store().commits.load(Ordering::SeqCst), 3);
        assert_eq!(ranking.article(&id("article:1")).await.unwrap().votes, 1);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_retry_budget() {
        let inner = MemoryVotingStore::new();
        inner.seed(Article::new(id("article:1"), "http://a", NOW));
        let store = ContendedStore::new(inner, u32::MAX);
        let config = RankingConfig {
            max_commit_retries: 3,
            ..Default::default()
        };
        let ranking = RankingStore::open(store, ManualTimeSource::new(NOW), config)
            .await
            .unwrap();

        let result = ranking.vote(&user("user:1"), &id("article:1")).await;
        assert!(matches!(
            result,
            Err(RankingError::TransactionConflict { attempts: 3 })
        ));
        assert_eq!(ranking.store().commits.load(Ordering::SeqCst), 3);
        assert_eq!(ranking.article(&id("article:1")).await.unwrap().votes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_commit_times_out_without_writing() {
        let inner = MemoryVotingStore::new();
        inner.seed(Article::new(id("article:1"), "http://a", NOW));
        let ranking = RankingStore::open(
            StalledStore { inner },
            ManualTimeSource::new(NOW),
            RankingConfig::default(),
        )
        .await
        .unwrap();

        let result = ranking.vote(&user("user:1"), &id("article:1")).await;
        assert!(matches!(result, Err(RankingError::Timeout { .. })));
        assert!(result.unwrap_err().is_transient());

        let article = ranking.article(&id("article:1")).await.unwrap();
        assert_eq!((article.score, article.votes), (0.0, 0));
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 0.0)]).await;
        ranking.close().await.unwrap();

        let result = ranking.vote(&user("user:1"), &id("article:1")).await;
        assert!(matches!(result, Err(RankingError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_top_in_range_and_first_link() {
        let (ranking, _) = ranking_with(&[
            ("article:1", NOW, 0.0),
            ("article:2", NOW, 15.0),
            ("article:3", NOW, 30.0),
        ])
        .await;

        let hits = ranking.top_in_range(10.0, 20.0).await.unwrap();
        assert_eq!(hits, vec![ScoredArticle::new(id("article:2"), 15.0)]);

        assert_eq!(
            ranking.first_link_in_range(10.0, 20.0).await.unwrap().as_deref(),
            Some("http://article:2")
        );
        assert_eq!(ranking.first_link_in_range(100.0, 200.0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_top_in_range_reads_one_snapshot() {
        let (u, other) = (user("user:1"), user("user:9"));
        let inner = MemoryVotingStore::new();
        for (name, voter) in [("article:a", &u), ("article:m", &other)] {
            inner.seed(
                Article::new(id(name), "l", NOW)
                    .with_score(432.0)
                    .with_votes(1),
            );
            inner.seed_voter(&id(name), voter);
        }
        inner.seed(Article::new(id("article:z"), "l", NOW));

        // Another caller's switch lands right after the first range read
        let store = ContendedStore::new(inner, 0)
            .commit_after_next_range(switch_txn(&u, &id("article:a"), &id("article:z")));
        let config = RankingConfig {
            scan_page_size: 1,
            ..Default::default()
        };
        let ranking = RankingStore::open(store, ManualTimeSource::new(NOW), config)
            .await
            .unwrap();

        let before = ranking.top_in_range(0.0, 1000.0).await.unwrap();
        assert_eq!(ranking.store().range_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            before,
            vec![
                ScoredArticle::new(id("article:z"), 0.0),
                ScoredArticle::new(id("article:a"), 432.0),
                ScoredArticle::new(id("article:m"), 432.0),
            ]
        );

        let after = ranking.top_in_range(0.0, 1000.0).await.unwrap();
        assert_eq!(
            after,
            vec![
                ScoredArticle::new(id("article:a"), 0.0),
                ScoredArticle::new(id("article:m"), 432.0),
                ScoredArticle::new(id("article:z"), 432.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let (ranking, _) = ranking_with(&[("article:1", NOW, 15.0)]).await;
        assert!(ranking.top_in_range(20.0, 10.0).await.unwrap().is_empty());
        assert!(ranking.top_in_range(f64::NAN, 10.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cursor_pages_and_rewinds() {
        let store = MemoryVotingStore::new();
        for n in 0..5 {
            store.seed(
                Article::new(id(&format!("article:{}", n)), "l", NOW).with_score(n as f64),
            );
        }
        let config = RankingConfig {
            scan_page_size: 2,
            ..Default::default()
        };
        let ranking = RankingStore::open(store, ManualTimeSource::new(NOW), config)
            .await
            .unwrap();

        let mut cursor = ranking.scan_range(0.0, 10.0);
        assert_eq!(cursor.next_page().await.unwrap().unwrap().len(), 2);
        assert_eq!(cursor.next_page().await.unwrap().unwrap().len(), 2);
        assert_eq!(cursor.next_page().await.unwrap().unwrap().len(), 1);
        assert!(cursor.is_exhausted());
        assert!(cursor.next_page().await.unwrap().is_none());

        cursor.rewind();
        let first = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(first[0].id.as_str(), "article:0");
    }

    #[tokio::test]
    async fn test_submit_article_uses_clock() {
        let (ranking, clock) = ranking_with(&[]).await;
        clock.set(NOW + 10);

        assert!(ranking.submit_article(&id("article:9"), "http://nine").await.unwrap());
        assert!(!ranking.submit_article(&id("article:9"), "http://other").await.unwrap());

        let article = ranking.article(&id("article:9")).await.unwrap();
        assert_eq!(article.submitted_at, NOW + 10);
        assert_eq!(article.link, "http://nine");
        assert_eq!((article.score, article.votes), (0.0, 0));
    }
}
