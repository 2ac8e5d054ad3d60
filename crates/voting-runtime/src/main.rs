//! # Voting Runtime
//!
//! Opens a `VotingStore`, wraps it in a `RankingStore` and replays the
//! article voting flow:
//!
//! 1. `user:3` votes for `article:1`
//! 2. `user:3` votes for `article:3`
//! 3. `user:2` switches their vote from `article:8` to `article:1`
//! 4. The link of the first article scored within the configured range is
//!    printed to stdout
//!
//! Without `RV_REDIS_URL` the in-memory store is used and seeded with demo
//! articles.

mod config;

use anyhow::{Context, Result};
use ranked_voting::{
    Article, ArticleId, MemoryVotingStore, RankingApi, RankingError, RankingStore,
    SystemTimeSource, TimeSource, UserId, VotingStore,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::RuntimeConfig;

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Articles the flow refers to. `article:5` sits inside the default range.
fn demo_articles(now: u64) -> Vec<Article> {
    vec![
        Article::new(ArticleId::from("article:1"), "https://news.example/1", now),
        Article::new(ArticleId::from("article:8"), "https://news.example/8", now),
        Article::new(ArticleId::from("article:5"), "https://news.example/5", now).with_score(15.0),
    ]
}

async fn vote_logged<S, T>(ranking: &RankingStore<S, T>, user: &str, article: &str) -> Result<()>
where
    S: VotingStore,
    T: TimeSource,
{
    let (user, article) = (UserId::from(user), ArticleId::from(article));
    match ranking.vote(&user, &article).await {
        Ok(counted) => info!(%user, %article, counted, "Vote processed"),
        Err(RankingError::NotFound { article }) => warn!(%user, %article, "Vote skipped: no such article"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// What the replayed flow observed.
#[derive(Debug, PartialEq)]
struct FlowReport {
    switched: bool,
    first_link: Option<String>,
}

async fn run<S: VotingStore>(store: S, config: RuntimeConfig) -> Result<FlowReport> {
    let ranking = RankingStore::open(store, SystemTimeSource, config.ranking.clone())
        .await
        .context("opening voting store")?;

    if config.seed_demo {
        for article in demo_articles(SystemTimeSource.now()) {
            ranking.submit_article(&article.id, &article.link).await?;
        }
    }

    vote_logged(&ranking, "user:3", "article:1").await?;
    vote_logged(&ranking, "user:3", "article:3").await?;

    let (user, from, to) = (
        UserId::from("user:2"),
        ArticleId::from("article:8"),
        ArticleId::from("article:1"),
    );
    vote_logged(&ranking, user.as_str(), from.as_str()).await?;
    let switched = ranking.switch_vote(&user, &from, &to).await?;
    info!(%user, %from, %to, switched, "Switch processed");

    let first_link = ranking
        .first_link_in_range(config.range_min, config.range_max)
        .await?;
    match &first_link {
        Some(link) => println!("{}", link),
        None => info!(
            min = config.range_min,
            max = config.range_max,
            "No article scored within range"
        ),
    }

    ranking.close().await?;
    Ok(FlowReport {
        switched,
        first_link,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    init_logging(&config.log_level)?;

    match config.redis_url.clone() {
        #[cfg(feature = "redis")]
        Some(url) => {
            info!(%url, "Using Redis voting store");
            let store = ranked_voting::RedisVotingStore::new(&url).context("parsing RV_REDIS_URL")?;
            run(store, config).await?;
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => anyhow::bail!("RV_REDIS_URL is set but redis support was not compiled in"),
        None => {
            info!("Using in-memory voting store with demo articles");
            let store = MemoryVotingStore::new();
            for article in demo_articles(SystemTimeSource.now()) {
                store.seed(article);
            }
            let config = RuntimeConfig {
                seed_demo: false,
                ..config
            };
            run(store, config).await?;
        }
    }
    Ok(())
}
