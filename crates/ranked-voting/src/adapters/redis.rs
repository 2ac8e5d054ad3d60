//! Redis-backed `VotingStore`.
//!
//! Key layout:
//!
//! | Structure | Key | Content |
//! |-----------|-----|---------|
//! | score index | `score:` | zset, member = article id |
//! | time index | `time:` | zset, score = submitted_at |
//! | voter set | `voted:<article id>` | set of user ids |
//! | article | `<article id>` | hash with `link`, `time`, `votes` |
//!
//! Commits run as one Lua script, so guards and writes execute atomically
//! on the server.

use crate::domain::entities::{Article, ScoredArticle};
use crate::domain::errors::StoreError;
use crate::domain::value_objects::{ArticleId, Score, Timestamp, UserId};
use crate::ports::outbound::{CommitOutcome, Guard, Transaction, VotingStore, WriteOp};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub mod keys {
    use crate::domain::value_objects::ArticleId;

    pub const SCORE_INDEX: &str = "score:";
    pub const TIME_INDEX: &str = "time:";
    pub const LINK_FIELD: &str = "link";
    pub const TIME_FIELD: &str = "time";
    pub const VOTES_FIELD: &str = "votes";

    pub fn voted(article: &ArticleId) -> String {
        format!("voted:{}", article)
    }
}

/// Error code raised by the commit script when a counter would go negative.
const NEGATIVE_VOTES: &str = "NEGATIVE_VOTES";

/// ARGV[1] is the guard count, followed by `set member expected` triples.
/// The rest are writes, each prefixed by its command name. The first pass
/// validates counters, the second applies.
const COMMIT_SCRIPT: &str = r#"
local guards = tonumber(ARGV[1])
local i = 2
for _ = 1, guards do
  if redis.call('SISMEMBER', ARGV[i], ARGV[i + 1]) ~= tonumber(ARGV[i + 2]) then
    return 0
  end
  i = i + 3
end
local first_write = i

for pass = 1, 2 do
  i = first_write
  while i <= #ARGV do
    local op = ARGV[i]
    if op == 'SADD' then
      if pass == 2 then redis.call('SADD', ARGV[i + 1], ARGV[i + 2]) end
      i = i + 3
    elseif op == 'SMOVE' then
      if pass == 2 then redis.call('SMOVE', ARGV[i + 1], ARGV[i + 2], ARGV[i + 3]) end
      i = i + 4
    elseif op == 'ZINCRBY' then
      if pass == 2 then redis.call('ZINCRBY', ARGV[i + 1], ARGV[i + 2], ARGV[i + 3]) end
      i = i + 4
    elseif op == 'HINCRBY' then
      if pass == 1 then
        local current = tonumber(redis.call('HGET', ARGV[i + 1], ARGV[i + 2]) or '0')
        if current + tonumber(ARGV[i + 3]) < 0 then
          return redis.error_reply('NEGATIVE_VOTES ' .. ARGV[i + 1])
        end
      else
        redis.call('HINCRBY', ARGV[i + 1], ARGV[i + 2], ARGV[i + 3])
      end
      i = i + 4
    else
      return redis.error_reply('ERR unknown write ' .. tostring(op))
    end
  end
end
return 1
"#;

/// KEYS: article hash, score index, time index.
/// ARGV: article id, link, submitted_at, score, votes.
const INSERT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'link', ARGV[2], 'time', ARGV[3], 'votes', ARGV[5])
redis.call('ZADD', KEYS[2], ARGV[4], ARGV[1])
redis.call('ZADD', KEYS[3], ARGV[3], ARGV[1])
return 1
"#;

/// `VotingStore` over a single Redis server.
pub struct RedisVotingStore {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    commit_script: Script,
    insert_script: Script,
}

impl RedisVotingStore {
    /// Parse `url` (e.g. `redis://127.0.0.1/`). No connection is made until `open`.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
            commit_script: Script::new(COMMIT_SCRIPT),
            insert_script: Script::new(INSERT_SCRIPT),
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, StoreError> {
        self.connection.read().await.clone().ok_or(StoreError::Closed)
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.code() == Some(NEGATIVE_VOTES) {
        return StoreError::Corrupt {
            key: err.detail().unwrap_or_default().to_string(),
            reason: "vote count would become negative".to_string(),
        };
    }
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn decode_timestamp(article: &ArticleId, raw: f64) -> Result<Timestamp, StoreError> {
    if raw.is_finite() && raw >= 0.0 {
        Ok(raw as Timestamp)
    } else {
        Err(StoreError::Corrupt {
            key: keys::TIME_INDEX.to_string(),
            reason: format!("{} has submission time {}", article, raw),
        })
    }
}

/// Flatten a transaction into the commit script's ARGV.
fn encode_transaction(txn: &Transaction) -> Vec<String> {
    let mut args = Vec::with_capacity(1 + txn.guards.len() * 3 + txn.writes.len() * 4);
    args.push(txn.guards.len().to_string());

    for guard in &txn.guards {
        match guard {
            Guard::Voter {
                article,
                user,
                present,
            } => {
                args.push(keys::voted(article));
                args.push(user.to_string());
                args.push(if *present { "1" } else { "0" }.to_string());
            }
        }
    }

    for op in &txn.writes {
        match op {
            WriteOp::AddVoter { article, user } => {
                args.extend(["SADD".to_string(), keys::voted(article), user.to_string()]);
            }
            WriteOp::MoveVoter { from, to, user } => {
                args.extend([
                    "SMOVE".to_string(),
                    keys::voted(from),
                    keys::voted(to),
                    user.to_string(),
                ]);
            }
            WriteOp::IncrScore { article, delta } => {
                args.extend([
                    "ZINCRBY".to_string(),
                    keys::SCORE_INDEX.to_string(),
                    delta.to_string(),
                    article.to_string(),
                ]);
            }
            WriteOp::IncrVotes { article, delta } => {
                args.extend([
                    "HINCRBY".to_string(),
                    article.to_string(),
                    keys::VOTES_FIELD.to_string(),
                    delta.to_string(),
                ]);
            }
        }
    }

    args
}

#[async_trait]
impl VotingStore for RedisVotingStore {
    async fn open(&self) -> Result<(), StoreError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;
        *self.connection.write().await = Some(conn);
        info!("Connected to Redis");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.connection.write().await.take().is_some() {
            info!("Closed Redis connection");
        }
        Ok(())
    }

    async fn submitted_at(&self, article: &ArticleId) -> Result<Option<Timestamp>, StoreError> {
        let mut conn = self.conn().await?;
        let raw: Option<f64> = conn
            .zscore(keys::TIME_INDEX, article.as_str())
            .await
            .map_err(map_redis_error)?;
        raw.map(|t| decode_timestamp(article, t)).transpose()
    }

    async fn score(&self, article: &ArticleId) -> Result<Option<Score>, StoreError> {
        let mut conn = self.conn().await?;
        conn.zscore(keys::SCORE_INDEX, article.as_str())
            .await
            .map_err(map_redis_error)
    }

    async fn vote_count(&self, article: &ArticleId) -> Result<Option<u64>, StoreError> {
        let mut conn = self.conn().await?;
        let raw: Option<i64> = conn
            .hget(article.as_str(), keys::VOTES_FIELD)
            .await
            .map_err(map_redis_error)?;
        raw.map(|votes| {
            u64::try_from(votes).map_err(|_| StoreError::Corrupt {
                key: article.to_string(),
                reason: format!("negative vote count {}", votes),
            })
        })
        .transpose()
    }

    async fn link(&self, article: &ArticleId) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        conn.hget(article.as_str(), keys::LINK_FIELD)
            .await
            .map_err(map_redis_error)
    }

    async fn is_voter(&self, article: &ArticleId, user: &UserId) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        conn.sismember(keys::voted(article), user.as_str())
            .await
            .map_err(map_redis_error)
    }

    async fn range_by_score(
        &self,
        min: Score,
        max: Score,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoredArticle>, StoreError> {
        let mut conn = self.conn().await?;
        let offset = isize::try_from(offset).unwrap_or(isize::MAX);
        // A negative LIMIT count returns every remaining member.
        let limit = isize::try_from(limit).unwrap_or(-1);
        let raw: Vec<(String, f64)> = conn
            .zrangebyscore_limit_withscores(keys::SCORE_INDEX, min, max, offset, limit)
            .await
            .map_err(map_redis_error)?;
        Ok(raw
            .into_iter()
            .map(|(id, score)| ScoredArticle::new(ArticleId::from(id), score))
            .collect())
    }

    async fn insert_article(&self, article: &Article) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let inserted: i64 = self
            .insert_script
            .key(article.id.as_str())
            .key(keys::SCORE_INDEX)
            .key(keys::TIME_INDEX)
            .arg(article.id.as_str())
            .arg(article.link.as_str())
            .arg(article.submitted_at)
            .arg(article.score)
            .arg(article.votes)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(inserted == 1)
    }

    async fn commit(&self, txn: &Transaction) -> Result<CommitOutcome, StoreError> {
        let mut conn = self.conn().await?;
        let mut invocation = self.commit_script.prepare_invoke();
        for arg in encode_transaction(txn) {
            invocation.arg(arg);
        }
        let applied: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        debug!(
            guards = txn.guards.len(),
            writes = txn.writes.len(),
            applied = applied == 1,
            "Commit script finished"
        );

        Ok(if applied == 1 {
            CommitOutcome::Committed
        } else {
            CommitOutcome::GuardFailed
        })
    }
}
