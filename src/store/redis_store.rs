//! Redis Store Module
//!
//! [`KvStore`] backed by a Redis server over a multiplexed async connection.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use crate::error::{GateError, Result};
use crate::store::{KvStore, ServerInfo, MAX_EXPIRE_SECS};

/// Redis-backed implementation of [`KvStore`].
///
/// The connection is opened lazily on first use and shared afterwards;
/// clones of a multiplexed connection pipeline over the same socket.
pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisStore {
    /// Create a new `RedisStore` from an existing client.
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
        }
    }

    /// Create a new `RedisStore` from a URL such as `redis://localhost:6379/1`.
    pub fn from_url(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| GateError::Store(format!("failed to open Redis client: {e}")))?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let con = self
            .connection
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| GateError::Store(format!("Redis connection error: {e}")))
            })
            .await?;
        Ok(con.clone())
    }
}

/// Renders a score bound, spelling infinities the way Redis expects.
fn score_arg(score: f64) -> String {
    if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if score == f64::INFINITY {
        "+inf".to_string()
    } else {
        score.to_string()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut con = self.connection().await?;
        let _: () = con.set_ex(key, value, ttl_secs.min(MAX_EXPIRE_SECS)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection().await?;
        let raw: Option<String> = con.get(key).await?;
        Ok(raw)
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.connection().await?;
        let removed: u64 = con.del(keys).await?;
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut con = self.connection().await?;
        let keys: Vec<String> = con.keys(pattern).await?;
        Ok(keys)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut con = self.connection().await?;
        let _: () = con.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut con = self.connection().await?;
        let count: u64 = con.zcard(key).await?;
        Ok(count)
    }

    async fn zrembyscore(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut con = self.connection().await?;
        let removed: u64 = con
            .zrembyscore(key, score_arg(min), score_arg(max))
            .await?;
        Ok(removed)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut con = self.connection().await?;
        let seconds = seconds.min(MAX_EXPIRE_SECS) as i64;
        let applied: bool = con.expire(key, seconds).await?;
        Ok(applied)
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut con = self.connection().await?;
        let value: i64 = con.incr(key, delta).await?;
        Ok(value)
    }

    async fn info(&self) -> Result<ServerInfo> {
        let mut con = self.connection().await?;
        let raw: String = redis::cmd("INFO").query_async(&mut con).await?;
        Ok(ServerInfo::parse(&raw))
    }
}
