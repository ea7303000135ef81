use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use shortlink_core::cache::{Result, UrlCache};
use shortlink_core::{CacheError, ShortCode};
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const DEFAULT_KEY_PREFIX: &str = "shortlink:url:";

/// The JSON document stored under each key.
#[derive(Debug, Serialize, Deserialize)]
struct CachedUrl<'a> {
    original_url: std::borrow::Cow<'a, str>,
}

/// A Redis-backed [`UrlCache`] shared by every service instance.
///
/// Values are small JSON documents under `key_prefix + code`. Without a TTL
/// entries live until they are overwritten or deleted by a mutation path.
#[derive(Debug, Clone)]
pub struct RedisUrlCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    ttl: Option<Duration>,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisUrlCache {
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    /// Creates a cache with a custom key prefix (e.g. "myapp:url:").
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            ttl: None,
        }
    }

    /// Expire entries `ttl` after they are written. Whole seconds, minimum one.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Opens a connection to `redis_url` and wraps it.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Initialization(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    fn cache_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.key_prefix, code.as_str())
    }
}

#[async_trait]
impl UrlCache for RedisUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>> {
        let key = self.cache_key(code);
        trace!(code = %code, "Fetching URL from Redis cache");

        let mut conn = self.conn.clone();
        let cached = conn.get::<_, Option<String>>(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "Redis error on get");
            map_redis_error("failed to fetch value from Redis", e)
        })?;

        let Some(cached) = cached else {
            trace!(code = %code, "Cache miss in Redis");
            return Ok(None);
        };

        debug!(code = %code, "Cache hit in Redis");
        serde_json::from_str::<CachedUrl<'_>>(&cached)
            .map(|entry| Some(entry.original_url.into_owned()))
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to deserialize cached URL");
                CacheError::InvalidData(format!("invalid cached value for key '{key}': {e}"))
            })
    }

    async fn set_url(&self, code: &ShortCode, original_url: &str) -> Result<()> {
        let key = self.cache_key(code);
        trace!(code = %code, "Storing URL in Redis cache");

        let json = serde_json::to_string(&CachedUrl {
            original_url: original_url.into(),
        })
        .map_err(|e| CacheError::Serialization(format!("failed to serialize cache value: {e}")))?;

        let mut conn = self.conn.clone();
        let written = match self.ttl {
            Some(ttl) => {
                conn.set_ex::<_, _, ()>(&key, json, ttl.as_secs().max(1))
                    .await
            }
            None => conn.set::<_, _, ()>(&key, json).await,
        };

        written.map_err(|e| {
            warn!(code = %code, error = %e, "Failed to cache URL in Redis");
            map_redis_error("failed to write value to Redis", e)
        })?;
        debug!(code = %code, "Cached URL in Redis");
        Ok(())
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        let key = self.cache_key(code);
        trace!(code = %code, "Removing URL from Redis cache");

        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "Failed to remove URL from Redis cache");
            map_redis_error("failed to delete value from Redis", e)
        })?;
        debug!(code = %code, "Removed URL from Redis cache");
        Ok(())
    }
}
