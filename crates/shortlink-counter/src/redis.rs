use async_trait::async_trait;
use redis::Script;
use shortlink_core::coordination::Result;
use shortlink_core::{CoordinationError, CoordinationStore, Version, Versioned};
use tracing::{debug, trace, warn};

const VALUE_FIELD: &str = "value";
const VERSION_FIELD: &str = "version";

/// Sets `value` and bumps `version` only if `version` still equals ARGV[2].
/// Returns 1 on success, 0 on a version mismatch, -1 if the node is missing.
const WRITE_CONDITIONAL_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'version')
if not current then
  return -1
end
if current ~= ARGV[2] then
  return 0
end
redis.call('HSET', KEYS[1], 'value', ARGV[1])
redis.call('HINCRBY', KEYS[1], 'version', 1)
return 1
"#;

/// Creates the node at version 0 unless it exists. Returns 1 if created.
const CREATE_IF_ABSENT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'value', ARGV[1], 'version', '0')
return 1
"#;

/// A [`CoordinationStore`] on a single Redis primary.
///
/// Each node is a hash holding `value` and a monotonically increasing
/// `version`. Conditional writes run as Lua scripts, which Redis executes
/// atomically, so the compare and the set cannot interleave with another
/// instance's write.
#[derive(Debug, Clone)]
pub struct RedisCoordinationStore {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    write_conditional: Script,
    create_if_absent: Script,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CoordinationError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CoordinationError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CoordinationError::Unavailable(message)
    } else {
        CoordinationError::Operation(message)
    }
}

impl RedisCoordinationStore {
    /// Creates a store over a multiplexed Redis connection.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, "")
    }

    /// Creates a store that namespaces every node key with `key_prefix`.
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            write_conditional: Script::new(WRITE_CONDITIONAL_SCRIPT),
            create_if_absent: Script::new(CREATE_IF_ABSENT_SCRIPT),
        }
    }

    /// Opens a connection to `redis_url` and wraps it.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("invalid redis url", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    fn node_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn read_versioned(&self, key: &str) -> Result<Versioned> {
        let node_key = self.node_key(key);
        trace!(key = %node_key, "reading coordination node");

        let mut conn = self.conn.clone();
        let (value, version): (Option<Vec<u8>>, Option<String>) = redis::cmd("HMGET")
            .arg(&node_key)
            .arg(VALUE_FIELD)
            .arg(VERSION_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(key = %node_key, error = %e, "Redis error on coordination read");
                map_redis_error("failed to read coordination node", e)
            })?;

        let (Some(value), Some(version)) = (value, version) else {
            return Err(CoordinationError::NotFound(node_key));
        };
        let version = version.parse::<u64>().map_err(|e| {
            CoordinationError::InvalidData(format!(
                "invalid version '{version}' on node '{node_key}': {e}"
            ))
        })?;

        Ok(Versioned {
            value,
            version: Version::new(version),
        })
    }

    async fn write_conditional(&self, key: &str, value: &[u8], expected: Version) -> Result<()> {
        let node_key = self.node_key(key);
        trace!(key = %node_key, %expected, "conditional write on coordination node");

        let mut conn = self.conn.clone();
        let outcome: i64 = self
            .write_conditional
            .key(&node_key)
            .arg(value)
            .arg(expected.get().to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(key = %node_key, error = %e, "Redis error on conditional write");
                map_redis_error("failed to write coordination node", e)
            })?;

        match outcome {
            1 => {
                debug!(key = %node_key, %expected, "conditional write committed");
                Ok(())
            }
            0 => Err(CoordinationError::VersionConflict { expected }),
            -1 => Err(CoordinationError::NotFound(node_key)),
            other => Err(CoordinationError::InvalidData(format!(
                "unexpected conditional write reply {other}"
            ))),
        }
    }

    async fn create_if_absent(&self, key: &str, initial: &[u8]) -> Result<bool> {
        let node_key = self.node_key(key);
        trace!(key = %node_key, "creating coordination node if absent");

        let mut conn = self.conn.clone();
        let created: i64 = self
            .create_if_absent
            .key(&node_key)
            .arg(initial)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(key = %node_key, error = %e, "Redis error on node creation");
                map_redis_error("failed to create coordination node", e)
            })?;

        Ok(created == 1)
    }
}
