//! Redis-backed ephemeral store

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, RedisError, Script};
use async_trait::async_trait;

use super::{EphemeralStore, StoreError, SwapOutcome};

/// GET-compare-SET in one step. Returns 1 swapped, 0 conflict, -1 missing.
const COMPARE_AND_SWAP_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return -1
end
if current ~= ARGV[1] then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

/// Bounds-checked LSET that also refreshes the list TTL. Returns 1 on write.
const SET_ITEM_SCRIPT: &str = r#"
local len = redis.call('LLEN', KEYS[1])
local index = tonumber(ARGV[1])
if index >= len then
  return 0
end
redis.call('LSET', KEYS[1], index, ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
"#;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Operation(err.to_string())
        }
    }
}

/// Redis implementation of [`EphemeralStore`]
///
/// Values are stored as Redis strings, claim logs as Redis lists. The
/// multiplexed connection is cloned per call and shared by all callers.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    compare_and_swap: Script,
    set_item: Script,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with a PING
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut connection).await?;

        tracing::info!("Redis connection established");

        Ok(Self {
            connection,
            compare_and_swap: Script::new(COMPARE_AND_SWAP_SCRIPT),
            set_item: Script::new(SET_ITEM_SCRIPT),
        })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

/// Redis list index for `index`; positions beyond `isize` cannot exist and
/// would otherwise wrap to negative, tail-relative indexes
fn list_index(index: u64) -> Option<isize> {
    isize::try_from(index).ok()
}

/// Redis expirations have whole-second granularity
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.set_ex(key, value, ttl_seconds(ttl)).await?;
        tracing::debug!(key = %key, ttl = ttl.as_secs(), "Stored value");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: &[u8],
        ttl: Duration,
    ) -> Result<SwapOutcome, StoreError> {
        let mut conn = self.conn();
        let outcome: i64 = self
            .compare_and_swap
            .key(key)
            .arg(expected)
            .arg(new)
            .arg(ttl_seconds(ttl))
            .invoke_async(&mut conn)
            .await?;

        Ok(match outcome {
            1 => SwapOutcome::Swapped,
            0 => SwapOutcome::Conflict,
            _ => SwapOutcome::Missing,
        })
    }

    async fn append_atomic(
        &self,
        key: &str,
        item: &[u8],
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let (len,): (u64,) = ::redis::pipe()
            .atomic()
            .rpush(key, item)
            .expire(key, ttl_seconds(ttl) as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(key = %key, len = len, "Appended list item");
        Ok(len)
    }

    async fn range(&self, key: &str, start: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        let Some(start) = list_index(start) else {
            return Ok(Vec::new());
        };
        let mut conn = self.conn();
        let items: Vec<Vec<u8>> = conn.lrange(key, start, -1).await?;
        Ok(items)
    }

    async fn item(&self, key: &str, index: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(index) = list_index(index) else {
            return Ok(None);
        };
        let mut conn = self.conn();
        let item: Option<Vec<u8>> = conn.lindex(key, index).await?;
        Ok(item)
    }

    async fn set_item(
        &self,
        key: &str,
        index: u64,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        if list_index(index).is_none() {
            return Ok(false);
        }
        let mut conn = self.conn();
        let written: i64 = self
            .set_item
            .key(key)
            .arg(index)
            .arg(value)
            .arg(ttl_seconds(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(written == 1)
    }

    async fn refresh_ttl(&self, keys: &[String], ttl: Duration) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.expire(key, ttl_seconds(ttl) as i64).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
