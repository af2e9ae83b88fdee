//! Ephemeral key/value storage with per-key time-to-live
//!
//! Every piece of job state lives behind [`EphemeralStore`]. The store offers
//! plain values, append-only lists and two atomic primitives
//! ([`EphemeralStore::compare_and_swap`] and [`EphemeralStore::set_item`]) so
//! callers never need cross-key transactions.

pub mod keys;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use keys::JobKeys;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation failed: {0}")]
    Operation(String),
}

/// Result of a conditional replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The value matched and was replaced
    Swapped,
    /// The value changed since it was read; nothing was written
    Conflict,
    /// The key does not exist (never written or expired)
    Missing,
}

/// Key/value store with per-key TTL and atomic list appends
///
/// All operations are atomic with respect to concurrent callers on the same
/// key. Implementations never retry; an unreachable backend surfaces as
/// [`StoreError::Unavailable`].
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Write a plain value, replacing any previous value and TTL
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// Read a plain value
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace `key` with `new` only if it currently holds exactly `expected`
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: &[u8],
        ttl: Duration,
    ) -> Result<SwapOutcome, StoreError>;

    /// Append `item` to the list at `key` and return the new list length
    ///
    /// Concurrent appends are serialized; the returned length minus one is
    /// the position the item landed at.
    async fn append_atomic(&self, key: &str, item: &[u8], ttl: Duration)
    -> Result<u64, StoreError>;

    /// Read list items from position `start` to the end
    async fn range(&self, key: &str, start: u64) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Read one list item
    async fn item(&self, key: &str, index: u64) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite one existing list item
    ///
    /// Returns `false` when the list is missing or shorter than `index + 1`.
    async fn set_item(
        &self,
        key: &str,
        index: u64,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Reset the TTL of every existing key in `keys` to `ttl`
    async fn refresh_ttl(&self, keys: &[String], ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;
}
