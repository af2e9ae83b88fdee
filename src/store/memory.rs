//! In-process ephemeral store
//!
//! Used for single-instance deployments without Redis and by the test suite.
//! Expiry is lazy: an expired entry is dropped the next time it is touched.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{EphemeralStore, StoreError, SwapOutcome};

#[derive(Debug, Clone)]
enum Value {
    Plain(Vec<u8>),
    List(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Mutex-guarded map implementing [`EphemeralStore`]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        f(&mut entries)
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Operation(format!("wrong value type at key {}", key))
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Plain(value.to_vec()),
                    expires_at: Instant::now() + ttl,
                },
            );
            Ok(())
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Plain(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: &[u8],
        ttl: Duration,
    ) -> Result<SwapOutcome, StoreError> {
        self.with_entries(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(SwapOutcome::Missing);
            };
            match &entry.value {
                Value::Plain(current) if current.as_slice() == expected => {
                    entry.value = Value::Plain(new.to_vec());
                    entry.expires_at = Instant::now() + ttl;
                    Ok(SwapOutcome::Swapped)
                }
                Value::Plain(_) => Ok(SwapOutcome::Conflict),
                Value::List(_) => Err(wrong_type(key)),
            }
        })
    }

    async fn append_atomic(
        &self,
        key: &str,
        item: &[u8],
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        self.with_entries(|entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::List(Vec::new()),
                expires_at: Instant::now() + ttl,
            });
            entry.expires_at = Instant::now() + ttl;
            match &mut entry.value {
                Value::List(items) => {
                    items.push(item.to_vec());
                    Ok(items.len() as u64)
                }
                Value::Plain(_) => Err(wrong_type(key)),
            }
        })
    }

    async fn range(&self, key: &str, start: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(match usize::try_from(start) {
                Ok(start) => items.iter().skip(start).cloned().collect(),
                Err(_) => Vec::new(),
            }),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn item(&self, key: &str, index: u64) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(usize::try_from(index)
                .ok()
                .and_then(|index| items.get(index))
                .cloned()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_item(
        &self,
        key: &str,
        index: u64,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.with_entries(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(false);
            };
            match &mut entry.value {
                Value::List(items) => match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        *slot = value.to_vec();
                        entry.expires_at = Instant::now() + ttl;
                        Ok(true)
                    }
                    None => Ok(false),
                },
                Value::Plain(_) => Err(wrong_type(key)),
            }
        })
    }

    async fn refresh_ttl(&self, keys: &[String], ttl: Duration) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            let expires_at = Instant::now() + ttl;
            for key in keys {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = expires_at;
                }
            }
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_entries(|_| Ok(()))
    }
}
