//! Bounded in-memory cache with least-recently-used eviction
//!
//! Entries live in an [`lru::LruCache`] (hash map plus recency list) behind a
//! single mutex. Expiry is checked lazily on access; nothing runs in the
//! background. Hits hand back a clone of the stored value, no codec involved.

use crate::config::LruConfig;
use async_trait::async_trait;
use lru::LruCache as RecencyMap;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tiercache_core::{
    Cache, CacheError, CacheKey, CacheValue, DeleteResult, GetResult, HasResult, Reset, Result,
    SetResult,
};
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    /// `None` when `now + ttl` does not fit in an `Instant`
    expire_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expire_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|at| now > at)
    }
}

/// In-memory LRU engine
pub struct LruCache<K: CacheKey, V: CacheValue> {
    entries: Mutex<RecencyMap<K, Entry<V>>>,
    consume_on_has: bool,
}

impl<K: CacheKey, V: CacheValue> LruCache<K, V> {
    pub fn new(config: LruConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.capacity)
            .ok_or_else(|| CacheError::configuration("LRU capacity must be at least 1"))?;
        Ok(Self {
            entries: Mutex::new(RecencyMap::new(capacity)),
            consume_on_has: config.consume_on_has,
        })
    }

    /// Number of stored entries, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Stored keys from most to least recently used
    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Cache<K, V> for LruCache<K, V> {
    async fn get(&self, key: &K) -> GetResult<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            None => {
                trace!(%key, "lru miss");
                return GetResult::not_exists();
            }
            Some(entry) if !entry.is_expired(now) => {
                trace!(%key, "lru hit");
                return GetResult::found(entry.value.clone());
            }
            Some(_) => {}
        }
        entries.pop(key);
        trace!(%key, "lru entry expired");
        GetResult::not_exists()
    }

    async fn set(&self, key: &K, value: &V, ttl: Duration) -> SetResult {
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), Entry::new(value.clone(), ttl)) {
            if evicted != *key {
                trace!(key = %evicted, "lru evicted least recently used entry");
            }
        }
        SetResult::ok()
    }

    async fn has(&self, key: &K) -> HasResult {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let live = match entries.peek(key) {
            None => return HasResult::not_exists(),
            Some(entry) => !entry.is_expired(now),
        };
        if !live {
            entries.pop(key);
            return HasResult::not_exists();
        }
        if self.consume_on_has {
            entries.pop(key);
        }
        HasResult::found()
    }

    async fn delete(&self, key: &K) -> DeleteResult {
        let removed = self.entries.lock().pop(key).is_some();
        DeleteResult::deleted(usize::from(removed))
    }

    fn as_reset(&self) -> Option<&dyn Reset> {
        Some(self)
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Reset for LruCache<K, V> {
    async fn reset(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
