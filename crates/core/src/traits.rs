//! The cache capability contract
//!
//! [`Cache`] is the single-key interface every engine implements. Engines can
//! additionally advertise optional capabilities through the `as_*` accessors:
//! callers never assume them, they ask.

use crate::batch::{MDeleteResult, MGetResult, MHasResult, MSetResult};
use crate::errors::{CacheError, Result};
use crate::result::{DeleteResult, GetResult, HasResult, SetResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

/// Bounds required of cache keys
///
/// `Display` provides the string form used wherever a key has to leave the
/// process (for example the file engine's path derivation).
pub trait CacheKey: Eq + Hash + Clone + Display + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Display + Send + Sync + 'static {}

/// Bounds required of cache values
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// Single-key cache operations
#[async_trait]
pub trait Cache<K: CacheKey, V: CacheValue>: Send + Sync {
    /// Look up `key`; a miss is reported through the not-exists sentinel
    async fn get(&self, key: &K) -> GetResult<V>;

    /// Store `value` under `key`, expiring `ttl` from now
    async fn set(&self, key: &K, value: &V, ttl: Duration) -> SetResult;

    /// Check whether `key` has a live entry
    async fn has(&self, key: &K) -> HasResult;

    /// Remove `key`; the result counts removed entries (0 or 1)
    async fn delete(&self, key: &K) -> DeleteResult;

    /// Reset capability, if this cache can be cleared as a whole
    fn as_reset(&self) -> Option<&dyn Reset> {
        None
    }

    /// Native batch capability, if this cache has one
    fn as_batch(&self) -> Option<&dyn BatchCache<K, V>> {
        None
    }
}

/// Clears every entry of a cache
#[async_trait]
pub trait Reset: Send + Sync {
    async fn reset(&self) -> Result<()>;
}

/// Multi-key cache operations
#[async_trait]
pub trait BatchCache<K: CacheKey, V: CacheValue>: Send + Sync {
    async fn mget(&self, keys: &[K]) -> MGetResult<K, V>;

    async fn mset(&self, entries: HashMap<K, V>, ttl: Duration) -> MSetResult<K>;

    async fn mdelete(&self, keys: &[K]) -> MDeleteResult<K>;

    async fn mhas(&self, keys: &[K]) -> MHasResult<K>;
}

/// Typed shorthands over [`Cache`] returning plain `Result`s
#[async_trait]
pub trait CacheExt<K: CacheKey, V: CacheValue>: Cache<K, V> {
    /// Fetch and decode `key`; `Ok(None)` on a miss
    async fn get_value(&self, key: &K) -> Result<Option<V>> {
        self.get(key).await.value()
    }

    async fn set_value(&self, key: &K, value: &V, ttl: Duration) -> Result<()> {
        match self.set(key, value, ttl).await.err() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn contains(&self, key: &K) -> Result<bool> {
        let result = self.has(key).await;
        match result.err() {
            Some(e) => Err(e.clone()),
            None => Ok(result.has()),
        }
    }

    async fn remove(&self, key: &K) -> Result<usize> {
        let result = self.delete(key).await;
        match result.err() {
            Some(e) => Err(e.clone()),
            None => Ok(result.count()),
        }
    }

    /// Reset through the capability accessor, failing when it is absent
    async fn try_reset(&self) -> Result<()> {
        match self.as_reset() {
            Some(resettable) => resettable.reset().await,
            None => Err(CacheError::unsupported("reset")),
        }
    }
}

impl<K, V, C> CacheExt<K, V> for C
where
    K: CacheKey,
    V: CacheValue,
    C: Cache<K, V> + ?Sized,
{
}
