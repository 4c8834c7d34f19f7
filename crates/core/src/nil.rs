//! A cache that stores nothing

use crate::batch::{MDeleteResult, MGetResult, MHasResult, MSetResult};
use crate::errors::Result;
use crate::result::{DeleteResult, GetResult, HasResult, SetResult};
use crate::traits::{BatchCache, Cache, CacheKey, CacheValue, Reset};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Black-hole cache: writes succeed and are dropped, every lookup misses
///
/// Useful as a placeholder tier or to switch caching off without changing
/// the call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilCache;

impl NilCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Cache<K, V> for NilCache {
    async fn get(&self, _key: &K) -> GetResult<V> {
        GetResult::not_exists()
    }

    async fn set(&self, _key: &K, _value: &V, _ttl: Duration) -> SetResult {
        SetResult::ok()
    }

    async fn has(&self, _key: &K) -> HasResult {
        HasResult::not_exists()
    }

    async fn delete(&self, _key: &K) -> DeleteResult {
        DeleteResult::deleted(0)
    }

    fn as_reset(&self) -> Option<&dyn Reset> {
        Some(self)
    }

    fn as_batch(&self) -> Option<&dyn BatchCache<K, V>> {
        Some(self)
    }
}

#[async_trait]
impl Reset for NilCache {
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> BatchCache<K, V> for NilCache {
    async fn mget(&self, keys: &[K]) -> MGetResult<K, V> {
        keys.iter()
            .map(|k| (k.clone(), GetResult::not_exists()))
            .collect()
    }

    async fn mset(&self, entries: HashMap<K, V>, _ttl: Duration) -> MSetResult<K> {
        entries
            .into_keys()
            .map(|k| (k, SetResult::ok()))
            .collect()
    }

    async fn mdelete(&self, keys: &[K]) -> MDeleteResult<K> {
        keys.iter()
            .map(|k| (k.clone(), DeleteResult::deleted(0)))
            .collect()
    }

    async fn mhas(&self, keys: &[K]) -> MHasResult<K> {
        keys.iter()
            .map(|k| (k.clone(), HasResult::not_exists()))
            .collect()
    }
}
