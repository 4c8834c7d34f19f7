//! Batch dispatch over single-key engines
//!
//! [`Batched`] gives any [`Cache`] the multi-key operations. When the wrapped
//! engine advertises a native [`BatchCache`] the call is handed straight to
//! it; otherwise every key becomes its own task. Each task runs inside a
//! panic boundary, so a panic in one item turns into an error in that item's
//! slot and its siblings complete normally.

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tiercache_core::{
    BatchCache, BatchResult, Cache, CacheError, CacheKey, CacheValue, DeleteResult, GetResult,
    HasResult, ItemResult, MDeleteResult, MGetResult, MHasResult, MSetResult, Reset, SetResult,
};
use tokio::task::JoinSet;
use tracing::{error, warn};

type SharedCache<K, V> = Arc<dyn Cache<K, V>>;

/// Batch-capable handle around a single-key cache
pub struct Batched<K: CacheKey, V: CacheValue> {
    inner: SharedCache<K, V>,
    concurrent: bool,
}

impl<K: CacheKey, V: CacheValue> Clone for Batched<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            concurrent: self.concurrent,
        }
    }
}

impl<K: CacheKey, V: CacheValue> Batched<K, V> {
    /// Wrap `inner`, running fan-out items one after another
    pub fn new(inner: SharedCache<K, V>) -> Self {
        Self {
            inner,
            concurrent: false,
        }
    }

    /// Wrap `inner`, running fan-out items as concurrent tasks
    pub fn concurrent(inner: SharedCache<K, V>) -> Self {
        Self {
            inner,
            concurrent: true,
        }
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn inner(&self) -> &SharedCache<K, V> {
        &self.inner
    }

    async fn fan_out<T, R, F, Fut>(
        &self,
        items: Vec<(K, T)>,
        op: F,
        on_error: fn(CacheError) -> R,
    ) -> BatchResult<K, R>
    where
        T: Send + 'static,
        R: ItemResult + Send + 'static,
        F: Fn(SharedCache<K, V>, K, T) -> Fut + Send,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut results = HashMap::with_capacity(items.len());

        if !self.concurrent {
            for (key, item) in items {
                let fut = op(Arc::clone(&self.inner), key.clone(), item);
                let (key, result) = guarded(key, fut, on_error).await;
                results.insert(key, result);
            }
            return BatchResult::new(results);
        }

        let mut tasks = JoinSet::new();
        for (key, item) in items {
            let fut = op(Arc::clone(&self.inner), key.clone(), item);
            tasks.spawn(guarded(key, fut, on_error));
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, result)) => {
                    results.insert(key, result);
                }
                Err(e) => error!("batch task failed to join: {}", e),
            }
        }
        BatchResult::new(results)
    }
}

/// Run one item, converting a panic into an error for that item's key
async fn guarded<K, R, Fut>(key: K, fut: Fut, on_error: fn(CacheError) -> R) -> (K, R)
where
    K: CacheKey,
    Fut: Future<Output = R>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => (key, result),
        Err(payload) => {
            let err = CacheError::panicked(&key, payload);
            warn!(%key, "batch item panicked: {}", err);
            (key, on_error(err))
        }
    }
}

fn unit_items<K: Clone>(keys: &[K]) -> Vec<(K, ())> {
    keys.iter().map(|k| (k.clone(), ())).collect()
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Cache<K, V> for Batched<K, V> {
    async fn get(&self, key: &K) -> GetResult<V> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &K, value: &V, ttl: Duration) -> SetResult {
        self.inner.set(key, value, ttl).await
    }

    async fn has(&self, key: &K) -> HasResult {
        self.inner.has(key).await
    }

    async fn delete(&self, key: &K) -> DeleteResult {
        self.inner.delete(key).await
    }

    fn as_reset(&self) -> Option<&dyn Reset> {
        self.inner.as_reset()
    }

    fn as_batch(&self) -> Option<&dyn BatchCache<K, V>> {
        Some(self)
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> BatchCache<K, V> for Batched<K, V> {
    async fn mget(&self, keys: &[K]) -> MGetResult<K, V> {
        if let Some(native) = self.inner.as_batch() {
            return native.mget(keys).await;
        }
        self.fan_out(
            unit_items(keys),
            |cache, key, ()| async move { cache.get(&key).await },
            GetResult::from_error,
        )
        .await
    }

    async fn mset(&self, entries: HashMap<K, V>, ttl: Duration) -> MSetResult<K> {
        if let Some(native) = self.inner.as_batch() {
            return native.mset(entries, ttl).await;
        }
        self.fan_out(
            entries.into_iter().collect(),
            move |cache, key, value| async move { cache.set(&key, &value, ttl).await },
            SetResult::from_error,
        )
        .await
    }

    async fn mdelete(&self, keys: &[K]) -> MDeleteResult<K> {
        if let Some(native) = self.inner.as_batch() {
            return native.mdelete(keys).await;
        }
        self.fan_out(
            unit_items(keys),
            |cache, key, ()| async move { cache.delete(&key).await },
            DeleteResult::from_error,
        )
        .await
    }

    async fn mhas(&self, keys: &[K]) -> MHasResult<K> {
        if let Some(native) = self.inner.as_batch() {
            return native.mhas(keys).await;
        }
        self.fan_out(
            unit_items(keys),
            |cache, key, ()| async move { cache.has(&key).await },
            HasResult::from_error,
        )
        .await
    }
}
