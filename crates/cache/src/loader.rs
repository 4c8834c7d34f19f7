//! Load-through cache
//!
//! A miss calls the loader and remembers the outcome. Successful loads live
//! for [`LoaderConfig::ttl`]. Failures are remembered for
//! [`LoaderConfig::fail_ttl`] when that is non-zero, so a failing backend is
//! not called again on every read.
//!
//! Concurrent misses on one key may each call the loader; the first outcome
//! stored wins and later ones are returned to their callers only.

use crate::config::LoaderConfig;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiercache_core::{
    Cache, CacheKey, CacheValue, DeleteResult, GetResult, HasResult, Reset, Result, SetResult,
};
use tracing::{debug, trace};

/// Keys inspected beyond the excess when choosing eviction victims
const EVICTION_SCAN: usize = 8;

type LoadFn<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V>> + Send + Sync>;

struct Slot<V> {
    outcome: Result<V>,
    expire_at: Option<Instant>,
}

impl<V> Slot<V> {
    fn new(outcome: Result<V>, ttl: Duration) -> Self {
        Self {
            outcome,
            expire_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|at| now > at)
    }
}

/// Cache that fills itself from a loader function
pub struct LoadingCache<K, V> {
    config: LoaderConfig,
    loader: LoadFn<K, V>,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K: CacheKey, V: CacheValue> LoadingCache<K, V> {
    pub fn new<F, Fut>(config: LoaderConfig, loader: F) -> Result<Self>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        config.validate()?;
        let loader: LoadFn<K, V> = Arc::new(move |key| loader(key).boxed());
        Ok(Self {
            config,
            loader,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Remembered keys, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Remembered outcome for `key`, calling the loader when there is none
    pub async fn load(&self, key: &K) -> Result<V> {
        if let Some(outcome) = self.lookup(key) {
            trace!(%key, "loader hit");
            return outcome;
        }

        trace!(%key, "loader miss");
        let outcome = (self.loader)(key.clone()).await;
        match &outcome {
            Ok(value) => self.store(key, Slot::new(Ok(value.clone()), self.config.ttl), false),
            Err(e) if !self.config.fail_ttl.is_zero() => {
                debug!(%key, "remembering load failure: {}", e);
                self.store(key, Slot::new(Err(e.clone()), self.config.fail_ttl), false);
            }
            Err(e) => debug!(%key, "load failed: {}", e),
        }
        outcome
    }

    /// Drop whatever is remembered for `key`; returns the number of removed slots
    pub fn forget(&self, key: &K) -> usize {
        usize::from(self.slots.lock().remove(key).is_some())
    }

    fn lookup(&self, key: &K) -> Option<Result<V>> {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        match slots.get(key) {
            None => return None,
            Some(slot) if !slot.is_expired(now) => return Some(slot.outcome.clone()),
            Some(_) => {}
        }
        slots.remove(key);
        None
    }

    /// Insert `slot`, replacing a live one only when `overwrite` is set
    fn store(&self, key: &K, slot: Slot<V>, overwrite: bool) {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(existing) if overwrite || existing.is_expired(now) => {
                *existing = slot;
                return;
            }
            Some(_) => return,
            None => {}
        }

        slots.insert(key.clone(), slot);
        let excess = slots.len().saturating_sub(self.config.capacity);
        if excess > 0 {
            evict(&mut slots, key, excess, now);
        }
    }
}

/// Remove `excess` slots other than `keep`, expired ones first
///
/// Only a bounded number of keys is inspected, so a live slot may go while an
/// expired one elsewhere in the map survives.
fn evict<K: CacheKey, V>(slots: &mut HashMap<K, Slot<V>>, keep: &K, excess: usize, now: Instant) {
    let mut candidates: Vec<(K, bool)> = slots
        .iter()
        .filter(|(k, _)| *k != keep)
        .take(excess + EVICTION_SCAN)
        .map(|(k, slot)| (k.clone(), slot.is_expired(now)))
        .collect();
    candidates.sort_by_key(|(_, expired)| !expired);
    candidates.truncate(excess);

    for (victim, _) in &candidates {
        slots.remove(victim);
    }
    trace!(evicted = candidates.len(), "loading cache over capacity");
}

impl<K, V> fmt::Debug for LoadingCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Cache<K, V> for LoadingCache<K, V> {
    /// Loads on a miss; a loader returning `NotExists` reads as a plain miss
    async fn get(&self, key: &K) -> GetResult<V> {
        match self.load(key).await {
            Ok(value) => GetResult::found(value),
            Err(e) => GetResult::from_error(e),
        }
    }

    async fn set(&self, key: &K, value: &V, ttl: Duration) -> SetResult {
        self.store(key, Slot::new(Ok(value.clone()), ttl), true);
        SetResult::ok()
    }

    /// Reports remembered values only and never calls the loader
    async fn has(&self, key: &K) -> HasResult {
        match self.lookup(key) {
            Some(Ok(_)) => HasResult::found(),
            _ => HasResult::not_exists(),
        }
    }

    async fn delete(&self, key: &K) -> DeleteResult {
        DeleteResult::deleted(self.forget(key))
    }

    fn as_reset(&self) -> Option<&dyn Reset> {
        Some(self)
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Reset for LoadingCache<K, V> {
    async fn reset(&self) -> Result<()> {
        self.slots.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tiercache_core::{CacheError, CacheExt};

    /// Loader that counts its calls and fails for key 0
    fn counting(calls: Arc<AtomicUsize>) -> impl Fn(u32) -> BoxFuture<'static, Result<u32>> {
        move |key| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if key == 0 {
                    Err(CacheError::load_message(&key, "invalid id"))
                } else {
                    Ok(key * 10)
                }
            }
            .boxed()
        }
    }

    fn cache(config: LoaderConfig) -> (LoadingCache<u32, u32>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = LoadingCache::new(config, counting(Arc::clone(&calls))).unwrap();
        (cache, calls)
    }

    #[tokio::test]
    async fn test_value_is_loaded_once() {
        let (cache, calls) = cache(LoaderConfig::default());

        assert_eq!(cache.load(&4).await.unwrap(), 40);
        assert_eq!(cache.load(&4).await.unwrap(), 40);
        assert_eq!(cache.get_value(&4).await.unwrap(), Some(40));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_remembered_by_default() {
        let (cache, calls) = cache(LoaderConfig::default());

        assert!(matches!(cache.load(&0).await, Err(CacheError::Load { .. })));
        assert!(cache.load(&0).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_remembered_for_fail_ttl() {
        let config = LoaderConfig::default().with_fail_ttl(Duration::from_millis(30));
        let (cache, calls) = cache(config);

        assert!(cache.load(&0).await.is_err());
        assert!(cache.load(&0).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.has(&0).await.has());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.load(&0).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_value_is_reloaded() {
        let config = LoaderConfig::default().with_ttl(Duration::from_millis(10));
        let (cache, calls) = cache(config);

        cache.load(&2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.has(&2).await.has());
        cache.load(&2).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_bounds_remembered_keys() {
        let config = LoaderConfig::default().with_capacity(100);
        let (cache, _) = cache(config);

        for key in 1..2_000 {
            assert_eq!(cache.load(&key).await.unwrap(), key * 10);
            assert!(cache.len() <= 100);
        }
        // The key just loaded is never the one evicted
        assert!(cache.has(&1_999).await.has());
    }

    #[tokio::test]
    async fn test_set_overrides_and_delete_forgets() {
        let (cache, calls) = cache(LoaderConfig::default());

        cache.set(&5, &7, Duration::from_secs(60)).await;
        assert_eq!(cache.load(&5).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(cache.delete(&5).await.count(), 1);
        assert_eq!(cache.delete(&5).await.count(), 0);
        assert_eq!(cache.load(&5).await.unwrap(), 50);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_has_does_not_load() {
        let (cache, calls) = cache(LoaderConfig::default());
        assert!(!cache.has(&3).await.has());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reset_forgets_everything() {
        let (cache, _) = cache(LoaderConfig::default());
        cache.load(&1).await.unwrap();
        cache.load(&2).await.unwrap();

        cache.try_reset().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_not_exists_from_loader_reads_as_miss() {
        let cache: LoadingCache<String, String> =
            LoadingCache::new(LoaderConfig::default(), |_key: String| async {
                Err::<String, _>(CacheError::NotExists)
            })
            .unwrap();

        let result = cache.get(&"absent".to_string()).await;
        assert!(result.is_not_exists());
        assert!(result.err().is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = LoadingCache::<u32, u32>::new(LoaderConfig::default().with_capacity(0), |k| {
            async move { Ok::<_, CacheError>(k) }
        });
        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }
}
