//! Tiered cache composed of an ordered list of caches
//!
//! Reads fall through the tiers front to back. Writes and deletes go to every
//! tier. With promotion enabled, a value found in a deeper tier is copied
//! into every shallower one so the next read is served by the fastest tier.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tiercache_core::{
    Cache, CacheError, CacheKey, CacheValue, DeleteResult, GetResult, HasResult, Reset, Result,
    SetResult,
};
use tracing::{debug, trace, warn};

/// Maps the caller's TTL to the TTL written into one tier
pub type TtlTransform = Arc<dyn Fn(Duration) -> Duration + Send + Sync>;

struct Tier<K: CacheKey, V: CacheValue> {
    cache: Arc<dyn Cache<K, V>>,
    transform: Option<TtlTransform>,
}

impl<K: CacheKey, V: CacheValue> Tier<K, V> {
    fn ttl(&self, ttl: Duration) -> Duration {
        match &self.transform {
            Some(transform) => transform(ttl),
            None => ttl,
        }
    }
}

/// Collects tiers for a [`Chain`]
pub struct ChainBuilder<K: CacheKey, V: CacheValue> {
    tiers: Vec<Tier<K, V>>,
    promote_ttl: Option<Duration>,
}

impl<K: CacheKey, V: CacheValue> Default for ChainBuilder<K, V> {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            promote_ttl: None,
        }
    }
}

impl<K: CacheKey, V: CacheValue> ChainBuilder<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier that stores entries with the caller's TTL
    #[must_use]
    pub fn tier(mut self, cache: Arc<dyn Cache<K, V>>) -> Self {
        self.tiers.push(Tier {
            cache,
            transform: None,
        });
        self
    }

    /// Append a tier whose TTL is derived from the caller's TTL
    #[must_use]
    pub fn tier_with_ttl<F>(mut self, cache: Arc<dyn Cache<K, V>>, transform: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        self.tiers.push(Tier {
            cache,
            transform: Some(Arc::new(transform)),
        });
        self
    }

    /// Copy deep hits into shallower tiers, written with `ttl`
    ///
    /// Each tier's own transform is applied on top of `ttl`.
    #[must_use]
    pub fn promote_with_ttl(mut self, ttl: Duration) -> Self {
        self.promote_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<Chain<K, V>> {
        if self.tiers.is_empty() {
            return Err(CacheError::configuration(
                "a cache chain needs at least one tier",
            ));
        }
        Ok(Chain {
            tiers: self.tiers,
            promote_ttl: self.promote_ttl,
        })
    }
}

/// Ordered composition of caches; immutable once built
pub struct Chain<K: CacheKey, V: CacheValue> {
    tiers: Vec<Tier<K, V>>,
    promote_ttl: Option<Duration>,
}

impl<K: CacheKey, V: CacheValue> Chain<K, V> {
    pub fn builder() -> ChainBuilder<K, V> {
        ChainBuilder::new()
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn promotes(&self) -> bool {
        self.promote_ttl.is_some()
    }

    async fn promote(&self, key: &K, hit: &GetResult<V>, depth: usize, ttl: Duration) {
        let value = match hit.value() {
            Ok(Some(value)) => value,
            Ok(None) => return,
            Err(e) => {
                debug!(%key, "not promoting entry that failed to decode: {}", e);
                return;
            }
        };
        for (index, tier) in self.tiers[..depth].iter().enumerate() {
            let result = tier.cache.set(key, &value, tier.ttl(ttl)).await;
            match result.err() {
                Some(e) => warn!(%key, tier = index, "failed to promote entry: {}", e),
                None => trace!(%key, tier = index, "promoted entry"),
            }
        }
    }
}

impl<K: CacheKey, V: CacheValue> fmt::Debug for Chain<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("tiers", &self.tiers.len())
            .field("promote_ttl", &self.promote_ttl)
            .finish()
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Cache<K, V> for Chain<K, V> {
    async fn get(&self, key: &K) -> GetResult<V> {
        let mut last = GetResult::not_exists();
        for (index, tier) in self.tiers.iter().enumerate() {
            let result = tier.cache.get(key).await;
            if result.has() {
                trace!(%key, tier = index, "chain hit");
                if index > 0 {
                    if let Some(ttl) = self.promote_ttl {
                        self.promote(key, &result, index, ttl).await;
                    }
                }
                return result;
            }
            last = result;
        }
        last
    }

    async fn set(&self, key: &K, value: &V, ttl: Duration) -> SetResult {
        let mut last = SetResult::ok();
        for tier in &self.tiers {
            last = tier.cache.set(key, value, tier.ttl(ttl)).await;
        }
        last
    }

    async fn has(&self, key: &K) -> HasResult {
        let mut last = HasResult::not_exists();
        for tier in &self.tiers {
            let result = tier.cache.has(key).await;
            if result.has() {
                return result;
            }
            last = result;
        }
        last
    }

    async fn delete(&self, key: &K) -> DeleteResult {
        let mut last = DeleteResult::deleted(0);
        for tier in &self.tiers {
            last = tier.cache.delete(key).await;
        }
        last
    }

    fn as_reset(&self) -> Option<&dyn Reset> {
        Some(self)
    }
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Reset for Chain<K, V> {
    /// Reset every tier that can be reset
    ///
    /// Tiers without the capability are skipped. A failing tier does not stop
    /// the rest; the first failure is returned.
    async fn reset(&self) -> Result<()> {
        let mut first_err = None;
        for (index, tier) in self.tiers.iter().enumerate() {
            let Some(resettable) = tier.cache.as_reset() else {
                debug!(tier = index, "tier cannot be reset, skipping");
                continue;
            };
            if let Err(e) = resettable.reset().await {
                warn!(tier = index, "tier reset failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
