//! Cache engines and composition for `tiercache`
//!
//! - [`LruCache`]: bounded in-memory engine with lazy expiry
//! - [`FileCache`]: file-per-key persistent engine with background GC
//! - [`Batched`]: multi-key operations over any engine
//! - [`Chain`]: ordered tiers with read-through promotion
//! - [`LoadingCache`]: fills itself from a loader, optionally remembering failures
//!
//! The contract these implement lives in `tiercache-core` and is re-exported
//! here for convenience.

pub mod batch;
pub mod chain;
pub mod config;
pub mod file;
pub mod loader;
pub mod lru;

pub use batch::Batched;
pub use chain::{Chain, ChainBuilder, TtlTransform};
pub use config::{
    FileCacheConfig, LoaderConfig, LruConfig, DEFAULT_GC_INTERVAL, DEFAULT_LOAD_CAPACITY,
    DEFAULT_LOAD_TTL,
};
pub use file::{FileCache, SweepStats};
pub use loader::LoadingCache;
pub use lru::LruCache;
pub use tiercache_core::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Build an LRU engine wrapped for batch operations
pub fn new_lru_cache<K, V>(config: LruConfig) -> Result<Batched<K, V>>
where
    K: CacheKey,
    V: CacheValue,
{
    let engine = LruCache::new(config)?;
    Ok(Batched::new(Arc::new(engine)))
}

/// Build a file engine with the default codec, wrapped for batch operations
pub fn new_file_cache<K, V>(config: FileCacheConfig) -> Result<Batched<K, V>>
where
    K: CacheKey,
    V: CacheValue + Serialize + DeserializeOwned,
{
    let engine = FileCache::new(config)?;
    Ok(Batched::new(Arc::new(engine)))
}
