//! Engine configuration with validation
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tiercache_core::{CacheError, Result};

/// Default interval between two background GC sweeps of a file cache
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for the in-memory LRU engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruConfig {
    /// Maximum number of live entries
    pub capacity: usize,
    /// Remove an entry when `has` finds it
    ///
    /// Off by default: a presence check normally leaves the entry alone.
    #[serde(default)]
    pub consume_on_has: bool,
}

impl LruConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            consume_on_has: false,
        }
    }

    #[must_use]
    pub fn with_consume_on_has(mut self, consume: bool) -> Self {
        self.consume_on_has = consume;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::configuration(
                "LRU capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for the on-disk file engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCacheConfig {
    /// Root directory of the cache tree
    pub dir: PathBuf,
    /// Minimum time between two background sweeps
    #[serde(default = "default_gc_interval", with = "duration_as_secs")]
    pub gc_interval: Duration,
    /// Let the sweep also reclaim expired entry files
    #[serde(default)]
    pub sweep_entries: bool,
}

fn default_gc_interval() -> Duration {
    DEFAULT_GC_INTERVAL
}

impl FileCacheConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            gc_interval: DEFAULT_GC_INTERVAL,
            sweep_entries: false,
        }
    }

    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    #[must_use]
    pub fn with_sweep_entries(mut self, sweep: bool) -> Self {
        self.sweep_entries = sweep;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(CacheError::configuration(
                "file cache directory must not be empty",
            ));
        }
        if self.gc_interval.is_zero() {
            return Err(CacheError::configuration(
                "file cache GC interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Default lifetime of a loaded value
pub const DEFAULT_LOAD_TTL: Duration = Duration::from_secs(60);

/// Default number of keys a loading cache holds
pub const DEFAULT_LOAD_CAPACITY: usize = 100_000;

/// Configuration for the load-through cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Lifetime of a successfully loaded value
    #[serde(default = "default_load_ttl", with = "duration_as_secs")]
    pub ttl: Duration,
    /// Lifetime of a remembered load failure; zero disables failure caching
    #[serde(default, with = "duration_as_secs")]
    pub fail_ttl: Duration,
    /// Maximum number of remembered keys
    #[serde(default = "default_load_capacity")]
    pub capacity: usize,
}

fn default_load_ttl() -> Duration {
    DEFAULT_LOAD_TTL
}

fn default_load_capacity() -> usize {
    DEFAULT_LOAD_CAPACITY
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_LOAD_TTL,
            fail_ttl: Duration::ZERO,
            capacity: DEFAULT_LOAD_CAPACITY,
        }
    }
}

impl LoaderConfig {
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_fail_ttl(mut self, fail_ttl: Duration) -> Self {
        self.fail_ttl = fail_ttl;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::configuration(
                "loading cache capacity must be at least 1",
            ));
        }
        if self.ttl.is_zero() {
            return Err(CacheError::configuration(
                "loading cache TTL must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole seconds
mod duration_as_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
