//! Persistent cache storing one file per key
//!
//! Entries live under a hashed directory tree (see [`paths`]). Every file
//! starts with two header lines followed by the codec-encoded value (see
//! [`record`]). Writes go through a temporary file and a rename, expiry is
//! enforced lazily on read, and `get`/`set`/`has` opportunistically schedule
//! a background sweep (see [`gc`]).

mod atomic;
pub mod gc;
pub mod paths;
pub mod record;

pub use gc::SweepStats;

use crate::config::FileCacheConfig;
use async_trait::async_trait;
use chrono::Utc;
use gc::GcState;
use record::{decode_header, Header, MAX_HEADER_LEN};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Display};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tiercache_core::{
    BincodeCodec, Cache, CacheError, CacheKey, CacheValue, Codec, DeleteResult, GetResult,
    HasResult, Reset, Result, SetResult,
};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};
use walkdir::WalkDir;

/// File-per-key cache engine
pub struct FileCache<V> {
    config: FileCacheConfig,
    codec: Arc<dyn Codec<V>>,
    gc: Arc<GcState>,
}

impl<V> FileCache<V>
where
    V: CacheValue + Serialize + DeserializeOwned,
{
    /// Create an engine using the default binary codec
    pub fn new(config: FileCacheConfig) -> Result<Self> {
        Self::with_codec(config, Arc::new(BincodeCodec))
    }
}

impl<V: CacheValue> FileCache<V> {
    pub fn with_codec(config: FileCacheConfig, codec: Arc<dyn Codec<V>>) -> Result<Self> {
        config.validate()?;
        let gc = Arc::new(GcState::new(config.gc_interval));
        Ok(Self { config, codec, gc })
    }

    pub fn config(&self) -> &FileCacheConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Path of the file that stores `key`
    pub fn path_for(&self, key: &impl Display) -> PathBuf {
        paths::entry_path(&self.config.dir, &key.to_string())
    }

    /// Run one GC sweep now
    ///
    /// Returns `None` when a sweep is already in progress on this instance.
    pub async fn sweep(&self) -> Result<Option<SweepStats>> {
        let gc = Arc::clone(&self.gc);
        let root = self.config.dir.clone();
        let sweep_entries = self.config.sweep_entries;
        tokio::task::spawn_blocking(move || gc::run_sweep(&gc, &root, sweep_entries))
            .await
            .map_err(|e| CacheError::file_system(self.dir(), "sweep", io::Error::other(e)))?
    }

    /// Schedule a background sweep if the GC interval has elapsed
    fn maybe_schedule_gc(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        if !self.gc.try_claim(record::unix_nanos(Utc::now())) {
            return;
        }

        let gc = Arc::clone(&self.gc);
        let root = self.config.dir.clone();
        let sweep_entries = self.config.sweep_entries;
        debug!(dir = %root.display(), "scheduling background gc sweep");
        handle.spawn_blocking(move || {
            if let Err(e) = gc::run_sweep(&gc, &root, sweep_entries) {
                error!(dir = %root.display(), "background gc failed: {}", e);
            }
        });
    }

    async fn remove_expired(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => trace!(path = %path.display(), "removed expired entry"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "failed to remove expired entry: {}", e),
        }
    }
}

impl<V> fmt::Debug for FileCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let file = fs::File::open(path).await?;
    let mut head = Vec::with_capacity(MAX_HEADER_LEN);
    file.take(MAX_HEADER_LEN as u64)
        .read_to_end(&mut head)
        .await?;
    Ok(head)
}

#[async_trait]
impl<K: CacheKey, V: CacheValue> Cache<K, V> for FileCache<V> {
    async fn get(&self, key: &K) -> GetResult<V> {
        self.maybe_schedule_gc();
        let path = self.path_for(key);

        let mut bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(%key, "file cache miss");
                return GetResult::not_exists();
            }
            Err(e) => return GetResult::from_error(CacheError::file_system(&path, "read", e)),
        };

        let (header, offset) = match decode_header(&bytes) {
            Ok(parsed) => parsed,
            Err(e) => return GetResult::from_error(CacheError::corruption(&path, e.to_string())),
        };
        if header.is_expired(Utc::now()) {
            self.remove_expired(&path).await;
            return GetResult::not_exists();
        }

        trace!(%key, "file cache hit");
        let payload = bytes.split_off(offset);
        GetResult::encoded(payload, Arc::clone(&self.codec))
    }

    async fn set(&self, key: &K, value: &V, ttl: Duration) -> SetResult {
        self.maybe_schedule_gc();
        let path = self.path_for(key);

        let payload = match self.codec.encode(value) {
            Ok(payload) => payload,
            Err(e) => return SetResult::from_error(e),
        };
        let header = Header::new(Utc::now(), ttl).encode();

        atomic::write_atomic(&path, &[header.as_slice(), payload.as_slice()])
            .await
            .into()
    }

    async fn has(&self, key: &K) -> HasResult {
        self.maybe_schedule_gc();
        let path = self.path_for(key);

        let head = match read_head(&path).await {
            Ok(head) => head,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return HasResult::not_exists(),
            Err(e) => return HasResult::from_error(CacheError::file_system(&path, "read", e)),
        };
        match decode_header(&head) {
            Ok((header, _)) if header.is_expired(Utc::now()) => HasResult::not_exists(),
            Ok(_) => HasResult::found(),
            Err(e) => HasResult::from_error(CacheError::corruption(&path, e.to_string())),
        }
    }

    async fn delete(&self, key: &K) -> DeleteResult {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => DeleteResult::deleted(1),
            Err(e) if e.kind() == io::ErrorKind::NotFound => DeleteResult::deleted(0),
            Err(e) => DeleteResult::from_error(CacheError::file_system(&path, "remove", e)),
        }
    }

    fn as_reset(&self) -> Option<&dyn Reset> {
        Some(self)
    }
}

#[async_trait]
impl<V: CacheValue> Reset for FileCache<V> {
    /// Remove every entry file, leaving directories and foreign files alone
    async fn reset(&self) -> Result<()> {
        let root = self.config.dir.clone();
        let removed = tokio::task::spawn_blocking(move || remove_entry_files(&root))
            .await
            .map_err(|e| CacheError::file_system(self.dir(), "reset", io::Error::other(e)))?;
        debug!(dir = %self.dir().display(), removed, "file cache reset");
        Ok(())
    }
}

fn remove_entry_files(root: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("reset skipped unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !paths::is_entry_file(entry.path()) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %entry.path().display(), "failed to remove entry file: {}", e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;
    use tiercache_core::{CacheExt, FnCodec, JsonCodec};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u64,
    }

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache<V>(dir: &TempDir) -> FileCache<V>
    where
        V: CacheValue + Serialize + DeserializeOwned,
    {
        FileCache::new(FileCacheConfig::new(dir.path())).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get_struct() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache::<Profile>(&temp_dir);
        let profile = Profile {
            name: "ada".to_string(),
            visits: 3,
        };

        assert!(cache.set(&"user:1", &profile, HOUR).await.is_ok());
        assert_eq!(cache.get_value(&"user:1").await.unwrap(), Some(profile));
        assert!(cache.path_for(&"user:1").exists());
    }

    #[tokio::test]
    async fn test_file_starts_with_headers() {
        let temp_dir = TempDir::new().unwrap();
        let cache: FileCache<Vec<u32>> =
            FileCache::with_codec(FileCacheConfig::new(temp_dir.path()), Arc::new(JsonCodec))
                .unwrap();
        cache.set(&42, &vec![1, 2], HOUR).await;

        let content = std::fs::read_to_string(cache.path_for(&42)).unwrap();
        let lines: Vec<_> = content.splitn(3, '\n').collect();
        assert!(lines[0].starts_with("etime="));
        assert!(lines[1].starts_with("ctime="));
        assert_eq!(lines[2], "[1,2]");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache::<String>(&temp_dir);

        let result = cache.get(&"nope").await;
        assert!(result.is_not_exists());
        assert!(result.err().is_none());
        assert!(!cache.has(&"nope").await.has());
        assert_eq!(cache.delete(&"nope").await.count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported_and_kept() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache::<String>(&temp_dir);
        let path = cache.path_for(&"k");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "1700000000\nlegacy").unwrap();

        let result = cache.get(&"k").await;
        assert!(matches!(result.err(), Some(CacheError::Corruption { .. })));
        assert!(matches!(
            cache.has(&"k").await.err(),
            Some(CacheError::Corruption { .. })
        ));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_encode_failure_leaves_previous_value() {
        let temp_dir = TempDir::new().unwrap();
        let codec = FnCodec::new(
            |v: &String| {
                if v.is_empty() {
                    Err(CacheError::encode_message("empty value"))
                } else {
                    Ok(v.clone().into_bytes())
                }
            },
            |b: &[u8]| String::from_utf8(b.to_vec()).map_err(CacheError::decode),
        );
        let cache = FileCache::with_codec(FileCacheConfig::new(temp_dir.path()), Arc::new(codec))
            .unwrap();

        cache.set(&"k", &"first".to_string(), HOUR).await;
        let failed = cache.set(&"k", &String::new(), HOUR).await;
        assert!(matches!(failed.err(), Some(CacheError::Encode { .. })));
        assert_eq!(cache.get_value(&"k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_reset_of_missing_dir_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileCacheConfig::new(temp_dir.path().join("never-created"));
        let cache: FileCache<u64> = FileCache::new(config).unwrap();

        assert!(Reset::reset(&cache).await.is_ok());
        assert_eq!(remove_entry_files(cache.dir()), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache::<u64>(&temp_dir);
        cache.set(&7, &49, HOUR).await;

        assert_eq!(cache.remove(&7).await.unwrap(), 1);
        assert!(!cache.path_for(&7).exists());
        assert_eq!(cache.remove(&7).await.unwrap(), 0);
    }
}
