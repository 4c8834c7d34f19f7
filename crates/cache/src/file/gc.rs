//! Opportunistic background reclamation of expired files
//!
//! Request paths call [`GcState::try_claim`]; the winner of the CAS on the
//! last-run timestamp schedules a sweep. The sweep itself is guarded by a
//! second flag so at most one walk of the tree runs per engine instance.

use super::paths::is_entry_file;
use super::record::{decode_header, unix_nanos, MAX_HEADER_LEN};
use chrono::Utc;
use std::fs::File;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, SystemTime};
use tiercache_core::{CacheError, Result};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Regular files visited
    pub scanned: usize,
    /// Files removed
    pub removed: usize,
}

/// Per-instance GC bookkeeping
#[derive(Debug)]
pub(crate) struct GcState {
    /// Unix nanoseconds of the last claimed run; zero until the first claim
    last_run: AtomicI64,
    running: AtomicBool,
    interval: Duration,
}

/// Holds the running flag; clears it on drop
pub(crate) struct SweepGuard<'a> {
    state: &'a GcState,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
    }
}

impl GcState {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            last_run: AtomicI64::new(0),
            running: AtomicBool::new(false),
            interval,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Claim the right to schedule a sweep at `now_nanos`
    ///
    /// Fails when the interval has not elapsed or another caller won the
    /// compare-and-swap for the same window.
    pub(crate) fn try_claim(&self, now_nanos: i64) -> bool {
        let last = self.last_run.load(Ordering::Acquire);
        let interval = i64::try_from(self.interval.as_nanos()).unwrap_or(i64::MAX);
        if now_nanos.saturating_sub(last) < interval {
            return false;
        }
        self.last_run
            .compare_exchange(last, now_nanos, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Enter the running state, or `None` if a sweep is already in progress
    pub(crate) fn begin_sweep(&self) -> Option<SweepGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepGuard { state: self })
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Run one sweep of `root` unless one is already running
///
/// Blocking; call it from a blocking-capable thread. A panic inside the walk
/// is caught and returned as an error.
pub(crate) fn run_sweep(
    state: &GcState,
    root: &Path,
    sweep_entries: bool,
) -> Result<Option<SweepStats>> {
    let Some(_guard) = state.begin_sweep() else {
        debug!(dir = %root.display(), "gc sweep already running");
        return Ok(None);
    };

    match panic::catch_unwind(AssertUnwindSafe(|| {
        sweep_dir(root, state.interval(), sweep_entries)
    })) {
        Ok(stats) => {
            debug!(
                dir = %root.display(),
                scanned = stats.scanned,
                removed = stats.removed,
                "gc sweep finished"
            );
            Ok(Some(stats))
        }
        Err(payload) => {
            let err = CacheError::panicked(&root.display(), payload);
            error!("gc sweep panicked: {}", err);
            Err(err)
        }
    }
}

fn sweep_dir(root: &Path, interval: Duration, sweep_entries: bool) -> SweepStats {
    let now = unix_nanos(Utc::now());
    let mut stats = SweepStats::default();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("gc skipped unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        stats.scanned += 1;

        let path = entry.path();
        let is_entry = is_entry_file(path);
        if is_entry && !sweep_entries {
            continue;
        }

        if should_remove(path, now, interval, is_entry) && remove_file(path) {
            stats.removed += 1;
        }
    }

    stats
}

/// Expired entry records go at once; foreign files go only once they are stale
///
/// A foreign file younger than one interval may be a temporary file that a
/// writer has not renamed yet, so it is left alone whatever its header says.
/// Past that age it goes when its header is expired or does not parse.
/// Unparseable entry files are kept so that reads keep reporting corruption.
fn should_remove(path: &Path, now_nanos: i64, interval: Duration, is_entry: bool) -> bool {
    if !is_entry && !is_stale(path, interval) {
        return false;
    }
    let head = match read_head(path) {
        Ok(head) => head,
        Err(e) => {
            debug!(path = %path.display(), "gc could not read file: {}", e);
            return false;
        }
    };
    match decode_header(&head) {
        Ok((header, _)) => now_nanos > header.expire_at_nanos,
        Err(_) => !is_entry,
    }
}

fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(MAX_HEADER_LEN);
    File::open(path)?
        .take(MAX_HEADER_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}

fn is_stale(path: &Path, interval: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > interval)
}

fn remove_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), "gc failed to remove file: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::record::Header;
    use tempfile::TempDir;

    fn write(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn record(expire_at_nanos: i64) -> Vec<u8> {
        let mut bytes = Header {
            expire_at_nanos,
            created_at_secs: 0,
        }
        .encode();
        bytes.extend_from_slice(b"payload");
        bytes
    }

    #[test]
    fn test_claim_requires_elapsed_interval() {
        let state = GcState::new(Duration::from_secs(10));
        let start = 1_000_000_000_000;
        assert!(state.try_claim(start));
        assert!(!state.try_claim(start + 1));
        assert!(!state.try_claim(start + 9_999_999_999));
        assert!(state.try_claim(start + 10_000_000_000));
    }

    #[test]
    fn test_only_one_sweep_runs() {
        let state = GcState::new(Duration::from_secs(10));
        let guard = state.begin_sweep();
        assert!(guard.is_some());
        assert!(state.is_running());
        assert!(state.begin_sweep().is_none());

        let temp_dir = TempDir::new().unwrap();
        assert_eq!(run_sweep(&state, temp_dir.path(), false).unwrap(), None);

        drop(guard);
        assert!(!state.is_running());
        assert!(run_sweep(&state, temp_dir.path(), false).unwrap().is_some());
    }

    fn backdate(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_sweep_removes_stale_expired_foreign_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let expired_foreign = root.join("abc").join("orphan.tmp");
        let live_foreign = root.join("abc").join("kept.tmp");
        let expired_entry = root.join("abc").join("entry.cache");
        let garbage = root.join("notes.txt");
        write(&expired_foreign, &record(1));
        write(&live_foreign, &record(i64::MAX));
        write(&expired_entry, &record(1));
        write(&garbage, b"hello");
        let hour = Duration::from_secs(3600);
        backdate(&expired_foreign, hour);
        backdate(&live_foreign, hour);
        backdate(&expired_entry, hour);

        let state = GcState::new(Duration::from_secs(300));
        let stats = run_sweep(&state, root, false).unwrap().unwrap();

        assert_eq!(stats.scanned, 4);
        assert_eq!(stats.removed, 1);
        assert!(!expired_foreign.exists());
        assert!(live_foreign.exists());
        assert!(expired_entry.exists());
        // Recently modified, so not yet considered abandoned
        assert!(garbage.exists());
    }

    #[test]
    fn test_fresh_temp_file_survives_even_when_expired() {
        let temp_dir = TempDir::new().unwrap();
        let in_flight = temp_dir
            .path()
            .join("abc")
            .join("entry.cache.0b5e7f5c.tmp");
        write(&in_flight, &record(1));

        let state = GcState::new(Duration::from_secs(300));
        let stats = run_sweep(&state, temp_dir.path(), false).unwrap().unwrap();

        assert_eq!(stats.removed, 0);
        assert!(in_flight.exists());
    }

    #[test]
    fn test_stale_unparseable_foreign_file_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let leftover = temp_dir.path().join("abc").join("entry.cache.1234.tmp");
        write(&leftover, b"etime=12");

        std::thread::sleep(Duration::from_millis(30));
        let state = GcState::new(Duration::from_millis(5));
        let stats = run_sweep(&state, temp_dir.path(), false).unwrap().unwrap();

        assert_eq!(stats.removed, 1);
        assert!(!leftover.exists());
    }

    #[test]
    fn test_sweep_entries_opt_in() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let expired_entry = root.join("a").join("old.cache");
        let live_entry = root.join("a").join("new.cache");
        let corrupt_entry = root.join("a").join("bad.cache");
        write(&expired_entry, &record(1));
        write(&live_entry, &record(i64::MAX));
        write(&corrupt_entry, b"garbage");

        let state = GcState::new(Duration::from_secs(300));
        let stats = run_sweep(&state, root, true).unwrap().unwrap();

        assert_eq!(stats.removed, 1);
        assert!(!expired_entry.exists());
        assert!(live_entry.exists());
        assert!(corrupt_entry.exists());
    }

    #[test]
    fn test_sweep_of_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let state = GcState::new(Duration::from_secs(1));
        let stats = run_sweep(&state, &temp_dir.path().join("absent"), false)
            .unwrap()
            .unwrap();
        assert_eq!(stats, SweepStats::default());
    }
}
