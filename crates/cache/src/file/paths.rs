//! Key to path derivation for the file engine

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Extension marking entry files; anything else in the tree is foreign
pub const CACHE_FILE_EXT: &str = "cache";

const SEGMENT_WIDTH: usize = 3;
const SEGMENT_COUNT: usize = 5;

/// Hex-encoded SHA-256 of a key's string form
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Path of the entry file for `key` under `root`
///
/// The hash is split into five 3-character directory levels with the rest of
/// the hash as the file name, which bounds the fan-out of any one directory.
pub fn entry_path(root: &Path, key: &str) -> PathBuf {
    let hash = hash_key(key);
    let mut path = root.to_path_buf();
    for segment in 0..SEGMENT_COUNT {
        let start = segment * SEGMENT_WIDTH;
        path.push(&hash[start..start + SEGMENT_WIDTH]);
    }
    path.push(&hash[SEGMENT_COUNT * SEGMENT_WIDTH..]);
    path.set_extension(CACHE_FILE_EXT);
    path
}

/// Whether `path` names an entry file
pub fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == CACHE_FILE_EXT)
}
