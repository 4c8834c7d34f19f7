//! Crash-safe entry writes

use std::path::Path;
use tiercache_core::{CacheError, Result};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Write `parts` to `path` through a temporary file and a rename
///
/// The temporary file sits next to the target so the rename never crosses a
/// file system. Readers see either the previous file or the complete new one;
/// on any failure the temporary file is removed and the target is untouched.
pub async fn write_atomic(path: &Path, parts: &[&[u8]]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        CacheError::configuration(format!("entry path has no parent: {}", path.display()))
    })?;
    let file_name = path.file_name().ok_or_else(|| {
        CacheError::configuration(format!("entry path has no file name: {}", path.display()))
    })?;

    fs::create_dir_all(parent)
        .await
        .map_err(|e| CacheError::file_system(parent, "create parent directory", e))?;

    let temp_path = parent.join(format!(
        "{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4()
    ));

    if let Err(e) = write_temp(&temp_path, parts).await {
        remove_temp(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        remove_temp(&temp_path).await;
        return Err(CacheError::file_system(path, "atomic rename", e));
    }

    Ok(())
}

async fn write_temp(temp_path: &Path, parts: &[&[u8]]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await
        .map_err(|e| CacheError::file_system(temp_path, "create temporary file", e))?;

    for part in parts {
        file.write_all(part)
            .await
            .map_err(|e| CacheError::file_system(temp_path, "write to temporary file", e))?;
    }

    file.flush()
        .await
        .map_err(|e| CacheError::file_system(temp_path, "flush temporary file", e))?;
    file.sync_all()
        .await
        .map_err(|e| CacheError::file_system(temp_path, "sync temporary file", e))?;
    Ok(())
}

async fn remove_temp(temp_path: &Path) {
    match fs::remove_file(temp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp_path.display(), "failed to remove temporary file: {}", e),
    }
}
