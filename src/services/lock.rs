//! File-backed exclusive locks and atomic JSON writes.

use crate::error::{AotwError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

/// Lock acquisition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// How long to wait for a held lock before giving up.
    pub wait: Duration,
    /// Age after which a lock file is treated as abandoned.
    pub stale_after: Duration,
    /// Poll interval while waiting.
    pub poll: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(5),
            stale_after: Duration::from_secs(15 * 60),
            poll: Duration::from_millis(25),
        }
    }
}

/// Create `lock_path` exclusively, waiting up to `config.wait`.
///
/// Returns `Ok(false)` on timeout. The caller removes the file to release.
pub async fn acquire_lock_file(lock_path: &Path, config: LockConfig) -> Result<bool> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AotwError::Storage(format!("failed to create lock directory: {e}"))
        })?;
    }

    let started = Instant::now();
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(mut file) => {
                let stamp = format!("{}:{}", std::process::id(), now_epoch_millis());
                let _ = file.write_all(stamp.as_bytes());
                return Ok(true);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                evict_stale_lock(lock_path, config.stale_after);
                if started.elapsed() > config.wait {
                    return Ok(false);
                }
                tokio::time::sleep(config.poll).await;
            }
            Err(e) => {
                return Err(AotwError::Storage(format!(
                    "failed to create lock {}: {e}",
                    lock_path.display()
                )));
            }
        }
    }
}

/// Remove a lock file, ignoring a missing file.
pub fn release_lock_file(lock_path: &Path) {
    if let Err(e) = std::fs::remove_file(lock_path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("failed to release lock {}: {e}", lock_path.display());
    }
}

fn evict_stale_lock(lock_path: &Path, stale_after: Duration) {
    let Ok(metadata) = std::fs::metadata(lock_path) else {
        return;
    };
    let Ok(modified) = metadata.modified() else {
        return;
    };
    let Ok(age) = SystemTime::now().duration_since(modified) else {
        return;
    };

    if age > stale_after {
        tracing::warn!(
            "evicting stale lock {} (age {}s)",
            lock_path.display(),
            age.as_secs()
        );
        let _ = std::fs::remove_file(lock_path);
    }
}

/// Read a JSON document, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AotwError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| AotwError::Storage(format!("failed to parse {}: {e}", path.display())))
}

/// Write a JSON document via a temp file and rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AotwError::Storage(format!("failed to create directory: {e}")))?;
    }

    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| AotwError::Storage(format!("failed to serialize record: {e}")))?;
    std::fs::write(&tmp_path, json)
        .map_err(|e| AotwError::Storage(format!("failed to write temp file: {e}")))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| AotwError::Storage(format!("failed to finalize {}: {e}", path.display())))?;
    Ok(())
}

/// Current epoch time in milliseconds.
#[must_use]
pub fn now_epoch_millis() -> u64 {
    match SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
