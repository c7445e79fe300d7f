//! Artifact stores.

use crate::album::Artifact;
use crate::error::{AotwError, Result};
use crate::services::lock::{self, LockConfig};
use crate::services::traits::{ArtifactStore, PeriodGuard};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One JSON file per period: `<dir>/aotw_{n}.json`, lock at `aotw_{n}.lock`.
pub struct FileArtifactStore {
    dir: PathBuf,
    lock_config: LockConfig,
}

impl FileArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock_config: LockConfig::default(),
        }
    }

    /// Override lock wait and staleness timing.
    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.lock_config = config;
        self
    }

    pub fn artifact_path(&self, period_number: u32) -> PathBuf {
        self.dir.join(format!("aotw_{period_number}.json"))
    }

    fn lock_path(&self, period_number: u32) -> PathBuf {
        self.dir.join(format!("aotw_{period_number}.lock"))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn get(&self, period_number: u32) -> Result<Option<Artifact>> {
        let path = self.artifact_path(period_number);
        let artifact = lock::read_json::<Artifact>(&path)?;
        if artifact.is_none() {
            debug!("no artifact at {}", path.display());
        }
        Ok(artifact)
    }

    async fn put(&self, period_number: u32, artifact: &Artifact) -> Result<()> {
        check_key(period_number, artifact)?;
        lock::write_json_atomic(&self.artifact_path(period_number), artifact)
    }

    async fn lock(&self, period_number: u32) -> Result<PeriodGuard> {
        let lock_path = self.lock_path(period_number);
        if !lock::acquire_lock_file(&lock_path, self.lock_config).await? {
            return Err(AotwError::Busy(period_number));
        }
        Ok(PeriodGuard::new(period_number, move || {
            lock::release_lock_file(&lock_path)
        }))
    }
}

fn check_key(period_number: u32, artifact: &Artifact) -> Result<()> {
    if artifact.period_number != period_number {
        return Err(AotwError::Storage(format!(
            "artifact for period {} cannot be stored under period {period_number}",
            artifact.period_number
        )));
    }
    Ok(())
}

/// In-process store; locks are exclusive per store instance.
#[derive(Clone, Default)]
pub struct MemoryArtifactStore {
    artifacts: Arc<Mutex<HashMap<u32, Artifact>>>,
    locked: Arc<Mutex<HashSet<u32>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> AotwError {
    AotwError::Storage("memory store lock poisoned".to_owned())
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, period_number: u32) -> Result<Option<Artifact>> {
        let map = self.artifacts.lock().map_err(poisoned)?;
        Ok(map.get(&period_number).cloned())
    }

    async fn put(&self, period_number: u32, artifact: &Artifact) -> Result<()> {
        check_key(period_number, artifact)?;
        let mut map = self.artifacts.lock().map_err(poisoned)?;
        map.insert(period_number, artifact.clone());
        Ok(())
    }

    async fn lock(&self, period_number: u32) -> Result<PeriodGuard> {
        let mut locked = self.locked.lock().map_err(poisoned)?;
        if !locked.insert(period_number) {
            return Err(AotwError::Busy(period_number));
        }
        let held = Arc::clone(&self.locked);
        Ok(PeriodGuard::new(period_number, move || {
            if let Ok(mut set) = held.lock() {
                set.remove(&period_number);
            }
        }))
    }
}
