//! Snapshot storage, one record per tournament name.

use crate::state::snapshot::TournamentSnapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is corrupt: {0}")]
    Corrupt(String),

    #[error("Serialization failed: {0}")]
    Serialize(String),
}

/// Trait that all snapshot stores must implement
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the snapshot for `name`, `None` if never saved
    async fn load(&self, name: &str) -> StoreResult<Option<TournamentSnapshot>>;

    /// Replace the snapshot for its tournament
    async fn save(&self, snapshot: &TournamentSnapshot) -> StoreResult<()>;

    /// Remove the snapshot for `name` (no-op if absent)
    async fn delete(&self, name: &str) -> StoreResult<()>;
}

/// In-memory store, keeps serialized JSON like the file store does
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the raw record, for simulating corruption
    pub async fn put_raw(&self, name: &str, raw: impl Into<String>) {
        self.records
            .write()
            .await
            .insert(name.to_string(), raw.into());
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.records.read().await.contains_key(name)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, name: &str) -> StoreResult<Option<TournamentSnapshot>> {
        match self.records.read().await.get(name) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &TournamentSnapshot) -> StoreResult<()> {
        let raw =
            serde_json::to_string(snapshot).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.records
            .write()
            .await
            .insert(snapshot.tournament.clone(), raw);
        Ok(())
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.records.write().await.remove(name);
        Ok(())
    }
}

/// One `<name>.json` file per tournament under a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    dir: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self, name: &str) -> StoreResult<Option<TournamentSnapshot>> {
        let raw = match tokio::fs::read_to_string(self.path_for(name)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn save(&self, snapshot: &TournamentSnapshot) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write then rename so a crash never leaves half a snapshot
        let path = self.path_for(&snapshot.tournament);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
