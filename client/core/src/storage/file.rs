//! File-backed key-value store
//!
//! Keeps all keys in one JSON object at `$XDG_DATA_HOME/bjorn/storage.json`
//! (or a caller-supplied path). The file is read once when the store opens
//! and rewritten after each change. A missing or corrupt file opens as empty.
//!
//! A change is written to disk first and only then applied in memory, so a
//! failed write leaves the store as it was.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{KeyValueStore, StorageError};

/// Default location of the storage file
#[must_use]
pub fn default_storage_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("bjorn").join("storage.json"))
}

/// Store persisted as a JSON object
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Held across the write so changes reach the file in order
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path).await;
        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened storage file");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

async fn load_entries(path: &Path) -> BTreeMap<String, String> {
    let Ok(content) = tokio::fs::read_to_string(path).await else {
        return BTreeMap::new();
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Storage file is corrupt, starting empty");
            BTreeMap::new()
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());

        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);

        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}
