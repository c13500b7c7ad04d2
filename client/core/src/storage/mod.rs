//! Persistence Adapter
//!
//! Small string key-value storage that outlives a session. The session
//! controller uses it to remember the active conversation and a bounded list
//! of previous ones.
//!
//! # Available Stores
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral sessions
//! - [`FileStore`]: a JSON object on disk, rewritten on every change

mod conversations;
mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use conversations::{
    ConversationStore, ACTIVE_CONVERSATION_KEY, DEFAULT_MAX_PREVIOUS_CONVERSATIONS,
    PREVIOUS_CONVERSATIONS_KEY,
};
pub use file::{default_storage_path, FileStore};
pub use memory::MemoryStore;

/// Errors from a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to write the backing file
    #[error("Failed to write storage file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode stored data
    #[error("Failed to encode storage data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key-value storage
///
/// Reads never fail: unreadable data is reported as absent. Writes either
/// reach the backing medium or leave the stored value unchanged.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be persisted.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; deleting a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the change could not be persisted.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Option<String> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}
