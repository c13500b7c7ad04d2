//! Typed access to the conversation keys
//!
//! Two keys are kept:
//! - `active-conversation-id`: the conversation to recover on start
//! - `previous-conversation-ids`: JSON array of earlier ids, most recent
//!   first, without duplicates, capped in length

use super::{KeyValueStore, StorageError};
use crate::messages::ConversationId;

/// Key of the active conversation id
pub const ACTIVE_CONVERSATION_KEY: &str = "active-conversation-id";

/// Key of the previous conversation id list
pub const PREVIOUS_CONVERSATIONS_KEY: &str = "previous-conversation-ids";

/// Default cap of the previous conversation list
pub const DEFAULT_MAX_PREVIOUS_CONVERSATIONS: usize = 10;

/// Conversation bookkeeping on top of a [`KeyValueStore`]
#[derive(Debug)]
pub struct ConversationStore<S: KeyValueStore> {
    store: S,
    max_previous: usize,
}

impl<S: KeyValueStore> ConversationStore<S> {
    /// Wrap a store, keeping up to `max_previous` previous ids
    pub fn new(store: S, max_previous: usize) -> Self {
        Self {
            store,
            max_previous,
        }
    }

    /// The underlying store
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Stored active conversation, if any
    pub async fn active(&self) -> Option<ConversationId> {
        self.store
            .get(ACTIVE_CONVERSATION_KEY)
            .await
            .filter(|id| !id.trim().is_empty())
            .map(ConversationId::new)
    }

    /// Remember the active conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the store could not persist the value.
    pub async fn set_active(&self, id: &ConversationId) -> Result<(), StorageError> {
        self.store.set(ACTIVE_CONVERSATION_KEY, id.as_str()).await
    }

    /// Forget the active conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the store could not persist the change.
    pub async fn clear_active(&self) -> Result<(), StorageError> {
        self.store.remove(ACTIVE_CONVERSATION_KEY).await
    }

    /// Previous conversation ids, most recent first
    ///
    /// Malformed data is discarded and reset.
    pub async fn previous(&self) -> Vec<ConversationId> {
        let Some(raw) = self.store.get(PREVIOUS_CONVERSATIONS_KEY).await else {
            return Vec::new();
        };

        match parse_previous(&raw) {
            Some(ids) => ids,
            None => {
                tracing::warn!("Discarding malformed previous conversation list");
                if let Err(e) = self.store.remove(PREVIOUS_CONVERSATIONS_KEY).await {
                    tracing::warn!(error = %e, "Failed to reset previous conversation list");
                }
                Vec::new()
            }
        }
    }

    /// Put `id` at the front of the previous list
    ///
    /// Duplicates are removed and the list is capped.
    ///
    /// # Errors
    ///
    /// Returns an error if the list could not be persisted.
    pub async fn remember_previous(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<ConversationId>, StorageError> {
        let mut ids = self.previous().await;
        ids.retain(|existing| existing != id);
        ids.insert(0, id.clone());
        ids.truncate(self.max_previous);

        let strings: Vec<&str> = ids.iter().map(ConversationId::as_str).collect();
        let json = serde_json::to_string(&strings)?;
        self.store.set(PREVIOUS_CONVERSATIONS_KEY, &json).await?;
        Ok(ids)
    }
}

/// Parse the stored list, coercing every element to a string
///
/// Returns `None` when the value is not a JSON array of strings or numbers.
fn parse_previous(raw: &str) -> Option<Vec<ConversationId>> {
    let items: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
    let mut ids: Vec<ConversationId> = Vec::with_capacity(items.len());

    for item in items {
        let id = match item {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let id = ConversationId::new(id);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    Some(ids)
}
