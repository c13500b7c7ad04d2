//! Awaiting-Response Placeholder
//!
//! Reconciles freshly fetched transcripts with the "assistant is still
//! working" state. While a reply is outstanding the transcript ends with a
//! single synthetic placeholder entry; as soon as a genuine assistant message
//! with a new id shows up, the placeholder goes away and the awaiting flag
//! clears.

use crate::messages::{ChatEntry, MessageId};

/// Tracks whether a reply is outstanding and which assistant message was
/// last seen
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AwaitingTracker {
    awaiting: bool,
    last_assistant_id: Option<MessageId>,
}

impl AwaitingTracker {
    /// Create an idle tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reply is outstanding
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// Id of the last genuine assistant message seen
    #[must_use]
    pub fn last_assistant_id(&self) -> Option<&MessageId> {
        self.last_assistant_id.as_ref()
    }

    /// Record the comparison baseline for the next await cycle
    pub fn set_baseline(&mut self, id: Option<MessageId>) {
        self.last_assistant_id = id;
    }

    /// Enter the awaiting state
    pub fn begin(&mut self) {
        self.awaiting = true;
    }

    /// Leave the awaiting state without touching the baseline
    pub fn clear(&mut self) {
        self.awaiting = false;
    }

    /// Forget everything (new conversation)
    pub fn reset(&mut self) {
        self.awaiting = false;
        self.last_assistant_id = None;
    }

    /// Note an assistant reply delivered outside a fetch (synchronous reply)
    pub fn observe_reply(&mut self, id: Option<MessageId>) {
        self.awaiting = false;
        if id.is_some() {
            self.last_assistant_id = id;
        }
    }

    /// Strip stale placeholders and append a fresh one if still awaiting
    ///
    /// Clears the awaiting flag when `entries` contains an assistant message
    /// whose id differs from the recorded one. The returned list holds at
    /// most one placeholder, always last.
    pub fn apply_awaiting_placeholder(&mut self, entries: Vec<ChatEntry>) -> Vec<ChatEntry> {
        let latest = latest_assistant_id(&entries);
        let mut stripped = strip_placeholders(entries);

        if !self.awaiting {
            if latest.is_some() {
                self.last_assistant_id = latest;
            }
            return stripped;
        }

        let has_new_assistant = latest.is_some() && latest != self.last_assistant_id;
        if has_new_assistant {
            tracing::debug!(id = ?latest, "Assistant reply arrived");
            self.awaiting = false;
            self.last_assistant_id = latest;
            return stripped;
        }

        if latest.is_some() {
            self.last_assistant_id = latest;
        }
        stripped.push(ChatEntry::placeholder());
        stripped
    }
}

/// Id of the last genuine assistant entry
///
/// `None` when there is no assistant entry or the last one has no id.
#[must_use]
pub fn latest_assistant_id(entries: &[ChatEntry]) -> Option<MessageId> {
    entries
        .iter()
        .rev()
        .find(|e| e.is_assistant_reply())
        .and_then(|e| e.id.clone())
}

/// Drop every placeholder entry
#[must_use]
pub fn strip_placeholders(mut entries: Vec<ChatEntry>) -> Vec<ChatEntry> {
    entries.retain(|e| !e.is_placeholder());
    entries
}
