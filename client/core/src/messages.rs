//! Session Messages
//!
//! Messages sent from the session controller to the presentation surface, plus
//! the identifier and transcript types they carry.
//!
//! # Design Philosophy
//!
//! The controller owns all conversation state. Surfaces (terminal, web view,
//! test harness) only render what they are told, so every state change is
//! announced as a [`SessionEvent`] over a channel instead of being observed
//! through shared mutable fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Reserved id of the synthetic "assistant is still working" entry
pub const PENDING_ASSISTANT_ID: &str = "pending-assistant";

/// Text shown by the pending placeholder
pub const PENDING_ASSISTANT_TEXT: &str = "Verificando documentação";

// ============================================
// Identifiers
// ============================================

/// Conversation identifier
///
/// The backend may answer with a JSON string or number. Both are held in
/// their string form, which is also how they are persisted and put in paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the string form
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// Message identifier as returned by the backend
///
/// Equality is by variant and value: the number `2` and the string `"2"`
/// are different ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Numeric id
    Number(serde_json::Number),
    /// Textual id
    Text(String),
}

impl MessageId {
    /// The reserved placeholder id
    #[must_use]
    pub fn pending() -> Self {
        Self::Text(PENDING_ASSISTANT_ID.to_string())
    }

    /// Whether this is the reserved placeholder id
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Text(s) if s == PENDING_ASSISTANT_ID)
    }

    /// Numeric value used when ordering by id
    ///
    /// Strings are parsed after trimming; empty or non-numeric strings have
    /// no numeric value.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
            }
        }
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ============================================
// Transcript
// ============================================

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    /// User input
    User,
    /// Backend assistant
    Assistant,
}

/// One rendered line of the transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Who sent it
    pub role: ChatRole,
    /// Message text
    pub text: String,
    /// When it was created, if known
    pub created_at: Option<DateTime<Utc>>,
    /// Backend id, if known
    pub id: Option<MessageId>,
}

impl ChatEntry {
    /// Entry typed by the user, stamped now
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            created_at: Some(Utc::now()),
            id: None,
        }
    }

    /// The synthetic awaiting-response entry
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            role: ChatRole::Assistant,
            text: PENDING_ASSISTANT_TEXT.to_string(),
            created_at: None,
            id: Some(MessageId::pending()),
        }
    }

    /// Whether this entry is the pending placeholder
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id.as_ref().is_some_and(MessageId::is_pending)
    }

    /// Whether this is a genuine assistant message
    #[must_use]
    pub fn is_assistant_reply(&self) -> bool {
        self.role == ChatRole::Assistant && !self.is_placeholder()
    }
}

/// Message record as the backend returns it
///
/// Every field is optional; the normalizer fills the gaps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Backend id
    #[serde(default)]
    pub id: Option<MessageId>,
    /// Role string (`USER`, `ASSISTANT`, ...)
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    /// Message content
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    /// Creation timestamp as sent by the backend
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
}

impl RawMessage {
    /// Whether the record carries nothing at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.role.is_none() && self.content.is_none() && self.created_at.is_none()
    }
}

/// Accept any JSON value where a string is expected; non-strings become `None`
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

// ============================================
// Errors surfaced to the user
// ============================================

/// Which operation a user-facing error belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorScope {
    /// Sending a message
    Send,
    /// Creating or recovering the active conversation
    Initialize,
    /// Loading messages of the active conversation
    Load,
    /// Loading a previous conversation for display
    Archive,
    /// Uploading knowledge documents
    Upload,
    /// Listing knowledge documents
    Documents,
}

/// A user-facing error message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    /// Operation that failed
    pub scope: ErrorScope,
    /// Human-readable text
    pub message: String,
}

impl SessionError {
    /// Create a scoped error
    pub fn new(scope: ErrorScope, message: impl Into<String>) -> Self {
        Self {
            scope,
            message: message.into(),
        }
    }
}

// ============================================
// Controller -> Surface
// ============================================

/// Busy/awaiting flags of the active session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    /// A send request is in flight
    pub is_sending: bool,
    /// The active conversation is being created or recovered
    pub is_initializing: bool,
    /// Waiting for the assistant to answer
    pub is_awaiting_response: bool,
}

/// Upload progress report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes handed to the transport so far
    pub sent: u64,
    /// Total bytes of the upload
    pub total: u64,
}

impl UploadProgress {
    /// Whole-number percentage, 100 for empty uploads
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = self.sent.min(self.total) * 100 / self.total;
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Messages from the controllers to the presentation surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// An active conversation is ready for input
    ConversationReady {
        /// Active conversation
        conversation_id: ConversationId,
        /// Whether it was recovered from storage rather than created
        recovered: bool,
    },

    /// The transcript changed
    HistoryChanged {
        /// Full transcript, oldest first
        entries: Vec<ChatEntry>,
    },

    /// Busy/awaiting flags changed
    FlagsChanged {
        /// Current flags
        flags: SessionFlags,
    },

    /// A user-facing error was raised
    Error {
        /// The error
        error: SessionError,
    },

    /// A previous error of this scope no longer applies
    ErrorCleared {
        /// Scope that was cleared
        scope: ErrorScope,
    },

    /// The composer rejected its content
    InputRejected {
        /// Why
        reason: crate::composer::InputError,
    },

    /// Polling gave up without a reply
    AwaitingExpired {
        /// Attempts made in the cycle
        attempts: u32,
    },

    /// A previous conversation was loaded into the archive slot
    ArchiveLoaded {
        /// Archived conversation
        conversation_id: ConversationId,
        /// Its transcript
        entries: Vec<ChatEntry>,
    },

    /// Upload progress
    UploadProgress {
        /// Target specialist
        specialist: String,
        /// Progress so far
        progress: UploadProgress,
    },

    /// Upload finished successfully
    UploadCompleted {
        /// Target specialist
        specialist: String,
    },

    /// Document list refreshed
    DocumentsListed {
        /// Target specialist
        specialist: String,
        /// Documents on the backend
        documents: Vec<crate::gateway::KnowledgeDocument>,
    },

    /// The session ended
    Closed,
}
