//! Gateway Traits
//!
//! Trait definitions for the backend the client talks to. The session
//! controller and knowledge library only see these traits, so tests can swap
//! in scripted gateways and the HTTP transport stays an implementation
//! detail.
//!
//! # Design Philosophy
//!
//! Every call is a single fallible request/response round-trip. Nothing here
//! retries or caches; callers decide what a failure means for their state.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::messages::{ConversationId, MessageId, RawMessage, UploadProgress};

// ============================================
// Errors
// ============================================

/// Errors from a gateway call
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend answered with a non-success status
    #[error("Backend returned {status}: {}", message.as_deref().unwrap_or(body))]
    Http {
        /// HTTP status code
        status: u16,
        /// `message` field of a JSON error body, if present
        message: Option<String>,
        /// Raw response body
        body: String,
    },

    /// The request never completed (connection refused, timeout, ...)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not what the endpoint promises
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A local file could not be read
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The backend URL cannot carry the request path
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// The create-conversation response had no identifier
    #[error("Response has no conversation identifier")]
    MissingConversationId,
}

impl GatewayError {
    /// Human-readable message sent by the server, if any
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Http {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Server message, else `fallback`
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

// ============================================
// Conversations
// ============================================

/// Body of a create-conversation call
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Knowledge base to ground answers in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
}

impl CreateConversationRequest {
    /// Request with a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            knowledge_base_id: None,
        }
    }

    /// Set the knowledge base
    #[must_use]
    pub fn with_knowledge_base(mut self, id: Option<String>) -> Self {
        self.knowledge_base_id = id;
        self
    }
}

/// Response of a create-conversation call
///
/// The backend names the identifier either `id` or `conversationId`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedConversation {
    /// Identifier under `id`
    #[serde(default)]
    pub id: Option<ConversationId>,
    /// Identifier under `conversationId`
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

impl CreatedConversation {
    /// The identifier, whichever field carried it
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingConversationId`] when neither field is
    /// set or the value is blank.
    pub fn into_id(self) -> Result<ConversationId, GatewayError> {
        self.id
            .or(self.conversation_id)
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or(GatewayError::MissingConversationId)
    }
}

/// Body of a send-message call
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SendMessageRequest {
    /// Trimmed user text
    pub content: String,
    /// Opaque extra data for the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SendMessageRequest {
    /// Request with only content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }
}

/// Conversation endpoints
#[async_trait]
pub trait ConversationGateway: Send + Sync {
    /// Gateway name for logs
    fn name(&self) -> &str;

    /// Create a conversation and return its identifier
    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<ConversationId, GatewayError>;

    /// All messages of a conversation, in backend order
    async fn list_messages(&self, id: &ConversationId) -> Result<Vec<RawMessage>, GatewayError>;

    /// Send a user message
    ///
    /// Returns the message record the backend answered with, or `None` when
    /// the response body was empty.
    async fn send_message(
        &self,
        id: &ConversationId,
        request: &SendMessageRequest,
    ) -> Result<Option<RawMessage>, GatewayError>;
}

// ============================================
// Knowledge documents
// ============================================

/// A file to upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    /// File name sent to the backend
    pub name: String,
    /// File content
    pub bytes: Vec<u8>,
    /// MIME type, if known
    pub content_type: Option<String>,
}

impl UploadFile {
    /// File from memory
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    /// Set the MIME type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, named after its last path component
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = guess_content_type(&name).map(str::to_string);
        Ok(Self {
            name,
            bytes,
            content_type,
        })
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the file is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "json" => Some("application/json"),
        "csv" => Some("text/csv"),
        "html" | "htm" => Some("text/html"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

/// Document stored in a specialist's knowledge base
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    /// File name
    #[serde(default)]
    pub name: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// Upload timestamp as sent by the backend
    #[serde(default)]
    pub uploaded_at: Option<String>,
    /// Backend id (number or string)
    #[serde(default)]
    pub id: Option<MessageId>,
}

/// Knowledge base endpoints
#[async_trait]
pub trait KnowledgeGateway: Send + Sync {
    /// Upload files for a specialist
    ///
    /// Progress is reported on `progress` while the body is sent; reports may
    /// be dropped if the receiver falls behind. Returns the completion text
    /// of the backend.
    async fn upload_documents(
        &self,
        specialist: &str,
        files: Vec<UploadFile>,
        progress: mpsc::Sender<UploadProgress>,
    ) -> Result<String, GatewayError>;

    /// Documents of a specialist
    async fn list_documents(&self, specialist: &str) -> Result<Vec<KnowledgeDocument>, GatewayError>;
}
