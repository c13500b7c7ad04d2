//! HTTP Gateway Implementation
//!
//! Talks to the Bjorn backend over its JSON REST API.
//!
//! # Endpoints
//!
//! - `POST /api/conversations` - create a conversation
//! - `GET  /api/conversations/{id}/messages` - list messages
//! - `POST /api/conversations/{id}/messages` - send a message
//! - `POST /api/knowledge/{specialist}/docs` - upload documents (multipart)
//! - `GET  /api/knowledge/{specialist}/docs` - list documents
//!
//! Path segments are percent-encoded. Error bodies of the form
//! `{"message": "..."}` become the server message of [`GatewayError::Http`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Url};
use tokio::sync::mpsc;

use super::traits::{
    ConversationGateway, CreateConversationRequest, CreatedConversation, GatewayError,
    KnowledgeDocument, KnowledgeGateway, SendMessageRequest, UploadFile,
};
use crate::config::BackendConfig;
use crate::messages::{ConversationId, RawMessage, UploadProgress};

/// Upload bodies are streamed in chunks of this size
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Backend client over HTTP
#[derive(Clone, Debug)]
pub struct HttpGateway {
    /// Base URL, e.g. `http://localhost:8080`
    base_url: Url,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpGateway {
    /// Create a gateway for `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url =
            Url::parse(base_url).map_err(|e| GatewayError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(base_url.to_string()));
        }

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Create from the `[backend]` configuration section
    ///
    /// # Errors
    ///
    /// See [`HttpGateway::new`].
    pub fn from_config(config: &BackendConfig) -> Result<Self, GatewayError> {
        Self::new(&config.url, config.request_timeout())
    }

    /// The base URL
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn messages_url(&self, id: &ConversationId) -> Result<Url, GatewayError> {
        self.endpoint(&["api", "conversations", id.as_str(), "messages"])
    }

    fn docs_url(&self, specialist: &str) -> Result<Url, GatewayError> {
        self.endpoint(&["api", "knowledge", specialist, "docs"])
    }
}

/// Body of a successful response, or the error it describes
async fn read_body(response: reqwest::Response) -> Result<String, GatewayError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = extract_message(&body);
        tracing::warn!(status = status.as_u16(), message = ?message, "Backend returned an error");
        return Err(GatewayError::Http {
            status: status.as_u16(),
            message,
            body,
        });
    }

    Ok(body)
}

/// `message` string of a JSON error body
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

/// Split files into multipart parts that report progress as they are read
fn progress_form(
    files: Vec<UploadFile>,
    progress: &mpsc::Sender<UploadProgress>,
) -> Result<Form, GatewayError> {
    let total: u64 = files.iter().map(UploadFile::len).sum();
    let sent = Arc::new(AtomicU64::new(0));
    let mut form = Form::new();

    for file in files {
        let length = file.len();
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();

        let sent = Arc::clone(&sent);
        let tx = progress.clone();
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            let so_far = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            // Progress is advisory; a full channel only drops the report
            let _ = tx.try_send(UploadProgress {
                sent: so_far,
                total,
            });
            Ok::<Vec<u8>, std::io::Error>(chunk)
        });

        let mut part = Part::stream_with_length(Body::wrap_stream(stream), length)
            .file_name(file.name);
        if let Some(content_type) = file.content_type {
            part = part.mime_str(&content_type)?;
        }
        form = form.part("files", part);
    }

    Ok(form)
}

#[async_trait]
impl ConversationGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<ConversationId, GatewayError> {
        let url = self.endpoint(&["api", "conversations"])?;
        tracing::debug!(%url, "Creating conversation");

        let response = self.http_client.post(url).json(request).send().await?;
        let body = read_body(response).await?;

        let created: CreatedConversation = serde_json::from_str(&body)?;
        created.into_id()
    }

    async fn list_messages(&self, id: &ConversationId) -> Result<Vec<RawMessage>, GatewayError> {
        let url = self.messages_url(id)?;
        tracing::trace!(%url, "Listing messages");

        let response = self.http_client.get(url).send().await?;
        let body = read_body(response).await?;

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_message(
        &self,
        id: &ConversationId,
        request: &SendMessageRequest,
    ) -> Result<Option<RawMessage>, GatewayError> {
        let url = self.messages_url(id)?;
        tracing::debug!(%url, chars = request.content.chars().count(), "Sending message");

        let response = self.http_client.post(url).json(request).send().await?;
        let body = read_body(response).await?;

        if body.trim().is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        if !value.is_object() {
            tracing::debug!("Send response is not a message record, ignoring it");
            return Ok(None);
        }

        let message: RawMessage = serde_json::from_value(value)?;
        Ok((!message.is_empty()).then_some(message))
    }
}

#[async_trait]
impl KnowledgeGateway for HttpGateway {
    async fn upload_documents(
        &self,
        specialist: &str,
        files: Vec<UploadFile>,
        progress: mpsc::Sender<UploadProgress>,
    ) -> Result<String, GatewayError> {
        let url = self.docs_url(specialist)?;
        tracing::info!(%url, files = files.len(), "Uploading documents");

        let form = progress_form(files, &progress)?;
        let response = self.http_client.post(url).multipart(form).send().await?;
        read_body(response).await
    }

    async fn list_documents(&self, specialist: &str) -> Result<Vec<KnowledgeDocument>, GatewayError> {
        let url = self.docs_url(specialist)?;
        tracing::trace!(%url, "Listing documents");

        let response = self.http_client.get(url).send().await?;
        let body = read_body(response).await?;

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}
