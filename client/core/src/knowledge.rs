//! Knowledge Library
//!
//! Uploads documents to a specialist's knowledge base and lists what is
//! there. Independent of the conversation session: it has its own busy
//! flags and error slots, but reports through the same event channel.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::gateway::{KnowledgeDocument, KnowledgeGateway, UploadFile};
use crate::messages::{ErrorScope, SessionError, SessionEvent, UploadProgress};
use crate::text;

/// Buffered progress reports per upload
const PROGRESS_BUFFER: usize = 64;

/// Document upload/listing state
pub struct KnowledgeLibrary<K: KnowledgeGateway> {
    gateway: Arc<K>,
    tx: mpsc::Sender<SessionEvent>,
    is_uploading: bool,
    is_loading: bool,
    progress: Option<UploadProgress>,
    upload_error: Option<String>,
    documents_error: Option<String>,
    documents: Vec<KnowledgeDocument>,
}

impl<K: KnowledgeGateway + 'static> KnowledgeLibrary<K> {
    /// Create an idle library
    pub fn new(gateway: K, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self::with_shared(Arc::new(gateway), tx)
    }

    /// Create an idle library over a gateway shared with other controllers
    pub fn with_shared(gateway: Arc<K>, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            gateway,
            tx,
            is_uploading: false,
            is_loading: false,
            progress: None,
            upload_error: None,
            documents_error: None,
            documents: Vec::new(),
        }
    }

    /// An upload is in flight
    pub fn is_uploading(&self) -> bool {
        self.is_uploading
    }

    /// A document listing is in flight
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Progress of the current or last upload
    pub fn progress(&self) -> Option<UploadProgress> {
        self.progress
    }

    /// Why the last upload failed
    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    /// Why the last listing failed
    pub fn documents_error(&self) -> Option<&str> {
        self.documents_error.as_deref()
    }

    /// Documents from the last successful listing
    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.documents
    }

    /// Upload `files` for `specialist`, then refresh its document list
    ///
    /// Rejects an empty selection and uploads started while another is in
    /// flight. Returns whether the upload succeeded.
    pub async fn upload(&mut self, specialist: &str, files: Vec<UploadFile>) -> bool {
        if self.is_uploading {
            tracing::debug!(specialist, "Upload already in progress");
            return false;
        }
        if files.is_empty() {
            self.fail_upload(text::NO_FILES_SELECTED.to_string()).await;
            return false;
        }

        self.is_uploading = true;
        self.progress = Some(UploadProgress {
            sent: 0,
            total: files.iter().map(UploadFile::len).sum(),
        });
        if self.upload_error.take().is_some() {
            self.send(SessionEvent::ErrorCleared {
                scope: ErrorScope::Upload,
            })
            .await;
        }

        tracing::info!(specialist, files = files.len(), "Uploading documents");

        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_BUFFER);
        let gateway = Arc::clone(&self.gateway);
        let upload = gateway.upload_documents(specialist, files, progress_tx);
        tokio::pin!(upload);

        let result = loop {
            tokio::select! {
                result = &mut upload => break result,
                Some(progress) = progress_rx.recv() => self.report_progress(specialist, progress).await,
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            self.report_progress(specialist, progress).await;
        }

        self.is_uploading = false;

        match result {
            Ok(response) => {
                tracing::info!(specialist, response = %response, "Upload completed");
                self.send(SessionEvent::UploadCompleted {
                    specialist: specialist.to_string(),
                })
                .await;
                self.refresh(specialist).await;
                true
            }
            Err(e) => {
                tracing::warn!(specialist, error = %e, "Upload failed");
                self.fail_upload(e.user_message(text::UPLOAD_FAILED)).await;
                false
            }
        }
    }

    /// Reload the document list of `specialist`
    ///
    /// Returns whether the list was loaded.
    pub async fn refresh(&mut self, specialist: &str) -> bool {
        self.is_loading = true;
        if self.documents_error.take().is_some() {
            self.send(SessionEvent::ErrorCleared {
                scope: ErrorScope::Documents,
            })
            .await;
        }

        let result = self.gateway.list_documents(specialist).await;
        self.is_loading = false;

        match result {
            Ok(documents) => {
                tracing::debug!(specialist, documents = documents.len(), "Listed documents");
                self.documents.clone_from(&documents);
                self.send(SessionEvent::DocumentsListed {
                    specialist: specialist.to_string(),
                    documents,
                })
                .await;
                true
            }
            Err(e) => {
                tracing::warn!(specialist, error = %e, "Failed to list documents");
                let message = e.user_message(text::DOCUMENTS_FAILED);
                self.documents_error = Some(message.clone());
                self.send(SessionEvent::Error {
                    error: SessionError::new(ErrorScope::Documents, message),
                })
                .await;
                false
            }
        }
    }

    async fn report_progress(&mut self, specialist: &str, progress: UploadProgress) {
        self.progress = Some(progress);
        self.send(SessionEvent::UploadProgress {
            specialist: specialist.to_string(),
            progress,
        })
        .await;
    }

    async fn fail_upload(&mut self, message: String) {
        self.upload_error = Some(message.clone());
        self.send(SessionEvent::Error {
            error: SessionError::new(ErrorScope::Upload, message),
        })
        .await;
    }

    async fn send(&self, event: SessionEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::warn!("Failed to send event to surface: {}", e);
        }
    }
}
