//! Conversation Session Controller
//!
//! Owns the identity of the active conversation and drives every
//! send/receive cycle against a [`ConversationGateway`].
//!
//! # Lifecycle
//!
//! 1. [`SessionController::ensure_conversation`] recovers the stored
//!    conversation or creates a new one
//! 2. [`SessionController::submit`] validates composer input, waits for a
//!    conversation if needed and dispatches the message
//! 3. While a reply is outstanding the transcript ends with a placeholder and
//!    the surface calls [`SessionController::poll_for_response`] whenever
//!    [`SessionController::next_poll_deadline`] elapses
//! 4. [`SessionController::shutdown`] cancels polling
//!
//! All state lives here and is mutated only through `&mut self` methods, so a
//! single task drives the controller and no locks are needed. Every change is
//! announced to the surface as a [`SessionEvent`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::composer::{Composer, InputError};
use crate::config::{ClientConfigFile, DEFAULT_BACKEND_URL, DEFAULT_CONVERSATION_TITLE};
use crate::gateway::{
    ConversationGateway, CreateConversationRequest, GatewayError, SendMessageRequest,
};
use crate::messages::{
    ChatEntry, ChatRole, ConversationId, ErrorScope, MessageId, RawMessage, SessionError,
    SessionEvent, SessionFlags,
};
use crate::normalizer::{normalize_message, normalize_messages, normalize_role};
use crate::placeholder::{latest_assistant_id, strip_placeholders, AwaitingTracker};
use crate::polling::{PollConfig, PollPhase, PollScheduler, TickAction};
use crate::storage::{ConversationStore, KeyValueStore, DEFAULT_MAX_PREVIOUS_CONVERSATIONS};
use crate::text;

/// Session controller configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Polling budget while awaiting a reply
    pub poll: PollConfig,
    /// Maximum message length in characters
    pub max_message_length: usize,
    /// Length of the previous conversation list
    pub max_previous_conversations: usize,
    /// Title of new conversations
    pub conversation_title: String,
    /// Knowledge base attached to new conversations
    pub knowledge_base_id: Option<String>,
    /// Backend URL, quoted in connection errors
    pub backend_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            max_message_length: crate::composer::DEFAULT_MAX_MESSAGE_LENGTH,
            max_previous_conversations: DEFAULT_MAX_PREVIOUS_CONVERSATIONS,
            conversation_title: DEFAULT_CONVERSATION_TITLE.to_string(),
            knowledge_base_id: None,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
        }
    }
}

impl From<&ClientConfigFile> for SessionConfig {
    fn from(config: &ClientConfigFile) -> Self {
        Self {
            poll: config.poll,
            max_message_length: config.max_message_length,
            max_previous_conversations: config.max_previous_conversations,
            conversation_title: config.backend.conversation_title.clone(),
            knowledge_base_id: config.backend.knowledge_base_id.clone(),
            backend_url: config.backend.url.clone(),
        }
    }
}

/// A previous conversation loaded for reading
#[derive(Clone, Debug, PartialEq)]
pub struct ArchivedConversation {
    /// Its identifier
    pub conversation_id: ConversationId,
    /// Its transcript, oldest first
    pub entries: Vec<ChatEntry>,
}

/// Snapshot of the session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    /// Active conversation
    pub conversation_id: Option<ConversationId>,
    /// Transcript, oldest first; ends with the placeholder while awaiting
    pub history: Vec<ChatEntry>,
    /// Busy/awaiting flags
    pub flags: SessionFlags,
    /// Id of the last genuine assistant message seen
    pub last_assistant_message_id: Option<MessageId>,
    /// Polls made in the current await cycle
    pub poll_attempts: u32,
    /// Current user-facing error
    pub error: Option<SessionError>,
    /// Previous conversation loaded for display
    pub archive: Option<ArchivedConversation>,
    /// Why the last archive load failed
    pub archive_error: Option<String>,
}

/// The session controller
pub struct SessionController<G: ConversationGateway, S: KeyValueStore> {
    /// Configuration
    config: SessionConfig,
    /// Backend access
    gateway: Arc<G>,
    /// Persisted conversation ids
    store: ConversationStore<S>,
    /// Channel to the presentation surface
    tx: mpsc::Sender<SessionEvent>,
    /// Active conversation
    conversation_id: Option<ConversationId>,
    /// Transcript
    history: Vec<ChatEntry>,
    /// A send request is in flight
    is_sending: bool,
    /// The conversation is being created or recovered
    is_initializing: bool,
    /// Awaiting flag and reply baseline
    tracker: AwaitingTracker,
    /// Single poll chain
    poller: PollScheduler,
    /// User input
    composer: Composer,
    /// Validated text waiting for a conversation
    pending_message: Option<String>,
    /// Current user-facing error
    error: Option<SessionError>,
    /// Previous conversation loaded for display
    archive: Option<ArchivedConversation>,
    /// Why the last archive load failed
    archive_error: Option<String>,
    /// Flags last announced to the surface
    announced_flags: SessionFlags,
}

impl<G: ConversationGateway + 'static, S: KeyValueStore> SessionController<G, S> {
    /// Create a controller; nothing is fetched until
    /// [`ensure_conversation`](Self::ensure_conversation) runs
    pub fn new(gateway: G, store: S, config: SessionConfig, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self::with_shared(Arc::new(gateway), store, config, tx)
    }

    /// Create a controller over a gateway shared with other components
    pub fn with_shared(
        gateway: Arc<G>,
        store: S,
        config: SessionConfig,
        tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let store = ConversationStore::new(store, config.max_previous_conversations);
        let poller = PollScheduler::new(config.poll);
        let composer = Composer::new(config.max_message_length);

        Self {
            config,
            gateway,
            store,
            tx,
            conversation_id: None,
            history: Vec::new(),
            is_sending: false,
            is_initializing: false,
            tracker: AwaitingTracker::new(),
            poller,
            composer,
            pending_message: None,
            error: None,
            archive: None,
            archive_error: None,
            announced_flags: SessionFlags::default(),
        }
    }

    // ============================================
    // Accessors
    // ============================================

    /// Active conversation
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Transcript, oldest first
    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    /// Busy/awaiting flags
    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            is_sending: self.is_sending,
            is_initializing: self.is_initializing,
            is_awaiting_response: self.tracker.is_awaiting(),
        }
    }

    /// Current user-facing error
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Polls made in the current await cycle
    pub fn poll_attempts(&self) -> u32 {
        self.poller.attempts()
    }

    /// Previous conversation loaded for display
    pub fn archive(&self) -> Option<&ArchivedConversation> {
        self.archive.as_ref()
    }

    /// The composer
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// The composer, for typing
    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    /// Previous conversation ids, most recent first
    pub async fn previous_conversations(&self) -> Vec<ConversationId> {
        self.store.previous().await
    }

    /// Whether the composer content could be sent right now
    pub fn can_submit(&self) -> bool {
        self.composer.is_valid()
            && !self.is_sending
            && !self.is_initializing
            && self.conversation_id.is_some()
    }

    /// When [`poll_for_response`](Self::poll_for_response) is due next
    ///
    /// Pair with [`crate::polling::sleep_until_deadline`] in a `select!`.
    pub fn next_poll_deadline(&self) -> Option<Instant> {
        self.poller.deadline()
    }

    /// Full snapshot
    pub fn state(&self) -> SessionState {
        SessionState {
            conversation_id: self.conversation_id.clone(),
            history: self.history.clone(),
            flags: self.flags(),
            last_assistant_message_id: self.tracker.last_assistant_id().cloned(),
            poll_attempts: self.poller.attempts(),
            error: self.error.clone(),
            archive: self.archive.clone(),
            archive_error: self.archive_error.clone(),
        }
    }

    // ============================================
    // Conversation identity
    // ============================================

    /// Make sure an active conversation exists
    ///
    /// Recovers the stored conversation when its messages load, otherwise
    /// forgets it and creates a new one. Returns whether a conversation is
    /// ready; on `false` the error slot says why.
    pub async fn ensure_conversation(&mut self) -> bool {
        if self.conversation_id.is_some() {
            return true;
        }
        if self.is_initializing {
            return false;
        }

        self.is_initializing = true;
        self.clear_error().await;
        self.announce_flags().await;

        if let Some(stored) = self.store.active().await {
            tracing::debug!(conversation_id = %stored, "Recovering stored conversation");
            self.conversation_id = Some(stored.clone());

            match self.gateway.list_messages(&stored).await {
                Ok(messages) => {
                    self.apply_loaded_messages(&messages).await;
                    self.is_initializing = false;
                    self.announce_flags().await;
                    tracing::info!(conversation_id = %stored, "Recovered conversation");
                    self.send(SessionEvent::ConversationReady {
                        conversation_id: stored,
                        recovered: true,
                    })
                    .await;
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %stored,
                        error = %e,
                        "Stored conversation could not be loaded, starting a new one"
                    );
                    if let Err(e) = self.store.clear_active().await {
                        tracing::warn!(error = %e, "Failed to forget stored conversation");
                    }
                    self.conversation_id = None;
                }
            }
        }

        self.create_conversation(true).await
    }

    /// Create a conversation and make it active
    ///
    /// `load_messages` fetches its (normally empty) transcript before it is
    /// announced as ready.
    async fn create_conversation(&mut self, load_messages: bool) -> bool {
        self.is_initializing = true;
        self.clear_error().await;
        self.announce_flags().await;

        let request = CreateConversationRequest::new(self.config.conversation_title.clone())
            .with_knowledge_base(self.config.knowledge_base_id.clone());

        let id = match self.gateway.create_conversation(&request).await {
            Ok(id) => id,
            Err(GatewayError::MissingConversationId) => {
                tracing::warn!("Create response has no conversation id");
                self.is_initializing = false;
                self.set_error(ErrorScope::Initialize, text::MISSING_CONVERSATION_ID)
                    .await;
                self.announce_flags().await;
                return false;
            }
            Err(e) => {
                tracing::warn!(gateway = self.gateway.name(), error = %e, "Failed to create conversation");
                let fallback = text::initialize_failed(&self.config.backend_url);
                self.is_initializing = false;
                self.set_error(ErrorScope::Initialize, e.user_message(&fallback))
                    .await;
                self.announce_flags().await;
                return false;
            }
        };

        tracing::info!(conversation_id = %id, "Created conversation");
        self.conversation_id = Some(id.clone());
        if let Err(e) = self.store.set_active(&id).await {
            tracing::warn!(error = %e, "Failed to persist active conversation");
        }

        if load_messages {
            // A failed load leaves a Load error but the conversation stays usable
            let _ = self.load_messages().await;
        }

        self.is_initializing = false;
        self.announce_flags().await;
        self.send(SessionEvent::ConversationReady {
            conversation_id: id,
            recovered: false,
        })
        .await;
        true
    }

    /// Drop the active conversation and start a fresh one
    ///
    /// Ignored while a conversation is being initialized. The outgoing id is
    /// remembered in the previous conversation list. Returns whether the new
    /// conversation is ready.
    pub async fn start_new_conversation(&mut self) -> bool {
        if self.is_initializing {
            tracing::debug!("Ignoring new conversation request during initialization");
            return false;
        }

        self.poller.cancel();
        self.tracker.reset();
        self.is_sending = false;
        self.clear_error().await;
        self.pending_message = None;
        self.composer.reset();
        self.history.clear();

        if let Some(previous) = self.conversation_id.take() {
            if let Err(e) = self.store.remember_previous(&previous).await {
                tracing::warn!(error = %e, "Failed to remember previous conversation");
            }
        }
        if let Err(e) = self.store.clear_active().await {
            tracing::warn!(error = %e, "Failed to forget active conversation");
        }

        self.announce_history().await;
        self.announce_flags().await;

        self.create_conversation(false).await
    }

    /// Load a previous conversation into the archive slot
    ///
    /// Never touches the active session; a failure only sets the archive
    /// error. Returns whether the archive was loaded.
    pub async fn load_previous_conversation(&mut self, id: &ConversationId) -> bool {
        self.archive_error = None;

        match self.gateway.list_messages(id).await {
            Ok(messages) => {
                let entries = normalize_messages(&messages);
                tracing::debug!(conversation_id = %id, messages = entries.len(), "Loaded previous conversation");
                self.archive = Some(ArchivedConversation {
                    conversation_id: id.clone(),
                    entries: entries.clone(),
                });
                self.send(SessionEvent::ArchiveLoaded {
                    conversation_id: id.clone(),
                    entries,
                })
                .await;
                true
            }
            Err(e) => {
                tracing::warn!(conversation_id = %id, error = %e, "Failed to load previous conversation");
                let message = e.user_message(text::ARCHIVE_FAILED);
                self.archive_error = Some(message.clone());
                self.send(SessionEvent::Error {
                    error: SessionError::new(ErrorScope::Archive, message),
                })
                .await;
                false
            }
        }
    }

    /// Close the archive slot
    pub fn clear_archive(&mut self) {
        self.archive = None;
        self.archive_error = None;
    }

    // ============================================
    // Sending
    // ============================================

    /// Submit `text` as the composer content
    ///
    /// Rejects invalid input and submissions while a send is in flight;
    /// rejected text stays in the composer. Accepted text waits for a
    /// conversation, then is dispatched. If no conversation could be made
    /// ready, the text stays pending and the error slot says why.
    ///
    /// # Errors
    ///
    /// Returns the validation failure when the input is rejected.
    pub async fn submit(&mut self, text: impl Into<String>) -> Result<(), InputError> {
        self.composer.set_value(text);
        if self.is_sending {
            self.composer.set_error(InputError::Busy);
        }

        if let Some(reason) = self.composer.error() {
            self.composer.mark_touched();
            self.send(SessionEvent::InputRejected { reason }).await;
            return Err(reason);
        }

        let message = match self.composer.take_trimmed() {
            Ok(message) => message,
            Err(reason) => {
                self.send(SessionEvent::InputRejected { reason }).await;
                return Err(reason);
            }
        };

        self.pending_message = Some(message);

        if self.conversation_id.is_none() && !self.ensure_conversation().await {
            return Ok(());
        }

        self.dispatch().await;
        Ok(())
    }

    /// Send the pending message to the active conversation
    ///
    /// Does nothing without a pending message or an active conversation.
    pub async fn dispatch(&mut self) {
        let Some(conversation_id) = self.conversation_id.clone() else {
            return;
        };
        let Some(message) = self.pending_message.take() else {
            return;
        };

        self.composer.reset();
        self.clear_error().await;
        self.is_sending = true;

        self.tracker.set_baseline(latest_assistant_id(&self.history));
        self.history.push(ChatEntry::user(message.clone()));
        self.start_awaiting();
        self.announce_history().await;
        self.announce_flags().await;

        tracing::info!(
            conversation_id = %conversation_id,
            chars = message.chars().count(),
            "Dispatching message"
        );

        let request = SendMessageRequest::new(message);
        match self.gateway.send_message(&conversation_id, &request).await {
            Ok(Some(reply)) if normalize_role(reply.role.as_deref()) == ChatRole::Assistant => {
                self.accept_reply(&reply);
                self.announce_history().await;
            }
            Ok(_) => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    "No reply embedded in send response, polling"
                );
            }
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "Failed to send message");
                self.tracker.clear();
                self.poller.cancel();
                self.history = strip_placeholders(std::mem::take(&mut self.history));
                self.set_error(ErrorScope::Send, e.user_message(text::SEND_FAILED))
                    .await;
                self.announce_history().await;
            }
        }

        self.is_sending = false;
        self.announce_flags().await;
    }

    /// Enter the awaiting state for a new send cycle
    fn start_awaiting(&mut self) {
        self.poller.cancel();
        self.tracker.begin();
        self.history = self
            .tracker
            .apply_awaiting_placeholder(std::mem::take(&mut self.history));
        self.poller.start();
    }

    /// Append a reply that came back with the send response
    fn accept_reply(&mut self, reply: &RawMessage) {
        let entry = normalize_message(reply);
        tracing::debug!(id = ?entry.id, "Reply embedded in send response");

        self.history = strip_placeholders(std::mem::take(&mut self.history));
        self.tracker.observe_reply(entry.id.clone());
        self.history.push(entry);
        self.poller.cancel();
    }

    // ============================================
    // Polling
    // ============================================

    /// Run one poll tick
    ///
    /// Re-fetches the transcript while a reply is outstanding, withdraws the
    /// placeholder once the attempt budget is spent and does nothing once the
    /// reply has arrived. Returns what the tick did.
    pub async fn poll_for_response(&mut self) -> TickAction {
        let action = self.poller.tick(self.tracker.is_awaiting());

        match action {
            TickAction::Skip => {}
            TickAction::GiveUp { attempts } => {
                self.tracker.clear();
                self.history = strip_placeholders(std::mem::take(&mut self.history));
                self.send(SessionEvent::AwaitingExpired { attempts }).await;
                self.announce_history().await;
            }
            TickAction::Fetch { attempt } => {
                tracing::debug!(
                    attempt,
                    max_attempts = self.poller.config().max_attempts,
                    "Polling for assistant reply"
                );
                // Failures are reported as Load errors and retried on the next tick
                let _ = self.load_messages().await;
                self.poller.reschedule(self.tracker.is_awaiting());
            }
        }

        self.announce_flags().await;
        action
    }

    /// Run a poll tick if one is due
    pub async fn poll_if_due(&mut self) -> Option<TickAction> {
        if self.poller.is_due() {
            Some(self.poll_for_response().await)
        } else {
            None
        }
    }

    /// Phase of the poll scheduler
    pub fn poll_phase(&self) -> PollPhase {
        self.poller.phase()
    }

    // ============================================
    // Teardown
    // ============================================

    /// End the session: cancel polling and announce the final state
    pub async fn shutdown(&mut self) {
        self.poller.cancel();
        if self.tracker.is_awaiting() {
            self.tracker.clear();
            self.history = strip_placeholders(std::mem::take(&mut self.history));
            self.announce_history().await;
        }
        self.announce_flags().await;
        tracing::info!(conversation_id = ?self.conversation_id, "Session closed");
        self.send(SessionEvent::Closed).await;
    }

    // ============================================
    // Internals
    // ============================================

    /// Fetch the active transcript and reconcile it with the awaiting state
    async fn load_messages(&mut self) -> Result<(), GatewayError> {
        let Some(conversation_id) = self.conversation_id.clone() else {
            return Ok(());
        };

        match self.gateway.list_messages(&conversation_id).await {
            Ok(messages) => {
                self.apply_loaded_messages(&messages).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "Failed to load messages");
                self.set_error(ErrorScope::Load, e.user_message(text::LOAD_FAILED))
                    .await;
                Err(e)
            }
        }
    }

    async fn apply_loaded_messages(&mut self, messages: &[RawMessage]) {
        let entries = normalize_messages(messages);
        self.history = self.tracker.apply_awaiting_placeholder(entries);
        if !self.tracker.is_awaiting() {
            self.poller.cancel();
        }
        self.announce_history().await;
    }

    async fn set_error(&mut self, scope: ErrorScope, message: impl Into<String>) {
        let error = SessionError::new(scope, message);
        self.error = Some(error.clone());
        self.send(SessionEvent::Error { error }).await;
    }

    async fn clear_error(&mut self) {
        if let Some(previous) = self.error.take() {
            self.send(SessionEvent::ErrorCleared {
                scope: previous.scope,
            })
            .await;
        }
    }

    async fn announce_history(&self) {
        self.send(SessionEvent::HistoryChanged {
            entries: self.history.clone(),
        })
        .await;
    }

    /// Send `FlagsChanged` if the flags differ from the last announcement
    async fn announce_flags(&mut self) {
        let flags = self.flags();
        if flags != self.announced_flags {
            self.announced_flags = flags;
            self.send(SessionEvent::FlagsChanged { flags }).await;
        }
    }

    /// Send a message to the surface
    async fn send(&self, event: SessionEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::warn!("Failed to send event to surface: {}", e);
        }
    }
}
