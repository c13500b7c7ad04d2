//! Bjorn Client Core - Conversation Synchronization Engine
//!
//! This crate keeps a chat transcript in step with the Bjorn backend,
//! independent of how it is rendered. It can drive a terminal, a web view,
//! or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Surfaces                                  │
//! │        ┌──────────────┐   ┌──────────────┐   ┌───────────────┐    │
//! │        │   Terminal   │   │   Web view   │   │   Headless    │    │
//! │        └──────┬───────┘   └──────┬───────┘   └───────┬───────┘    │
//! │               └──────────────────┴───────────────────┘            │
//! │                    method calls (down)                            │
//! │                    SessionEvent (up)                              │
//! └───────────────────────────┬───────────────────────────────────────┘
//!                             │
//! ┌───────────────────────────┼───────────────────────────────────────┐
//! │                      CLIENT CORE                                  │
//! │  ┌────────────────────────┴─────────────────────────────────────┐ │
//! │  │                 SessionController                             │ │
//! │  │  ┌──────────┐ ┌────────────┐ ┌───────────┐ ┌───────────────┐ │ │
//! │  │  │Normalizer│ │ Awaiting   │ │   Poll    │ │ Conversation  │ │ │
//! │  │  │          │ │ Tracker    │ │ Scheduler │ │ Store         │ │ │
//! │  │  └──────────┘ └────────────┘ └───────────┘ └───────────────┘ │ │
//! │  └───────────────────────────┬──────────────────────────────────┘ │
//! │                    ConversationGateway / KnowledgeGateway         │
//! └──────────────────────────────┼────────────────────────────────────┘
//!                                │ HTTP
//!                          Bjorn backend
//! ```
//!
//! # Key Types
//!
//! - [`SessionController`]: owns the active conversation and every send/receive cycle
//! - [`SessionEvent`]: messages sent from the controllers to the surface
//! - [`KnowledgeLibrary`]: document upload and listing per specialist
//! - [`gateway::HttpGateway`]: the backend over HTTP
//! - [`storage::FileStore`]: persisted conversation ids
//!
//! # Quick Start
//!
//! ```ignore
//! use bjorn_client_core::{
//!     SessionConfig, SessionController,
//!     gateway::HttpGateway,
//!     polling::sleep_until_deadline,
//!     storage::MemoryStore,
//! };
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = mpsc::channel(256);
//!     let gateway = HttpGateway::new("http://localhost:8080", Duration::from_secs(30)).unwrap();
//!     let mut session = SessionController::new(gateway, MemoryStore::new(), SessionConfig::default(), tx);
//!
//!     session.ensure_conversation().await;
//!     session.submit("Olá").await.ok();
//!
//!     // Poll until the reply shows up or the budget runs out
//!     while let Some(deadline) = session.next_poll_deadline() {
//!         sleep_until_deadline(Some(deadline)).await;
//!         session.poll_for_response().await;
//!     }
//!
//!     while let Ok(event) = rx.try_recv() {
//!         // Render event
//!     }
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod composer;
pub mod config;
pub mod gateway;
pub mod knowledge;
pub mod messages;
pub mod normalizer;
pub mod placeholder;
pub mod polling;
pub mod session;
pub mod storage;
pub mod text;

pub use composer::{Composer, InputError};
pub use config::{load_config, ClientConfigFile, ConfigOverrides};
pub use knowledge::KnowledgeLibrary;
pub use messages::{
    ChatEntry, ChatRole, ConversationId, ErrorScope, MessageId, RawMessage, SessionError,
    SessionEvent, SessionFlags, UploadProgress,
};
pub use session::{ArchivedConversation, SessionConfig, SessionController, SessionState};
