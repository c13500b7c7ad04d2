//! Backend Gateways
//!
//! Access to the Bjorn backend through trait interfaces, so the controllers
//! never depend on the transport.
//!
//! # Available Gateways
//!
//! - **HTTP**: the JSON REST API (default)
//!
//! # Usage
//!
//! ```ignore
//! use bjorn_client_core::gateway::{ConversationGateway, HttpGateway, CreateConversationRequest};
//!
//! let gateway = HttpGateway::new("http://localhost:8080", Duration::from_secs(30))?;
//! let id = gateway.create_conversation(&CreateConversationRequest::new("Conversa")).await?;
//! let messages = gateway.list_messages(&id).await?;
//! ```

mod http;
mod traits;

pub use http::HttpGateway;
pub use traits::{
    ConversationGateway, CreateConversationRequest, CreatedConversation, GatewayError,
    KnowledgeDocument, KnowledgeGateway, SendMessageRequest, UploadFile,
};
