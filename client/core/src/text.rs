//! User-facing fallback messages
//!
//! Shown when the backend does not supply its own error message.

/// Sending a message failed
pub const SEND_FAILED: &str =
    "Não foi possível enviar a mensagem. Verifique se o backend está em execução e tente novamente.";

/// The create-conversation response had no identifier
pub const MISSING_CONVERSATION_ID: &str = "Resposta do backend não possui identificador da conversa.";

/// Loading messages of the active conversation failed
pub const LOAD_FAILED: &str = "Não foi possível carregar as mensagens desta conversa.";

/// Loading a previous conversation failed
pub const ARCHIVE_FAILED: &str = "Não foi possível carregar a conversa anterior.";

/// Uploading documents failed
pub const UPLOAD_FAILED: &str = "Não foi possível enviar os documentos.";

/// Listing documents failed
pub const DOCUMENTS_FAILED: &str = "Não foi possível carregar os documentos.";

/// No files were selected for upload
pub const NO_FILES_SELECTED: &str = "Selecione ao menos um arquivo para enviar.";

/// Creating a conversation failed
#[must_use]
pub fn initialize_failed(backend_url: &str) -> String {
    format!("Não foi possível iniciar uma conversa. Confirme se o backend está em execução em {backend_url}.")
}
