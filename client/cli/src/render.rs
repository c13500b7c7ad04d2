//! Plain-text rendering of session events
//!
//! The session announces the whole transcript on every change; the renderer
//! remembers what it already printed and only prints the new tail.

use bjorn_client_core::gateway::KnowledgeDocument;
use bjorn_client_core::{ChatEntry, ChatRole, SessionEvent};

/// Turns events into printable lines
#[derive(Debug, Default)]
pub struct Renderer {
    shown: Vec<ChatEntry>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for `event`
    pub fn render(&mut self, event: &SessionEvent) -> Vec<String> {
        match event {
            SessionEvent::ConversationReady {
                conversation_id,
                recovered,
            } => {
                let verb = if *recovered { "retomada" } else { "iniciada" };
                vec![format!("* conversa {conversation_id} {verb}")]
            }
            SessionEvent::HistoryChanged { entries } => self.history(entries),
            SessionEvent::Error { error } => vec![format!("! {}", error.message)],
            SessionEvent::InputRejected { reason } => vec![format!("! {reason}")],
            SessionEvent::AwaitingExpired { attempts } => {
                vec![format!("* sem resposta após {attempts} tentativas")]
            }
            SessionEvent::ArchiveLoaded {
                conversation_id,
                entries,
            } => {
                let mut lines = vec![format!("--- conversa {conversation_id} ---")];
                lines.extend(entries.iter().map(format_entry));
                lines.push("---".to_string());
                lines
            }
            SessionEvent::UploadProgress {
                specialist,
                progress,
            } => vec![format!("* enviando para {specialist}: {}%", progress.percent())],
            SessionEvent::UploadCompleted { specialist } => {
                vec![format!("* upload para {specialist} concluído")]
            }
            SessionEvent::DocumentsListed {
                specialist,
                documents,
            } => documents_lines(specialist, documents),
            SessionEvent::FlagsChanged { .. }
            | SessionEvent::ErrorCleared { .. }
            | SessionEvent::Closed => Vec::new(),
        }
    }

    fn history(&mut self, entries: &[ChatEntry]) -> Vec<String> {
        let common = self
            .shown
            .iter()
            .zip(entries)
            .take_while(|(a, b)| a == b)
            .count();

        // Anything other than a withdrawn placeholder vanishing means a
        // different transcript: start over
        let rewritten = self.shown[common..].iter().any(|e| !e.is_placeholder());

        let mut lines = Vec::new();
        let start = if rewritten {
            lines.push("---".to_string());
            0
        } else {
            common
        };
        lines.extend(entries[start..].iter().map(format_entry));

        self.shown = entries.to_vec();
        lines
    }
}

fn format_entry(entry: &ChatEntry) -> String {
    let who = match entry.role {
        ChatRole::User => "você",
        ChatRole::Assistant => "bjorn",
    };
    format!("{who}> {}", entry.text)
}

fn documents_lines(specialist: &str, documents: &[KnowledgeDocument]) -> Vec<String> {
    if documents.is_empty() {
        return vec![format!("* nenhum documento para {specialist}")];
    }
    let mut lines = vec![format!("* documentos de {specialist}:")];
    for doc in documents {
        let name = doc.name.as_deref().unwrap_or("(sem nome)");
        match doc.size {
            Some(size) => lines.push(format!("  {name} ({size} bytes)")),
            None => lines.push(format!("  {name}")),
        }
    }
    lines
}
