//! Input line parsing
//!
//! Plain lines are chat messages. Lines starting with `/` are commands.

use std::path::PathBuf;

use bjorn_client_core::ConversationId;

/// One line of user input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Send a chat message
    Say(String),
    /// Start a fresh conversation
    New,
    /// List previous conversation ids
    History,
    /// Show a previous conversation
    Open(ConversationId),
    /// Upload files to a specialist's knowledge base
    Upload {
        /// Target specialist
        specialist: String,
        /// Files to send
        paths: Vec<PathBuf>,
    },
    /// List a specialist's documents
    Docs(String),
    /// Print the command list
    Help,
    /// Exit
    Quit,
}

/// Why a command line was not understood
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// `/name` is not a command
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    /// Arguments are missing
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Command summary printed by `/help`
pub const HELP: &str = "\
/new                          start a new conversation
/history                      list previous conversations
/open <id>                    show a previous conversation
/upload <specialist> <files>  upload documents
/docs <specialist>            list uploaded documents
/quit                         exit";

impl Command {
    /// Parse a line of input
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for unknown commands or missing arguments.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();

        match name {
            "new" => Ok(Self::New),
            "history" => Ok(Self::History),
            "open" => words
                .next()
                .map(|id| Self::Open(ConversationId::new(id)))
                .ok_or(CommandError::Usage("/open <id>")),
            "upload" => {
                let specialist = words
                    .next()
                    .ok_or(CommandError::Usage("/upload <specialist> <files>"))?;
                let paths: Vec<PathBuf> = words.map(PathBuf::from).collect();
                if paths.is_empty() {
                    return Err(CommandError::Usage("/upload <specialist> <files>"));
                }
                Ok(Self::Upload {
                    specialist: specialist.to_string(),
                    paths,
                })
            }
            "docs" => words
                .next()
                .map(|s| Self::Docs(s.to_string()))
                .ok_or(CommandError::Usage("/docs <specialist>")),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
