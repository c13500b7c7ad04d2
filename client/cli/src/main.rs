//! Bjorn - terminal chat client
//!
//! Line-oriented client for the Bjorn backend. Plain lines are sent as chat
//! messages; lines starting with `/` are commands (see `/help`).
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults
//! bjorn
//!
//! # Custom backend
//! bjorn --backend-url http://bjorn.internal:8080
//!
//! # With config file
//! bjorn --config ~/.config/bjorn/client.toml
//!
//! # Verbose logging
//! RUST_LOG=debug bjorn
//! ```

mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bjorn_client_core::config::{default_config_path, load_config_from_path};
use bjorn_client_core::gateway::{HttpGateway, UploadFile};
use bjorn_client_core::polling::sleep_until_deadline;
use bjorn_client_core::storage::FileStore;
use bjorn_client_core::{
    ConfigOverrides, KnowledgeLibrary, SessionConfig, SessionController, SessionEvent,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use commands::{Command, HELP};
use render::Renderer;

/// Events buffered between the engine and the printer
const EVENT_BUFFER: usize = 256;

/// Storage file used when the platform has no data directory
const FALLBACK_STORAGE_FILE: &str = "bjorn-storage.json";

/// Bjorn - chat with the Bjorn assistant from a terminal
#[derive(Parser, Debug)]
#[command(name = "bjorn")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Backend base URL
    #[arg(short = 'b', long, value_name = "URL")]
    backend_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "BJORN_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Milliseconds between polls while waiting for a reply
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// File holding the active and previous conversation ids
    #[arg(short = 's', long, value_name = "FILE")]
    storage: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.backend_url {
            overrides = overrides.with_backend_url(url.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            overrides = overrides.with_poll_interval_ms(ms);
        }
        if let Some(ref path) = self.storage {
            overrides = overrides.with_storage_path(path.clone());
        }
        overrides
    }
}

/// Initialize logging to stderr so it stays out of the transcript
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bjorn_client_core=info,bjorn=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

type Session = SessionController<HttpGateway, FileStore>;
type Library = KnowledgeLibrary<HttpGateway>;

/// Run one input line; returns `false` when the user asked to quit
async fn handle_line(line: &str, session: &mut Session, library: &mut Library) -> bool {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => {
            println!("! {e}");
            return true;
        }
    };

    match command {
        Command::Say(text) => {
            // Rejections are reported through the event channel
            let _ = session.submit(text).await;
        }
        Command::New => {
            session.start_new_conversation().await;
        }
        Command::History => {
            let previous = session.previous_conversations().await;
            if previous.is_empty() {
                println!("* nenhuma conversa anterior");
            }
            for id in previous {
                println!("  {id}");
            }
        }
        Command::Open(id) => {
            session.load_previous_conversation(&id).await;
        }
        Command::Upload { specialist, paths } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                match UploadFile::from_path(path).await {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        warn!(path = ?path, error = %e, "Cannot read upload file");
                        println!("! não foi possível ler {}: {e}", path.display());
                    }
                }
            }
            library.upload(&specialist, files).await;
        }
        Command::Docs(specialist) => {
            library.refresh(&specialist).await;
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging();

    info!("Bjorn starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(backend = %config.backend.url, source = %config.source(), "Configuration loaded");

    let storage_path = config
        .resolved_storage_path()
        .unwrap_or_else(|| PathBuf::from(FALLBACK_STORAGE_FILE));
    info!(storage_path = ?storage_path, "Storage file");

    let gateway =
        Arc::new(HttpGateway::from_config(&config.backend).context("Invalid backend URL")?);

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);
    let printer = tokio::spawn(async move {
        let mut renderer = Renderer::new();
        while let Some(event) = rx.recv().await {
            for line in renderer.render(&event) {
                println!("{line}");
            }
        }
    });

    let mut session = SessionController::with_shared(
        Arc::clone(&gateway),
        FileStore::open(storage_path).await,
        SessionConfig::from(&config),
        tx.clone(),
    );
    let mut library = KnowledgeLibrary::with_shared(gateway, tx);

    session.ensure_conversation().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read input")? {
                    Some(line) => {
                        if !handle_line(&line, &mut session, &mut library).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            () = sleep_until_deadline(session.next_poll_deadline()) => {
                session.poll_if_due().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.shutdown().await;

    // Dropping the senders lets the printer drain and finish
    drop(session);
    drop(library);
    if let Err(e) = printer.await {
        warn!(error = %e, "Printer task failed");
    }

    info!("Bjorn stopped");
    Ok(())
}
