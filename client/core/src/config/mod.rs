//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client, supporting a TOML file at
//! `~/.config/bjorn/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables (`BJORN_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/bjorn/client.toml` (typically `~/.config/bjorn/client.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! url = "http://localhost:8080"
//! request_timeout_secs = 30
//! knowledge_base_id = "rh"
//! conversation_title = "Conversa Bjorn AI"
//!
//! [polling]
//! interval_ms = 1000
//! max_attempts = 30
//!
//! [composer]
//! max_message_length = 500
//!
//! [storage]
//! path = "/home/me/.local/share/bjorn/storage.json"
//! max_previous_conversations = 10
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::composer::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::polling::PollConfig;
use crate::storage::{default_storage_path, DEFAULT_MAX_PREVIOUS_CONVERSATIONS};

/// Backend used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Title given to new conversations
pub const DEFAULT_CONVERSATION_TITLE: &str = "Conversa Bjorn AI";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the backend
    pub url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Knowledge base attached to new conversations
    pub knowledge_base_id: Option<String>,

    /// Title of new conversations
    pub conversation_title: Option<String>,
}

/// Polling section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingToml {
    /// Spacing between polls in milliseconds
    pub interval_ms: Option<u64>,

    /// Polls before giving up on a reply
    pub max_attempts: Option<u32>,
}

/// Composer section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerToml {
    /// Maximum message length in characters
    pub max_message_length: Option<usize>,
}

/// Storage section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Storage file path
    pub path: Option<PathBuf>,

    /// Length of the previous conversation list
    pub max_previous_conversations: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Polling configuration section
    pub polling: PollingToml,

    /// Composer configuration section
    pub composer: ComposerToml,

    /// Storage configuration section
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved backend settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL of the backend
    pub url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Knowledge base attached to new conversations
    pub knowledge_base_id: Option<String>,
    /// Title of new conversations
    pub conversation_title: String,
}

impl BackendConfig {
    /// Per-request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            knowledge_base_id: None,
            conversation_title: DEFAULT_CONVERSATION_TITLE.to_string(),
        }
    }
}

/// Centralized configuration for the client
///
/// This struct consolidates all configuration from multiple sources and tracks
/// where it came from. Use [`load_config`] to load configuration with proper
/// priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfigFile {
    /// Backend settings
    pub backend: BackendConfig,

    /// Polling budget
    pub poll: PollConfig,

    /// Maximum message length in characters
    pub max_message_length: usize,

    /// Storage file path (`None` = platform default)
    pub storage_path: Option<PathBuf>,

    /// Length of the previous conversation list
    pub max_previous_conversations: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfigFile {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            poll: PollConfig::default(),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            storage_path: None,
            max_previous_conversations: DEFAULT_MAX_PREVIOUS_CONVERSATIONS,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfigFile {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Storage file to use, falling back to the platform data directory
    #[must_use]
    pub fn resolved_storage_path(&self) -> Option<PathBuf> {
        self.storage_path.clone().or_else(default_storage_path)
    }

    /// Reject values the engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend url must not be empty".to_string(),
            ));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.poll.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.max_message_length == 0 {
            return Err(ConfigError::ValidationError(
                "max message length must be positive".to_string(),
            ));
        }
        if self.max_previous_conversations == 0 {
            return Err(ConfigError::ValidationError(
                "max previous conversations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/bjorn/client.toml` or
/// `~/.config/bjorn/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("bjorn").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or a
/// resulting value is invalid. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfigFile, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment variables through `env`
fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfigFile, ConfigError> {
    let mut config = ClientConfigFile::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfigFile, toml: &ClientToml) {
    // Backend
    if let Some(ref url) = toml.backend.url {
        config.backend.url.clone_from(url);
    }
    if let Some(timeout) = toml.backend.request_timeout_secs {
        config.backend.request_timeout_secs = timeout;
    }
    if toml.backend.knowledge_base_id.is_some() {
        config.backend.knowledge_base_id.clone_from(&toml.backend.knowledge_base_id);
    }
    if let Some(ref title) = toml.backend.conversation_title {
        config.backend.conversation_title.clone_from(title);
    }

    // Polling
    if let Some(ms) = toml.polling.interval_ms {
        config.poll.interval = Duration::from_millis(ms);
    }
    if let Some(attempts) = toml.polling.max_attempts {
        config.poll.max_attempts = attempts;
    }

    // Composer
    if let Some(length) = toml.composer.max_message_length {
        config.max_message_length = length;
    }

    // Storage
    if toml.storage.path.is_some() {
        config.storage_path.clone_from(&toml.storage.path);
    }
    if let Some(max) = toml.storage.max_previous_conversations {
        config.max_previous_conversations = max;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ClientConfigFile, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env("BJORN_BACKEND_URL") {
        config.backend.url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("BJORN_REQUEST_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.backend.request_timeout_secs = secs;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(kb) = env("BJORN_KNOWLEDGE_BASE_ID") {
        config.backend.knowledge_base_id = (!kb.is_empty()).then_some(kb);
        config.source = ConfigSource::Env;
    }
    if let Some(interval) = env("BJORN_POLL_INTERVAL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.poll.interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(attempts) = env("BJORN_MAX_POLL_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<u32>() {
            config.poll.max_attempts = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(length) = env("BJORN_MAX_MESSAGE_LENGTH") {
        if let Ok(n) = length.parse::<usize>() {
            config.max_message_length = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(path) = env("BJORN_STORAGE_PATH") {
        config.storage_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend URL override
    pub backend_url: Option<String>,

    /// Poll interval override (milliseconds)
    pub poll_interval_ms: Option<u64>,

    /// Storage path override
    pub storage_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend URL override
    #[must_use]
    pub fn with_backend_url(mut self, url: String) -> Self {
        self.backend_url = Some(url);
        self
    }

    /// Set poll interval override
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    /// Set storage path override
    #[must_use]
    pub fn with_storage_path(mut self, path: PathBuf) -> Self {
        self.storage_path = Some(path);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfigFile) {
        if self.backend_url.is_some() || self.poll_interval_ms.is_some() || self.storage_path.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.backend_url {
            config.backend.url.clone_from(url);
        }

        if let Some(ms) = self.poll_interval_ms {
            config.poll.interval = Duration::from_millis(ms);
        }

        if let Some(ref path) = self.storage_path {
            config.storage_path = Some(path.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
