//! Configuration management for Awaybot
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{AwaybotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Awaybot
///
/// This structure holds all configuration needed for the bot, including
/// homeserver access, auto-reply behavior, the management room, and send
/// retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Matrix transport configuration
    pub transport: TransportConfig,

    /// Auto-reply behavior configuration
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Management room configuration
    #[serde(default)]
    pub room: RoomConfig,

    /// Outbound send retry policy
    #[serde(default)]
    pub send: SendConfig,

    /// Durable state storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Matrix transport configuration
///
/// Specifies how to reach the homeserver and authenticate against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the Matrix homeserver (e.g. `https://matrix.example.org`)
    pub homeserver: String,

    /// Access token for the controlled account
    ///
    /// May be left empty in the file and supplied via `AWAYBOT_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: String,

    /// Long-poll timeout for `/sync`, in milliseconds
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

fn default_sync_timeout_ms() -> u64 {
    30_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            homeserver: String::new(),
            access_token: String::new(),
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

/// Auto-reply behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Message sent once per direct conversation while away
    #[serde(default = "default_reply_message")]
    pub message: String,
}

fn default_reply_message() -> String {
    "I'm currently away and will get back to you when I return.".to_string()
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            message: default_reply_message(),
        }
    }
}

/// Management room configuration
///
/// The management room is created on first startup if no binding exists,
/// with this display name and avatar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Display name for the management room
    #[serde(default = "default_room_name")]
    pub name: String,

    /// Avatar URL (mxc://) for the management room, if any
    #[serde(default)]
    pub icon: Option<String>,
}

fn default_room_name() -> String {
    "Awaybot".to_string()
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: default_room_name(),
            icon: None,
        }
    }
}

/// Outbound send retry policy
///
/// Applies to auto-replies and summaries. A send is attempted up to
/// `max_attempts` times with exponential backoff and jitter between
/// attempts; each attempt carries its own timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    /// Maximum number of attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,

    /// Base delay for exponential backoff, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout() -> u64 {
    10
}

fn default_backoff_base_ms() -> u64 {
    250
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_seconds: default_attempt_timeout(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Durable state storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Path to the state database file
    ///
    /// Defaults to `state.db` under the user's data directory. The
    /// `AWAYBOT_STATE_DB` environment variable takes precedence over both.
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            transport: TransportConfig::default(),
            reply: ReplyConfig::default(),
            room: RoomConfig::default(),
            send: SendConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AwaybotError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AwaybotError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(homeserver) = std::env::var("AWAYBOT_HOMESERVER") {
            self.transport.homeserver = homeserver;
        }

        if let Ok(token) = std::env::var("AWAYBOT_ACCESS_TOKEN") {
            self.transport.access_token = token;
        }

        if let Ok(message) = std::env::var("AWAYBOT_REPLY_MESSAGE") {
            self.reply.message = message;
        }

        if let Ok(attempts) = std::env::var("AWAYBOT_SEND_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse() {
                self.send.max_attempts = value;
            } else {
                tracing::warn!("Invalid AWAYBOT_SEND_MAX_ATTEMPTS: {}", attempts);
            }
        }

        if let Ok(db_path) = std::env::var("AWAYBOT_STATE_DB") {
            self.storage.path = Some(db_path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(db_path) = &cli.storage_path {
            self.storage.path = Some(db_path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `AwaybotError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.transport.homeserver.is_empty() {
            return Err(
                AwaybotError::Config("transport.homeserver cannot be empty".to_string()).into(),
            );
        }

        if !self.transport.homeserver.starts_with("http://")
            && !self.transport.homeserver.starts_with("https://")
        {
            return Err(AwaybotError::Config(format!(
                "transport.homeserver must be an http(s) URL, got: {}",
                self.transport.homeserver
            ))
            .into());
        }

        if self.reply.message.is_empty() {
            return Err(
                AwaybotError::Config("reply.message cannot be empty".to_string()).into(),
            );
        }

        if self.send.max_attempts == 0 {
            return Err(
                AwaybotError::Config("send.max_attempts must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.send.attempt_timeout_seconds == 0 {
            return Err(AwaybotError::Config(
                "send.attempt_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
