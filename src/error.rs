//! Error types for Awaybot
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Awaybot operations
///
/// This enum encompasses all possible errors that can occur during
/// away-session handling, storage access, transport interactions, and
/// configuration loading.
#[derive(Error, Debug)]
pub enum AwaybotError {
    /// The account is already marked away; carries the active session id.
    ///
    /// Benign: reported to the operator, no state change.
    #[error("Already away (session {0})")]
    AlreadyAway(String),

    /// A back transition was requested while no away session is active.
    ///
    /// Benign: reported to the operator, no state change.
    #[error("Not currently away")]
    NotAway,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable state storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transport-level errors (sync, authentication, room management)
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outbound send failed after exhausting its retry budget
    #[error("Send to {conversation_id} failed after {attempts} attempts: {message}")]
    SendExhausted {
        /// The conversation the send was addressed to
        conversation_id: String,
        /// Number of attempts made before giving up
        attempts: u32,
        /// Last error observed
        message: String,
    },

    /// The return summary could not be built from the ledger
    ///
    /// The away-to-present transition still completes; this error is
    /// surfaced to the operator through the management room.
    #[error("Summary unavailable: {0}")]
    SummaryUnavailable(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AwaybotError {
    /// Whether this error is a benign status report rather than a failure.
    ///
    /// Benign errors (`AlreadyAway`, `NotAway`) are echoed back to the
    /// operator and must never abort the event loop.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadyAway(_) | Self::NotAway)
    }
}

/// Result type alias for Awaybot operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
