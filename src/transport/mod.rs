//! Chat transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait the engine uses to talk to
//! the chat network. Concrete implementations live in submodules:
//!
//! - [`matrix::MatrixTransport`] -- Matrix Client-Server API over HTTP
//!   (long-poll `/sync` for inbound events, `PUT` with transaction ids for
//!   outbound sends).
//! - [`fake::FakeTransport`] -- in-process fake used in tests (cfg(test)
//!   only).
//!
//! Outbound sends are wrapped by [`retry::send_with_retry`], which applies
//! the configured per-attempt timeout and bounded exponential backoff.
//!
//! # Design
//!
//! The trait is intentionally minimal: the engine receives inbound messages
//! one batch at a time via `next_events`, and sends plain text. Delivery is
//! at-least-once at this boundary; the engine's ledger and suppressor are
//! responsible for deduplication and at-most-once replies.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod matrix;
pub mod retry;

#[cfg(test)]
pub mod fake;

pub use retry::send_with_retry;

/// One inbound chat message as delivered by the transport
///
/// `message_id` is the transport's stable identifier for the message and is
/// used by the ledger to deduplicate redeliveries. `is_direct` is resolved
/// by the transport (for Matrix, from `m.direct` account data).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Stable per-message identifier, when the transport provides one
    pub message_id: Option<String>,
    /// Conversation (room) the message arrived in
    pub conversation_id: String,
    /// Sender of the message
    pub sender: String,
    /// Message body text
    pub body: String,
    /// Delivery timestamp
    pub timestamp: DateTime<Utc>,
    /// Whether the conversation is a two-party direct conversation
    pub is_direct: bool,
}

/// Acknowledgement for a successfully sent message
#[derive(Debug, Clone)]
pub struct Ack {
    /// Identifier the transport assigned to the sent message
    pub message_id: String,
}

/// Abstraction over chat transport implementations
///
/// All methods take `&self`; implementations use interior mutability for
/// connection state (e.g. the Matrix sync token) so the engine can share
/// the transport behind an `Arc` between the event loop and send paths.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The chat account this transport is authenticated as.
    async fn account_id(&self) -> Result<String>;

    /// Send a plain-text message to a conversation.
    ///
    /// A single attempt; callers wanting the configured retry policy go
    /// through [`retry::send_with_retry`].
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Ack>;

    /// Create the management room for the account and return its id.
    ///
    /// Called once, when no binding exists yet; the engine persists the
    /// returned id.
    async fn create_management_room(&self) -> Result<String>;

    /// Wait for and return the next batch of inbound messages.
    ///
    /// Returns an empty batch on a quiet long-poll cycle. Delivery is
    /// at-least-once: the same message may be returned again after
    /// transient failures.
    async fn next_events(&self) -> Result<Vec<InboundMessage>>;
}
