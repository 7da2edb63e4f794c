//! Activity ledger for the current away session
//!
//! Append-only per-conversation record of message activity observed while
//! away. Entries are aggregated per (session, conversation) pair: repeated
//! messages extend the timestamp range and bump the count rather than
//! creating new rows.

use crate::error::Result;
use crate::storage::{ConversationActivity, SqliteStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Ledger of direct-conversation activity during an away session
#[derive(Clone)]
pub struct ActivityLedger {
    store: Arc<SqliteStore>,
}

impl ActivityLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Record one message's activity.
    ///
    /// Idempotent under at-least-once redelivery when the transport supplies
    /// a stable `message_id`: an id already recorded for the session is a
    /// no-op. Without an id, every call counts.
    ///
    /// # Returns
    ///
    /// `true` if the message was counted, `false` for a deduplicated
    /// redelivery.
    pub fn record(
        &self,
        session_id: &str,
        conversation_id: &str,
        timestamp: DateTime<Utc>,
        message_id: Option<&str>,
    ) -> Result<bool> {
        let counted = self
            .store
            .record_activity(session_id, conversation_id, timestamp, message_id)?;

        if counted {
            metrics::increment_counter!("awaybot_messages_recorded_total");
            tracing::debug!(
                session_id = %session_id,
                conversation_id = %conversation_id,
                "Recorded activity"
            );
        } else {
            tracing::debug!(
                session_id = %session_id,
                conversation_id = %conversation_id,
                message_id = ?message_id,
                "Ignored redelivered message"
            );
        }

        Ok(counted)
    }

    /// All activity for a session, ordered by first activity ascending.
    pub fn entries_for(&self, session_id: &str) -> Result<Vec<ConversationActivity>> {
        self.store.entries_for(session_id)
    }

    /// Irreversibly discard a session's activity and seen-message ids.
    pub fn clear(&self, session_id: &str) -> Result<()> {
        self.store.clear_activity(session_id)?;
        tracing::info!(session_id = %session_id, "Cleared session activity");
        Ok(())
    }
}
