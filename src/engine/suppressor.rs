//! Reply suppressor: at-most-once auto-reply per conversation per session
//!
//! The suppressor decides whether an incoming message must trigger the
//! auto-reply. The decision is a durable conditional write against the
//! store, so it holds under concurrent delivery and across process
//! restarts. The claim is committed before the send is attempted: a crash
//! between claim and send forfeits that reply rather than risking a
//! duplicate.

use crate::error::Result;
use crate::storage::SqliteStore;
use std::sync::Arc;

/// At-most-once reply gate keyed by (session, conversation)
#[derive(Clone)]
pub struct ReplySuppressor {
    store: Arc<SqliteStore>,
}

impl ReplySuppressor {
    /// Create a suppressor over the given store.
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Claim the auto-reply for a pair.
    ///
    /// Returns `true` for exactly one caller per (session, conversation)
    /// pair, regardless of concurrency or restarts; the winner must send
    /// the reply. The activity row must already exist (the ledger records
    /// before the suppressor is consulted).
    pub fn should_reply(&self, session_id: &str, conversation_id: &str) -> Result<bool> {
        let claimed = self.store.try_claim_reply(session_id, conversation_id)?;
        if claimed {
            tracing::debug!(
                session_id = %session_id,
                conversation_id = %conversation_id,
                "Claimed auto-reply"
            );
        }
        Ok(claimed)
    }

    /// Record that the send budget for a claimed reply was exhausted.
    ///
    /// The conversation's summary line will report the reply as not
    /// delivered.
    pub fn mark_failed(&self, session_id: &str, conversation_id: &str) -> Result<()> {
        self.store.mark_reply_failed(session_id, conversation_id)
    }
}
