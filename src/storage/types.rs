use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One away-to-back interval for the controlled account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAwaySession {
    /// Unique identifier for the session (ULID, lexicographically sortable)
    pub id: String,
    /// When the away session started
    pub started_at: DateTime<Utc>,
    /// When the away session ended; None while active
    pub ended_at: Option<DateTime<Utc>>,
}

impl StoredAwaySession {
    /// Whether this session is still active (no back transition yet).
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Aggregated activity for one direct conversation within one away session
///
/// There is at most one record per (session, conversation) pair; repeated
/// messages update the aggregate instead of creating new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationActivity {
    /// The away session this activity belongs to
    pub session_id: String,
    /// The direct conversation that received messages
    pub conversation_id: String,
    /// Timestamp of the earliest message observed
    pub first_activity_at: DateTime<Utc>,
    /// Timestamp of the latest message observed
    pub last_activity_at: DateTime<Utc>,
    /// Number of messages observed (deduplicated by message id when available)
    pub message_count: u64,
    /// Auto-reply outcome for this conversation
    pub reply_state: ReplyState,
}

/// Auto-reply outcome for a (session, conversation) pair
///
/// `Pending` means no reply has been claimed yet. The transition
/// `Pending -> Sent` is a durable conditional write and happens at most once
/// per pair; `Sent -> Failed` records an exhausted send budget so the
/// summary can report the reply as not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyState {
    Pending,
    Sent,
    Failed,
}

impl ReplyState {
    /// Database representation of the state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parse the database representation. Unknown values map to `Pending`.
    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}
