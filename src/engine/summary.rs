//! Missed-message summary for the back transition
//!
//! When the account owner returns, the summary reports every direct
//! conversation that received a message while they were away, ordered by
//! first activity. Building the summary is a pure read over the ledger.

use crate::engine::ledger::ActivityLedger;
use crate::error::{AwaybotError, Result};
use crate::storage::ReplyState;
use chrono::{DateTime, Utc};

/// One conversation's entry in the return summary
#[derive(Debug, Clone)]
pub struct SummaryLine {
    /// The conversation that received messages
    pub conversation_id: String,
    /// Number of messages missed
    pub message_count: u64,
    /// Earliest missed message
    pub first_activity_at: DateTime<Utc>,
    /// Latest missed message
    pub last_activity_at: DateTime<Utc>,
    /// Whether the auto-reply reached the conversation
    pub reply_delivered: bool,
}

/// Ordered summary of one away session's missed activity
#[derive(Debug, Clone)]
pub struct Summary {
    /// The closed session this summary describes
    pub session_id: String,
    /// Per-conversation lines, ordered by first activity ascending
    pub lines: Vec<SummaryLine>,
}

impl Summary {
    /// Whether any activity was recorded at all.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render the summary as Markdown for the management room.
    ///
    /// Conversation ids are rendered as matrix.to links so compatible
    /// clients can pillify them.
    pub fn render_markdown(&self) -> String {
        if self.is_empty() {
            return "You haven't missed any messages while you were away.".to_string();
        }

        let mut out =
            String::from("While you were away, you missed messages in the following DM(s):\n");
        for line in &self.lines {
            out.push('\n');
            out.push_str(&format!("* {}", render_line(line)));
        }
        out
    }
}

fn render_line(line: &SummaryLine) -> String {
    let mut entry = format!(
        "[{id}](https://matrix.to/#/{id}): {count} {noun}, {first} to {last}",
        id = line.conversation_id,
        count = line.message_count,
        noun = if line.message_count == 1 {
            "message"
        } else {
            "messages"
        },
        first = line.first_activity_at.format("%Y-%m-%d %H:%M UTC"),
        last = line.last_activity_at.format("%Y-%m-%d %H:%M UTC"),
    );
    if !line.reply_delivered {
        entry.push_str(" (auto-reply not delivered)");
    }
    entry
}

/// Builds summaries from the activity ledger
#[derive(Clone)]
pub struct SummaryBuilder {
    ledger: ActivityLedger,
}

impl SummaryBuilder {
    /// Create a builder over the given ledger.
    pub fn new(ledger: ActivityLedger) -> Self {
        Self { ledger }
    }

    /// Build the summary for a session.
    ///
    /// Returns an empty summary when no activity was recorded. A ledger
    /// read failure maps to [`AwaybotError::SummaryUnavailable`]; the
    /// caller completes the back transition regardless.
    pub fn build(&self, session_id: &str) -> Result<Summary> {
        let entries = self
            .ledger
            .entries_for(session_id)
            .map_err(|e| AwaybotError::SummaryUnavailable(e.to_string()))?;

        let lines = entries
            .into_iter()
            .map(|entry| SummaryLine {
                conversation_id: entry.conversation_id,
                message_count: entry.message_count,
                first_activity_at: entry.first_activity_at,
                last_activity_at: entry.last_activity_at,
                reply_delivered: entry.reply_state != ReplyState::Failed,
            })
            .collect();

        Ok(Summary {
            session_id: session_id.to_string(),
            lines,
        })
    }
}
