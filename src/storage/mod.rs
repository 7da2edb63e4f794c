//! Durable state for away sessions, conversation activity, and bindings
//!
//! All engine state that must survive a restart lives here: the away-session
//! rows, the per-conversation activity aggregates (including the replied
//! flag), the seen-message ids used for redelivery deduplication, and the
//! account-to-management-room binding.

use crate::error::{AwaybotError, Result};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

pub mod types;
pub use types::{ConversationActivity, ReplyState, StoredAwaySession};

/// SQLite-backed store for all durable bot state
pub struct SqliteStore {
    db_path: PathBuf,
}

/// Serialize a timestamp for storage.
///
/// Microsecond precision with a fixed width so that lexicographic ordering
/// of the stored text matches chronological ordering.
fn to_db_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AwaybotError::Storage(format!("Invalid stored timestamp {raw:?}: {e}")).into())
}

impl SqliteStore {
    /// Create a new store instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        // Allow override of the state DB path via environment variable, so
        // the binary can be pointed at a test DB or alternate file without
        // changing the user's application data dir.
        if let Ok(override_path) = std::env::var("AWAYBOT_STATE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("org", "awaybot", "awaybot")
            .ok_or_else(|| AwaybotError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        let db_path = data_dir.join("state.db");
        let store = Self { db_path };

        store.init()?;

        Ok(store)
    }

    /// Create a new store instance that uses the specified database path.
    ///
    /// This is primarily useful for tests where the default application data
    /// directory is not desirable (for example, using a temporary directory).
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| AwaybotError::Storage(e.to_string()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS away_sessions (
                id         TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                ended_at   TEXT
            );

            CREATE TABLE IF NOT EXISTS conversation_activity (
                session_id        TEXT NOT NULL,
                conversation_id   TEXT NOT NULL,
                first_activity_at TEXT NOT NULL,
                last_activity_at  TEXT NOT NULL,
                message_count     INTEGER NOT NULL,
                reply_state       TEXT NOT NULL DEFAULT 'pending',
                PRIMARY KEY (session_id, conversation_id)
            );

            CREATE TABLE IF NOT EXISTS seen_messages (
                session_id  TEXT NOT NULL,
                message_id  TEXT NOT NULL,
                PRIMARY KEY (session_id, message_id)
            );

            CREATE TABLE IF NOT EXISTS management_rooms (
                account_id TEXT PRIMARY KEY,
                room_id    TEXT NOT NULL
            );",
        )
        .context("Failed to create tables")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Persist a freshly opened away session
    pub fn create_session(&self, id: &str, started_at: DateTime<Utc>) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO away_sessions (id, started_at, ended_at) VALUES (?, ?, NULL)",
            params![id, to_db_ts(started_at)],
        )
        .context("Failed to insert session")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Fetch the active session, if one exists
    ///
    /// At most one session is active at a time; the newest is returned as a
    /// safeguard should older state ever contain more than one.
    pub fn active_session(&self) -> Result<Option<StoredAwaySession>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, started_at, ended_at FROM away_sessions
                 WHERE ended_at IS NULL ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let id: String = row.get(0)?;
                    let started_at: String = row.get(1)?;
                    let ended_at: Option<String> = row.get(2)?;
                    Ok((id, started_at, ended_at))
                },
            )
            .optional()
            .context("Failed to query active session")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        match row {
            Some((id, started_at, ended_at)) => Ok(Some(StoredAwaySession {
                id,
                started_at: parse_db_ts(&started_at)?,
                ended_at: ended_at.as_deref().map(parse_db_ts).transpose()?,
            })),
            None => Ok(None),
        }
    }

    /// Close an away session by recording its end timestamp
    pub fn close_session(&self, id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE away_sessions SET ended_at = ? WHERE id = ? AND ended_at IS NULL",
            params![to_db_ts(ended_at), id],
        )
        .context("Failed to close session")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List sessions, newest first
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<StoredAwaySession>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, started_at, ended_at FROM away_sessions
                 ORDER BY id DESC LIMIT ?",
            )
            .context("Failed to prepare session listing")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let id: String = row.get(0)?;
                let started_at: String = row.get(1)?;
                let ended_at: Option<String> = row.get(2)?;
                Ok((id, started_at, ended_at))
            })
            .context("Failed to list sessions")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, ended_at) =
                row.map_err(|e| AwaybotError::Storage(e.to_string()))?;
            sessions.push(StoredAwaySession {
                id,
                started_at: parse_db_ts(&started_at)?,
                ended_at: ended_at.as_deref().map(parse_db_ts).transpose()?,
            });
        }
        Ok(sessions)
    }

    /// Record one message's activity for a conversation within a session
    ///
    /// Upserts the aggregate: the first message for the pair creates the row,
    /// later messages extend the timestamp range and bump the count. When a
    /// stable `message_id` is supplied, an id already seen within the session
    /// is a no-op, making the upsert idempotent under at-least-once
    /// redelivery.
    ///
    /// # Returns
    ///
    /// `true` if the message was counted, `false` if it was a duplicate.
    pub fn record_activity(
        &self,
        session_id: &str,
        conversation_id: &str,
        timestamp: DateTime<Utc>,
        message_id: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        if let Some(message_id) = message_id {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO seen_messages (session_id, message_id) VALUES (?, ?)",
                    params![session_id, message_id],
                )
                .context("Failed to record message id")
                .map_err(|e| AwaybotError::Storage(e.to_string()))?;

            if inserted == 0 {
                // Redelivery of a message we already counted.
                tx.commit()
                    .context("Failed to commit transaction")
                    .map_err(|e| AwaybotError::Storage(e.to_string()))?;
                return Ok(false);
            }
        }

        let ts = to_db_ts(timestamp);
        tx.execute(
            "INSERT INTO conversation_activity
                (session_id, conversation_id, first_activity_at, last_activity_at,
                 message_count, reply_state)
             VALUES (?1, ?2, ?3, ?3, 1, 'pending')
             ON CONFLICT(session_id, conversation_id) DO UPDATE SET
                first_activity_at = MIN(conversation_activity.first_activity_at,
                                        excluded.first_activity_at),
                last_activity_at  = MAX(conversation_activity.last_activity_at,
                                        excluded.last_activity_at),
                message_count     = conversation_activity.message_count + 1",
            params![session_id, conversation_id, ts],
        )
        .context("Failed to upsert activity")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        Ok(true)
    }

    /// Fetch all activity for a session, ordered by first activity
    ///
    /// The ordering makes summary generation deterministic.
    pub fn entries_for(&self, session_id: &str) -> Result<Vec<ConversationActivity>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT conversation_id, first_activity_at, last_activity_at,
                        message_count, reply_state
                 FROM conversation_activity
                 WHERE session_id = ?
                 ORDER BY first_activity_at ASC, conversation_id ASC",
            )
            .context("Failed to prepare activity query")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                let conversation_id: String = row.get(0)?;
                let first: String = row.get(1)?;
                let last: String = row.get(2)?;
                let count: i64 = row.get(3)?;
                let reply_state: String = row.get(4)?;
                Ok((conversation_id, first, last, count, reply_state))
            })
            .context("Failed to query activity")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (conversation_id, first, last, count, reply_state) =
                row.map_err(|e| AwaybotError::Storage(e.to_string()))?;
            entries.push(ConversationActivity {
                session_id: session_id.to_string(),
                conversation_id,
                first_activity_at: parse_db_ts(&first)?,
                last_activity_at: parse_db_ts(&last)?,
                message_count: count as u64,
                reply_state: ReplyState::parse(&reply_state),
            });
        }
        Ok(entries)
    }

    /// Discard all activity and seen-message ids for a session
    pub fn clear_activity(&self, session_id: &str) -> Result<()> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        tx.execute(
            "DELETE FROM conversation_activity WHERE session_id = ?",
            params![session_id],
        )
        .context("Failed to clear activity")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        tx.execute(
            "DELETE FROM seen_messages WHERE session_id = ?",
            params![session_id],
        )
        .context("Failed to clear seen messages")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Atomically claim the auto-reply for a (session, conversation) pair
    ///
    /// The conditional write succeeds for exactly one caller per pair:
    /// SQLite serializes writers, so concurrent claims cannot both observe
    /// `pending`. The claim is durable before any send is attempted.
    ///
    /// # Returns
    ///
    /// `true` if this caller won the claim and must send the reply.
    pub fn try_claim_reply(&self, session_id: &str, conversation_id: &str) -> Result<bool> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE conversation_activity SET reply_state = 'sent'
                 WHERE session_id = ? AND conversation_id = ? AND reply_state = 'pending'",
                params![session_id, conversation_id],
            )
            .context("Failed to claim reply")
            .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        Ok(changed == 1)
    }

    /// Record that the reply send budget was exhausted for a pair
    ///
    /// The summary reports such conversations as "reply not delivered".
    pub fn mark_reply_failed(&self, session_id: &str, conversation_id: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE conversation_activity SET reply_state = 'failed'
             WHERE session_id = ? AND conversation_id = ? AND reply_state = 'sent'",
            params![session_id, conversation_id],
        )
        .context("Failed to mark reply failed")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Retrieve the management room bound to an account, if any
    pub fn management_room(&self, account_id: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT room_id FROM management_rooms WHERE account_id = ?",
            params![account_id],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query management room")
        .map_err(|e| AwaybotError::Storage(e.to_string()).into())
    }

    /// Bind a management room to an account
    pub fn store_management_room(&self, account_id: &str, room_id: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO management_rooms (account_id, room_id) VALUES (?, ?)
             ON CONFLICT(account_id) DO UPDATE SET room_id = excluded.room_id",
            params![account_id, room_id],
        )
        .context("Failed to store management room")
        .map_err(|e| AwaybotError::Storage(e.to_string()))?;
        Ok(())
    }
}
