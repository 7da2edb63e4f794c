//! Away-session state machine and inbound message routing
//!
//! The [`AwaySessionManager`] owns the away/back transition, the identity
//! of the active session, and the routing of inbound messages through the
//! ledger and reply suppressor. It is the single writer of the "active
//! session" pointer.
//!
//! # Concurrency
//!
//! The active-session pointer lives behind an async `RwLock`: message
//! handlers hold read guards for the duration of their processing, and the
//! away/back transitions take the write guard. Acquiring the write guard
//! therefore acts as the transition barrier: in-flight handlers drain (and
//! their activity is included in the summary), handlers arriving afterwards
//! observe the new state. Per-conversation work is serialized by a keyed
//! mutex so a suspended store write or transport send never blocks
//! unrelated conversations.

use crate::command::Command;
use crate::config::Config;
use crate::engine::ledger::ActivityLedger;
use crate::engine::summary::{Summary, SummaryBuilder};
use crate::engine::suppressor::ReplySuppressor;
use crate::error::{AwaybotError, Result};
use crate::storage::{SqliteStore, StoredAwaySession};
use crate::transport::{send_with_retry, InboundMessage, Transport};
use chrono::Utc;
use metrics::increment_counter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Generate a new away-session id (ULID, lexicographically sortable).
pub fn new_session_id() -> String {
    Ulid::new().to_string()
}

/// Owner of the away/back state machine for one controlled account
pub struct AwaySessionManager {
    store: Arc<SqliteStore>,
    ledger: ActivityLedger,
    suppressor: ReplySuppressor,
    summary_builder: SummaryBuilder,
    transport: Arc<dyn Transport>,
    config: Arc<Config>,
    management_room: String,
    /// Active session pointer. Write guard = transition barrier.
    active: RwLock<Option<StoredAwaySession>>,
    /// Per-conversation serialization for the record/claim/send path.
    conversation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AwaySessionManager {
    /// Create a manager, restoring any active session from the store.
    ///
    /// A session left active by a previous process (crash while away)
    /// resumes seamlessly: its ledger and replied flags are durable.
    pub fn new(
        store: Arc<SqliteStore>,
        transport: Arc<dyn Transport>,
        config: Arc<Config>,
        management_room: String,
    ) -> Result<Self> {
        let restored = store.active_session()?;
        if let Some(session) = &restored {
            info!(session_id = %session.id, "Resuming active away session");
        }

        let ledger = ActivityLedger::new(store.clone());
        Ok(Self {
            suppressor: ReplySuppressor::new(store.clone()),
            summary_builder: SummaryBuilder::new(ledger.clone()),
            ledger,
            store,
            transport,
            config,
            management_room,
            active: RwLock::new(restored),
            conversation_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The conversation used for commands and summaries.
    pub fn management_room(&self) -> &str {
        &self.management_room
    }

    /// Whether an away session is currently active.
    ///
    /// Consistent with the last completed transition: transitions hold the
    /// write guard, so a read never observes a half-applied state.
    pub async fn is_away(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Start an away session.
    ///
    /// # Errors
    ///
    /// Returns the benign [`AwaybotError::AlreadyAway`] (carrying the
    /// active session id) when a session is already active; the existing
    /// session is left untouched.
    pub async fn set_away(&self) -> Result<StoredAwaySession> {
        let mut active = self.active.write().await;

        if let Some(existing) = &*active {
            return Err(AwaybotError::AlreadyAway(existing.id.clone()).into());
        }

        let session = StoredAwaySession {
            id: new_session_id(),
            started_at: Utc::now(),
            ended_at: None,
        };
        self.store.create_session(&session.id, session.started_at)?;
        *active = Some(session.clone());

        increment_counter!("awaybot_sessions_started_total");
        info!(session_id = %session.id, "Account marked away");
        Ok(session)
    }

    /// End the away session and build the return summary.
    ///
    /// The write guard makes this a whole-session barrier: every inbound
    /// handler that was already in flight completes first and is included
    /// in the summary; messages arriving afterwards see the Present state.
    /// The transition completes even when the summary cannot be built; in
    /// that case the closed session's activity is left in place and
    /// [`AwaybotError::SummaryUnavailable`] is returned for reporting.
    ///
    /// # Errors
    ///
    /// Returns the benign [`AwaybotError::NotAway`] when no session is
    /// active.
    pub async fn set_back(&self) -> Result<Summary> {
        let mut active = self.active.write().await;

        let Some(session) = active.take() else {
            return Err(AwaybotError::NotAway.into());
        };

        // Close the session before anything fallible: the account must
        // never stay stuck "away" because a later step failed.
        let ended_at = Utc::now();
        if let Err(e) = self.store.close_session(&session.id, ended_at) {
            // The in-memory pointer is already cleared; the stale row is
            // superseded the next time a session is created.
            warn!(session_id = %session.id, error = %e, "Failed to persist session close");
        }
        drop(active);

        increment_counter!("awaybot_sessions_ended_total");
        info!(session_id = %session.id, "Account marked back");

        // No activity can be added for the closed session anymore; building
        // the summary outside the lock keeps the barrier short.
        self.summary_builder.build(&session.id)
    }

    /// Handle one inbound message from the transport.
    ///
    /// Management-room messages are interpreted as commands; everything
    /// else goes through the away routing path.
    pub async fn handle_inbound(&self, msg: InboundMessage) -> Result<()> {
        if msg.conversation_id == self.management_room {
            self.handle_command(&msg).await
        } else {
            self.route_inbound(&msg).await
        }
    }

    /// Route a non-management inbound message.
    ///
    /// No-op unless the account is away and the conversation is direct.
    /// Otherwise the message is recorded in the ledger and, at most once
    /// per conversation per session, answered with the auto-reply.
    pub async fn route_inbound(&self, msg: &InboundMessage) -> Result<()> {
        // Read guard held for the whole handling path: the back transition
        // waits for us, so our activity is included in its summary.
        let active = self.active.read().await;
        let Some(session) = &*active else {
            return Ok(());
        };
        if !msg.is_direct {
            debug!(conversation_id = %msg.conversation_id, "Ignoring non-direct message");
            return Ok(());
        }

        let conversation_lock = self.conversation_lock(&msg.conversation_id).await;
        let _serialized = conversation_lock.lock().await;

        self.ledger.record(
            &session.id,
            &msg.conversation_id,
            msg.timestamp,
            msg.message_id.as_deref(),
        )?;

        if !self.suppressor.should_reply(&session.id, &msg.conversation_id)? {
            return Ok(());
        }

        match send_with_retry(
            self.transport.as_ref(),
            &msg.conversation_id,
            &self.config.reply.message,
            &self.config.send,
        )
        .await
        {
            Ok(ack) => {
                increment_counter!("awaybot_auto_replies_sent_total");
                info!(
                    conversation_id = %msg.conversation_id,
                    message_id = %ack.message_id,
                    "Sent auto-reply"
                );
            }
            Err(e) => {
                increment_counter!("awaybot_auto_replies_failed_total");
                error!(
                    conversation_id = %msg.conversation_id,
                    error = %e,
                    "Auto-reply not delivered, recording failure"
                );
                self.suppressor
                    .mark_failed(&session.id, &msg.conversation_id)?;
            }
        }

        Ok(())
    }

    /// Handle a management-room message.
    async fn handle_command(&self, msg: &InboundMessage) -> Result<()> {
        let Some(command) = Command::parse(&msg.body) else {
            return Ok(());
        };

        debug!(command = ?command, sender = %msg.sender, "Handling management command");

        match command {
            Command::Away => match self.set_away().await {
                Ok(_) => {
                    self.notify("Your status has been updated. Have a nice break!")
                        .await
                }
                Err(e) => self.notify_benign_or_fail(e).await,
            },
            Command::Back => match self.set_back().await {
                Ok(summary) => {
                    let text = format!(
                        "Your status has been updated. Welcome back!\n\n{}",
                        summary.render_markdown()
                    );
                    self.notify(&text).await?;
                    increment_counter!("awaybot_summaries_sent_total");

                    // Retention: discard the activity once the summary has
                    // been delivered, like the original away-state reset.
                    if let Err(e) = self.ledger.clear(&summary.session_id) {
                        warn!(session_id = %summary.session_id, error = %e,
                            "Failed to clear summarized activity");
                    }
                    Ok(())
                }
                Err(e) => match e.downcast::<AwaybotError>() {
                    Ok(AwaybotError::SummaryUnavailable(reason)) => {
                        // The transition completed; only the report is missing.
                        let text = format!(
                            "Your status has been updated. Welcome back!\n\n\
                             The missed-message summary could not be built: {reason}"
                        );
                        self.notify(&text).await
                    }
                    Ok(err) => self.notify_benign_or_fail(err.into()).await,
                    Err(e) => Err(e),
                },
            },
            Command::Status => {
                let text = match &*self.active.read().await {
                    Some(session) => format!(
                        "You are away (since {}, session {}).",
                        session.started_at.format("%Y-%m-%d %H:%M UTC"),
                        session.id
                    ),
                    None => "You are not away.".to_string(),
                };
                self.notify(&text).await
            }
            Command::Clear => {
                let active = self.active.read().await;
                match &*active {
                    Some(session) => {
                        self.ledger.clear(&session.id)?;
                        self.notify("Cleared recorded activity.").await
                    }
                    None => self.notify("No active away session.").await,
                }
            }
            Command::Unknown => self.notify(Command::usage()).await,
        }
    }

    /// Report a benign condition to the operator; propagate anything else.
    async fn notify_benign_or_fail(&self, e: anyhow::Error) -> Result<()> {
        match e.downcast::<AwaybotError>() {
            Ok(AwaybotError::AlreadyAway(_)) => self.notify("You are already marked away.").await,
            Ok(AwaybotError::NotAway) => self.notify("You are not marked away.").await,
            Ok(err) => Err(err.into()),
            Err(e) => Err(e),
        }
    }

    /// Send a message to the management room with the retry policy.
    async fn notify(&self, text: &str) -> Result<()> {
        send_with_retry(
            self.transport.as_ref(),
            &self.management_room,
            text,
            &self.config.send,
        )
        .await
        .map(|_| ())
    }

    async fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.conversation_locks.lock().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
