//! Shared helpers for integration tests

use async_trait::async_trait;
use awaybot::config::{Config, SendConfig, TransportConfig};
use awaybot::engine::AwaySessionManager;
use awaybot::error::{AwaybotError, Result};
use awaybot::storage::SqliteStore;
use awaybot::transport::{Ack, InboundMessage, Transport};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[allow(dead_code)]
pub const MGMT_ROOM: &str = "!mgmt:example.org";

/// Transport that records outbound sends for inspection.
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
    seq: AtomicU64,
}

impl RecordingTransport {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of `(conversation_id, text)` pairs sent so far.
    #[allow(dead_code)]
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Conversation ids that received an auto-reply (non-management sends).
    #[allow(dead_code)]
    pub fn replied_conversations(&self) -> Vec<String> {
        self.sent_messages()
            .into_iter()
            .filter(|(conversation, _)| conversation != MGMT_ROOM)
            .map(|(conversation, _)| conversation)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn account_id(&self) -> Result<String> {
        Ok("@bot:example.org".to_string())
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Ack> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AwaybotError::Transport("simulated send failure".into()).into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), text.to_string()));
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        Ok(Ack {
            message_id: format!("$sent{seq}"),
        })
    }

    async fn create_management_room(&self) -> Result<String> {
        Ok(MGMT_ROOM.to_string())
    }

    async fn next_events(&self) -> Result<Vec<InboundMessage>> {
        Ok(Vec::new())
    }
}

/// Fast-failing send policy so failure tests don't wait on backoff.
#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.transport = TransportConfig {
        homeserver: "https://matrix.example.org".to_string(),
        access_token: "syt_test".to_string(),
        sync_timeout_ms: 1_000,
    };
    config.send = SendConfig {
        max_attempts: 2,
        attempt_timeout_seconds: 1,
        backoff_base_ms: 1,
    };
    config
}

/// Build a manager over a fresh temp store and recording transport.
#[allow(dead_code)]
pub fn build_manager() -> (
    TempDir,
    Arc<SqliteStore>,
    Arc<RecordingTransport>,
    Arc<AwaySessionManager>,
) {
    let dir = TempDir::new().expect("failed to create tempdir");
    let store = Arc::new(
        SqliteStore::new_with_path(dir.path().join("state.db"))
            .expect("failed to create sqlite store"),
    );
    let transport = Arc::new(RecordingTransport::new());
    let manager = AwaySessionManager::new(
        store.clone(),
        transport.clone(),
        Arc::new(test_config()),
        MGMT_ROOM.to_string(),
    )
    .expect("failed to create manager");
    (dir, store, transport, Arc::new(manager))
}

/// A direct message with a stable message id.
#[allow(dead_code)]
pub fn direct_message(conversation: &str, body: &str, secs: i64, id: &str) -> InboundMessage {
    InboundMessage {
        message_id: Some(id.to_string()),
        conversation_id: conversation.to_string(),
        sender: "@alice:example.org".to_string(),
        body: body.to_string(),
        timestamp: at(secs),
        is_direct: true,
    }
}

/// A management-room message (command channel).
#[allow(dead_code)]
pub fn management_message(body: &str) -> InboundMessage {
    InboundMessage {
        message_id: Some(format!("$cmd-{body}")),
        conversation_id: MGMT_ROOM.to_string(),
        sender: "@owner:example.org".to_string(),
        body: body.to_string(),
        timestamp: Utc::now(),
        is_direct: false,
    }
}

#[allow(dead_code)]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}
