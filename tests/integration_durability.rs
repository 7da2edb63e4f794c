//! Durability and concurrency tests for the suppressor and session state
//!
//! Simulates process restarts by rebuilding the manager over the same
//! database file, and concurrent delivery by fanning messages out over
//! spawned tasks.

mod common;

use awaybot::engine::AwaySessionManager;
use awaybot::storage::SqliteStore;
use common::{direct_message, test_config, RecordingTransport, MGMT_ROOM};
use std::sync::Arc;
use tempfile::TempDir;

fn manager_over(
    store: Arc<SqliteStore>,
    transport: Arc<RecordingTransport>,
) -> Arc<AwaySessionManager> {
    Arc::new(
        AwaySessionManager::new(
            store,
            transport,
            Arc::new(test_config()),
            MGMT_ROOM.to_string(),
        )
        .expect("failed to create manager"),
    )
}

#[tokio::test]
async fn replied_flag_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("state.db");

    let transport = Arc::new(RecordingTransport::new());
    {
        let store = Arc::new(SqliteStore::new_with_path(&db_path).unwrap());
        let manager = manager_over(store, transport.clone());
        manager.set_away().await.unwrap();
        manager
            .route_inbound(&direct_message("!c1:x", "ping", 1, "$e1"))
            .await
            .unwrap();
    }
    assert_eq!(transport.replied_conversations(), vec!["!c1:x"]);

    // Restart: same database, fresh process state.
    let transport2 = Arc::new(RecordingTransport::new());
    let store = Arc::new(SqliteStore::new_with_path(&db_path).unwrap());
    let manager = manager_over(store, transport2.clone());

    // The away session was restored, and the conversation stays claimed.
    assert!(manager.is_away().await);
    manager
        .route_inbound(&direct_message("!c1:x", "ping again", 2, "$e2"))
        .await
        .unwrap();
    assert!(transport2.replied_conversations().is_empty());

    // Both messages are in the summary.
    let summary = manager.set_back().await.unwrap();
    assert_eq!(summary.lines.len(), 1);
    assert_eq!(summary.lines[0].message_count, 2);
}

#[tokio::test]
async fn session_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("state.db");

    {
        let store = Arc::new(SqliteStore::new_with_path(&db_path).unwrap());
        let manager = manager_over(store, Arc::new(RecordingTransport::new()));
        manager.set_away().await.unwrap();
    }

    let store = Arc::new(SqliteStore::new_with_path(&db_path).unwrap());
    let manager = manager_over(store, Arc::new(RecordingTransport::new()));
    assert!(manager.is_away().await);

    manager.set_back().await.unwrap();

    let store = Arc::new(SqliteStore::new_with_path(&db_path).unwrap());
    let manager = manager_over(store, Arc::new(RecordingTransport::new()));
    assert!(!manager.is_away().await);
}

#[tokio::test]
async fn concurrent_delivery_sends_exactly_one_reply_per_conversation() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new_with_path(dir.path().join("state.db")).unwrap());
    let transport = Arc::new(RecordingTransport::new());
    let manager = manager_over(store, transport.clone());

    manager.set_away().await.unwrap();

    let mut tasks = Vec::new();
    for conversation in ["!c1:x", "!c2:x", "!c3:x"] {
        for i in 0..6 {
            let manager = manager.clone();
            let msg = direct_message(conversation, "ping", i, &format!("${conversation}-{i}"));
            tasks.push(tokio::spawn(async move { manager.route_inbound(&msg).await }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut replied = transport.replied_conversations();
    replied.sort();
    assert_eq!(replied, vec!["!c1:x", "!c2:x", "!c3:x"]);

    let summary = manager.set_back().await.unwrap();
    assert_eq!(summary.lines.len(), 3);
    for line in &summary.lines {
        assert_eq!(line.message_count, 6);
    }
}

#[tokio::test]
async fn back_barrier_includes_in_flight_messages() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new_with_path(dir.path().join("state.db")).unwrap());
    let transport = Arc::new(RecordingTransport::new());
    let manager = manager_over(store, transport.clone());

    manager.set_away().await.unwrap();

    // Fan out deliveries and immediately transition back; every message
    // must either land in the summary or be ignored as Present-state, and
    // none may be double-counted.
    let mut tasks = Vec::new();
    for i in 0..20 {
        let manager = manager.clone();
        let msg = direct_message("!c1:x", "ping", i, &format!("$e{i}"));
        tasks.push(tokio::spawn(async move { manager.route_inbound(&msg).await }));
    }

    let summary = manager.set_back().await.unwrap();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let counted = summary.lines.first().map(|l| l.message_count).unwrap_or(0);
    assert!(counted <= 20);

    // Whatever was not included must not linger: the session is closed
    // and no further summary will contain it.
    assert!(!manager.is_away().await);
}
