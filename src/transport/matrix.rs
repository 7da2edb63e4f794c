//! Matrix Client-Server API transport
//!
//! Talks to a Matrix homeserver over plain HTTP: long-poll `/sync` for
//! inbound events, `PUT` with client-generated transaction ids for outbound
//! sends, and `createRoom` for the management room. Direct-conversation
//! detection reads the account's `m.direct` account data.

use crate::config::{RoomConfig, TransportConfig};
use crate::error::{AwaybotError, Result};
use crate::transport::{Ack, InboundMessage, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Matrix transport using the Client-Server API
pub struct MatrixTransport {
    homeserver: String,
    access_token: String,
    sync_timeout_ms: u64,
    room_config: RoomConfig,
    client: Client,
    /// Sync token; None until the initial sync has completed.
    since: RwLock<Option<String>>,
    /// Cached user id of the controlled account.
    own_user: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: Rooms,
}

#[derive(Debug, Deserialize, Default)]
struct Rooms {
    #[serde(default)]
    join: HashMap<String, JoinedRoom>,
}

#[derive(Debug, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Deserialize, Default)]
struct Timeline {
    #[serde(default)]
    events: Vec<TimelineEvent>,
}

#[derive(Debug, Deserialize)]
struct TimelineEvent {
    #[serde(rename = "type")]
    event_type: String,
    sender: String,
    #[serde(default)]
    content: EventContent,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    origin_server_ts: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct EventContent {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    msgtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhoAmIResponse {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    event_id: String,
}

impl MatrixTransport {
    /// Create a new Matrix transport.
    pub fn new(transport: &TransportConfig, room: &RoomConfig) -> Self {
        let homeserver = transport.homeserver.trim_end_matches('/').to_string();
        Self {
            homeserver,
            access_token: transport.access_token.clone(),
            sync_timeout_ms: transport.sync_timeout_ms,
            room_config: room.clone(),
            client: Client::new(),
            since: RwLock::new(None),
            own_user: RwLock::new(None),
        }
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn whoami(&self) -> Result<String> {
        if let Some(user_id) = self.own_user.read().await.clone() {
            return Ok(user_id);
        }

        let url = format!("{}/_matrix/client/v3/account/whoami", self.homeserver);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| AwaybotError::Transport(format!("whoami failed: {e}")))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(AwaybotError::Transport(format!("whoami rejected: {err}")).into());
        }

        let who: WhoAmIResponse = resp
            .json()
            .await
            .map_err(|e| AwaybotError::Transport(format!("Failed to parse whoami: {e}")))?;

        *self.own_user.write().await = Some(who.user_id.clone());
        Ok(who.user_id)
    }

    /// Fetch the set of rooms marked as direct conversations.
    ///
    /// Reads `m.direct` account data, which maps peer user ids to lists of
    /// room ids. A missing event (404) means no DMs are marked.
    async fn direct_rooms(&self) -> Result<HashSet<String>> {
        let user_id = self.whoami().await?;
        let url = format!(
            "{}/_matrix/client/v3/user/{}/account_data/m.direct",
            self.homeserver, user_id
        );

        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| AwaybotError::Transport(format!("m.direct fetch failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(HashSet::new());
        }

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(AwaybotError::Transport(format!("m.direct rejected: {err}")).into());
        }

        let data: HashMap<String, Vec<String>> = resp
            .json()
            .await
            .map_err(|e| AwaybotError::Transport(format!("Failed to parse m.direct: {e}")))?;

        Ok(data.into_values().flatten().collect())
    }

    async fn sync_once(&self, since: Option<&str>) -> Result<SyncResponse> {
        let url = match since {
            Some(since) => format!(
                "{}/_matrix/client/v3/sync?since={}&timeout={}",
                self.homeserver, since, self.sync_timeout_ms
            ),
            // Initial sync: only fetch a minimal timeline to obtain a token,
            // so messages sent before startup are not replayed.
            None => format!(
                "{}/_matrix/client/v3/sync?timeout=0&filter={{\"room\":{{\"timeline\":{{\"limit\":1}}}}}}",
                self.homeserver
            ),
        };

        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| AwaybotError::Transport(format!("sync failed: {e}")))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(AwaybotError::Transport(format!("sync rejected: {err}")).into());
        }

        resp.json()
            .await
            .map_err(|e| AwaybotError::Transport(format!("Failed to parse sync: {e}")).into())
    }
}

#[async_trait]
impl Transport for MatrixTransport {
    async fn account_id(&self) -> Result<String> {
        self.whoami().await
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Ack> {
        // Client-generated transaction id: the homeserver deduplicates
        // retransmissions of the same transaction.
        let txn_id = Uuid::new_v4().to_string();
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            self.homeserver, conversation_id, txn_id
        );

        let body = serde_json::json!({
            "msgtype": "m.text",
            "body": text
        });

        let resp = self
            .client
            .put(&url)
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(|e| AwaybotError::Transport(format!("send error: {e}")))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(AwaybotError::Transport(format!("send rejected: {err}")).into());
        }

        let sent: SendResponse = resp
            .json()
            .await
            .map_err(|e| AwaybotError::Transport(format!("Failed to parse send response: {e}")))?;

        Ok(Ack {
            message_id: sent.event_id,
        })
    }

    async fn create_management_room(&self) -> Result<String> {
        let mut initial_state = vec![serde_json::json!({
            "type": "m.room.encryption",
            "content": { "algorithm": "m.megolm.v1.aes-sha2" }
        })];

        if let Some(icon) = &self.room_config.icon {
            initial_state.push(serde_json::json!({
                "type": "m.room.avatar",
                "content": { "url": icon }
            }));
        }

        let body = serde_json::json!({
            "name": self.room_config.name,
            "preset": "private_chat",
            "initial_state": initial_state,
        });

        let url = format!("{}/_matrix/client/v3/createRoom", self.homeserver);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(|e| AwaybotError::Transport(format!("createRoom failed: {e}")))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(AwaybotError::Transport(format!("createRoom rejected: {err}")).into());
        }

        let created: CreateRoomResponse = resp
            .json()
            .await
            .map_err(|e| AwaybotError::Transport(format!("Failed to parse createRoom: {e}")))?;

        tracing::info!(room_id = %created.room_id, "Created management room");
        Ok(created.room_id)
    }

    async fn next_events(&self) -> Result<Vec<InboundMessage>> {
        let since = self.since.read().await.clone();

        let sync = self.sync_once(since.as_deref()).await?;
        let first_sync = since.is_none();
        *self.since.write().await = Some(sync.next_batch.clone());

        // The initial sync only establishes the token.
        if first_sync {
            return Ok(Vec::new());
        }

        let own_user = self.whoami().await?;

        let mut raw = Vec::new();
        for (room_id, room) in sync.rooms.join {
            for event in room.timeline.events {
                if event.sender == own_user {
                    continue;
                }
                if event.event_type != "m.room.message" {
                    continue;
                }
                if event.content.msgtype.as_deref() != Some("m.text") {
                    continue;
                }
                let Some(body) = event.content.body else {
                    continue;
                };

                let timestamp = event
                    .origin_server_ts
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .unwrap_or_else(Utc::now);

                raw.push((room_id.clone(), event.sender, event.event_id, body, timestamp));
            }
        }

        if raw.is_empty() {
            return Ok(Vec::new());
        }

        // One m.direct lookup per batch that actually contains messages.
        let direct = self.direct_rooms().await?;

        Ok(raw
            .into_iter()
            .map(
                |(conversation_id, sender, message_id, body, timestamp)| InboundMessage {
                    is_direct: direct.contains(&conversation_id),
                    message_id,
                    conversation_id,
                    sender,
                    body,
                    timestamp,
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_transport() -> MatrixTransport {
        MatrixTransport::new(
            &TransportConfig {
                homeserver: "https://matrix.example.org".to_string(),
                access_token: "syt_test_token".to_string(),
                sync_timeout_ms: 30_000,
            },
            &RoomConfig::default(),
        )
    }

    #[test]
    fn creates_with_correct_fields() {
        let transport = make_transport();
        assert_eq!(transport.homeserver, "https://matrix.example.org");
        assert_eq!(transport.sync_timeout_ms, 30_000);
    }

    #[test]
    fn strips_trailing_slash() {
        let transport = MatrixTransport::new(
            &TransportConfig {
                homeserver: "https://matrix.example.org/".to_string(),
                access_token: "tok".to_string(),
                sync_timeout_ms: 1_000,
            },
            &RoomConfig::default(),
        );
        assert_eq!(transport.homeserver, "https://matrix.example.org");
    }

    #[test]
    fn parses_sync_response() {
        let json = r#"{
            "next_batch": "s72595_4483_1934",
            "rooms": {
                "join": {
                    "!room:example.org": {
                        "timeline": {
                            "events": [{
                                "type": "m.room.message",
                                "sender": "@alice:example.org",
                                "event_id": "$evt1",
                                "origin_server_ts": 1700000000000,
                                "content": {"msgtype": "m.text", "body": "hi"}
                            }]
                        }
                    }
                }
            }
        }"#;
        let sync: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(sync.next_batch, "s72595_4483_1934");
        let room = &sync.rooms.join["!room:example.org"];
        assert_eq!(room.timeline.events.len(), 1);
        assert_eq!(room.timeline.events[0].sender, "@alice:example.org");
    }

    #[test]
    fn parses_sync_response_without_rooms() {
        let sync: SyncResponse = serde_json::from_str(r#"{"next_batch": "s1"}"#).unwrap();
        assert!(sync.rooms.join.is_empty());
    }
}
