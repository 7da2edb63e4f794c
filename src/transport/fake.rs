//! In-process fake transport for unit tests
//!
//! Provides [`FakeTransport`] and [`FakeTransportHandle`], an in-process
//! pair that replaces real network I/O in tests.
//!
//! Call [`FakeTransport::new`] to obtain a `(FakeTransport, FakeTransportHandle)`
//! pair. Wire the [`FakeTransport`] into the code under test. From the test
//! side, use the [`FakeTransportHandle`] to:
//!
//! - Read what the engine sent: `handle.outbound_rx.recv().await`
//! - Inject inbound message batches: `handle.inbound_tx.send(batch)`
//!
//! Sends can be made to fail with [`FakeTransport::set_fail_sends`] to
//! exercise the retry and reply-failure paths.

use crate::error::{AwaybotError, Result};
use crate::transport::{Ack, InboundMessage, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};

/// One message captured from the engine's send path
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub conversation_id: String,
    pub text: String,
}

/// In-process fake transport for use in tests
pub struct FakeTransport {
    account: String,
    outbound_tx: mpsc::UnboundedSender<SentMessage>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Vec<InboundMessage>>>,
    fail_sends: AtomicBool,
    send_seq: AtomicU64,
}

/// Test-side handle complementing [`FakeTransport`]
pub struct FakeTransportHandle {
    /// Messages the engine sent, in order.
    pub outbound_rx: mpsc::UnboundedReceiver<SentMessage>,
    /// Inject inbound batches for `next_events` to return.
    pub inbound_tx: mpsc::UnboundedSender<Vec<InboundMessage>>,
}

impl FakeTransport {
    /// Create a new `(FakeTransport, FakeTransportHandle)` pair.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            account: "@bot:example.org".to_string(),
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            fail_sends: AtomicBool::new(false),
            send_seq: AtomicU64::new(0),
        };

        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
        };

        (transport, handle)
    }

    /// Make subsequent `send_message` calls fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn account_id(&self) -> Result<String> {
        Ok(self.account.clone())
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Ack> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AwaybotError::Transport("fake send failure".into()).into());
        }

        let _ = self.outbound_tx.send(SentMessage {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
        });

        let seq = self.send_seq.fetch_add(1, Ordering::SeqCst);
        Ok(Ack {
            message_id: format!("$fake{seq}"),
        })
    }

    async fn create_management_room(&self) -> Result<String> {
        Ok("!mgmt:example.org".to_string())
    }

    async fn next_events(&self) -> Result<Vec<InboundMessage>> {
        match self.inbound_rx.lock().await.recv().await {
            Some(batch) => Ok(batch),
            // Handle dropped: quiet forever.
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn captures_outbound_messages() {
        let (transport, mut handle) = FakeTransport::new();

        transport.send_message("!c:x", "hello").await.unwrap();

        let sent = handle.outbound_rx.recv().await.unwrap();
        assert_eq!(sent.conversation_id, "!c:x");
        assert_eq!(sent.text, "hello");
    }

    #[tokio::test]
    async fn delivers_injected_batches() {
        let (transport, handle) = FakeTransport::new();

        handle
            .inbound_tx
            .send(vec![InboundMessage {
                message_id: Some("$e1".to_string()),
                conversation_id: "!c:x".to_string(),
                sender: "@alice:example.org".to_string(),
                body: "hi".to_string(),
                timestamp: Utc::now(),
                is_direct: true,
            }])
            .unwrap();

        let batch = transport.next_events().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].conversation_id, "!c:x");
    }

    #[tokio::test]
    async fn failing_sends_return_error() {
        let (transport, _handle) = FakeTransport::new();
        transport.set_fail_sends(true);
        assert!(transport.send_message("!c:x", "hello").await.is_err());
    }
}
