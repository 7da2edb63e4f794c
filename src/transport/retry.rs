//! Bounded retry policy for outbound sends
//!
//! Replies and summaries are sent through [`send_with_retry`], which applies
//! the configured per-attempt timeout and exponential backoff with jitter.
//! When the budget is exhausted the caller receives
//! [`AwaybotError::SendExhausted`] and decides what to record (the engine
//! downgrades the conversation's reply state to `failed`).

use crate::config::SendConfig;
use crate::error::{AwaybotError, Result};
use crate::transport::{Ack, Transport};
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Send a message, retrying transient failures within the configured budget.
///
/// Each attempt is bounded by `policy.attempt_timeout_seconds`; between
/// attempts the delay doubles from `policy.backoff_base_ms` with up to one
/// base-delay of jitter.
///
/// # Errors
///
/// Returns [`AwaybotError::SendExhausted`] after `policy.max_attempts`
/// failed attempts.
pub async fn send_with_retry(
    transport: &dyn Transport,
    conversation_id: &str,
    text: &str,
    policy: &SendConfig,
) -> Result<Ack> {
    let attempt_timeout = Duration::from_secs(policy.attempt_timeout_seconds);
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        match tokio::time::timeout(attempt_timeout, transport.send_message(conversation_id, text))
            .await
        {
            Ok(Ok(ack)) => return Ok(ack),
            Ok(Err(e)) => {
                last_error = e.to_string();
                warn!(
                    conversation_id = %conversation_id,
                    attempt = attempt,
                    error = %last_error,
                    "Send attempt failed"
                );
            }
            Err(_) => {
                last_error = format!("timed out after {}s", policy.attempt_timeout_seconds);
                warn!(
                    conversation_id = %conversation_id,
                    attempt = attempt,
                    "Send attempt timed out"
                );
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(backoff_delay(policy.backoff_base_ms, attempt)).await;
        }
    }

    Err(AwaybotError::SendExhausted {
        conversation_id: conversation_id.to_string(),
        attempts: policy.max_attempts,
        message: last_error,
    }
    .into())
}

/// Exponential backoff with jitter: base * 2^(attempt-1) plus up to one base.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    let jitter = if base_ms > 0 {
        rand::rng().random_range(0..base_ms)
    } else {
        0
    };
    Duration::from_millis(exp + jitter)
}
