//! Behavioral verifiers for provisioned queues.
//!
//! Each verifier drives a [`QueueService`] through one observable behavior
//! and returns `Ok` only when the queue behaved as configured. Setup problems
//! surface as [`ConformanceError`] variants classified as setup errors;
//! behavioral differences surface as [`AssertionFailure`]s.
//!
//! Every message a verifier sends carries a fresh correlation token.
//! Messages without that token are never asserted on and never deleted.

pub mod existence;
pub mod redrive;
pub mod round_trip;

#[cfg(test)]
pub(crate) mod test_support;

pub use existence::{verify_dead_letter_listed, verify_queue_listed};
pub use redrive::{RedriveReport, RedriveState, RedriveVerifier};
pub use round_trip::{RoundTripReport, RoundTripVerifier};

use crate::client::QueueService;
use crate::error::{AssertionFailure, QueueServiceError};
use crate::message::{CorrelationId, ReceivedMessage};
use tracing::warn;

/// Pick the delivery carrying `correlation_id` out of a receive batch.
///
/// Foreign deliveries are dropped without being deleted; they become visible
/// again once their visibility timeout passes.
pub(crate) fn take_correlated(
    messages: Vec<ReceivedMessage>,
    correlation_id: &CorrelationId,
    queue_url: &str,
) -> Option<ReceivedMessage> {
    let mut ours = None;
    let mut foreign = 0usize;

    for message in messages {
        if ours.is_none() && message.belongs_to(correlation_id) {
            ours = Some(message);
        } else {
            foreign += 1;
        }
    }

    if foreign > 0 {
        warn!(
            queue_url = %queue_url,
            foreign,
            correlation_id = %correlation_id,
            "Ignoring deliveries not sent by this scenario"
        );
    }

    ours
}

/// Receive once and report whether our message came back
pub(crate) async fn receive_correlated(
    service: &dyn QueueService,
    queue_url: &str,
    correlation_id: &CorrelationId,
) -> Result<Option<ReceivedMessage>, QueueServiceError> {
    let messages = service.receive_messages(queue_url).await?;
    Ok(take_correlated(messages, correlation_id, queue_url))
}

pub(crate) fn assert_body(expected: &str, received: &ReceivedMessage) -> Result<(), AssertionFailure> {
    if received.body == expected {
        Ok(())
    } else {
        Err(AssertionFailure::BodyMismatch {
            expected: expected.to_string(),
            actual: received.body.clone(),
        })
    }
}
