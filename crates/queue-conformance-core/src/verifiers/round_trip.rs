//! Send, receive, delete round trip against the primary queue.

use super::{assert_body, receive_correlated};
use crate::client::QueueService;
use crate::error::{AssertionFailure, ConformanceError};
use crate::message::{CorrelationId, OutgoingMessage, QueueRef};
use crate::polling::PollOutcome;
use crate::settings::RoundTripSettings;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
#[path = "round_trip_tests.rs"]
mod tests;

/// Details of a successful round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripReport {
    pub correlation_id: CorrelationId,
    pub message_id: String,
    /// Receive calls made before the message showed up
    pub receive_attempts: u32,
    /// Time from the first poll until the message showed up
    pub settle_time: Duration,
}

/// Verifies that a sent message is received unchanged and stays gone once deleted
pub struct RoundTripVerifier<'a> {
    service: &'a dyn QueueService,
    queue: &'a QueueRef,
    settings: &'a RoundTripSettings,
}

impl<'a> RoundTripVerifier<'a> {
    pub fn new(
        service: &'a dyn QueueService,
        queue: &'a QueueRef,
        settings: &'a RoundTripSettings,
    ) -> Self {
        Self {
            service,
            queue,
            settings,
        }
    }

    pub async fn run(&self) -> Result<RoundTripReport, ConformanceError> {
        let service = self.service;
        let queue_url = self.queue.url();

        let message = OutgoingMessage::new(self.settings.body.clone());
        let correlation_id = message.correlation_id.clone();
        service.send_message(queue_url, &message).await?;
        info!(queue = %self.queue, correlation_id = %correlation_id, "Sent round-trip message");

        let token = &correlation_id;
        let outcome = self
            .settings
            .settle
            .poll(move |_| async move { receive_correlated(service, queue_url, token).await })
            .await?;

        let (received, receive_attempts, settle_time) = match outcome {
            PollOutcome::Found {
                value,
                attempts,
                elapsed,
            } => (value, attempts, elapsed),
            PollOutcome::Expired { elapsed, .. } => {
                return Err(AssertionFailure::NoMessageReceived {
                    queue_url: queue_url.to_string(),
                    waited: elapsed,
                }
                .into());
            }
        };

        let body_check = assert_body(&self.settings.body, &received);
        let message_id = received.message_id;

        // Delete even on a body mismatch so the message cannot leak into later runs.
        service
            .delete_message(queue_url, received.receipt_handle)
            .await?;
        if let Err(mismatch) = body_check {
            warn!(queue = %self.queue, message_id = %message_id, "Round-trip body mismatch");
            return Err(mismatch.into());
        }

        if let Some(again) = receive_correlated(service, queue_url, token).await? {
            return Err(AssertionFailure::MessageRedelivered {
                queue_url: queue_url.to_string(),
                body: again.body,
            }
            .into());
        }

        info!(
            queue = %self.queue,
            message_id = %message_id,
            receive_attempts,
            settle_ms = settle_time.as_millis() as u64,
            "Round trip verified"
        );

        Ok(RoundTripReport {
            correlation_id,
            message_id,
            receive_attempts,
            settle_time,
        })
    }
}
