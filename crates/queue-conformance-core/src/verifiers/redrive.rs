//! Dead-letter redrive verification.
//!
//! A message is sent to the primary queue and received without being
//! deleted, so it keeps reappearing after each visibility timeout. Once the
//! receive count passes the redrive threshold the service moves it to the
//! dead-letter queue, where it must show up with the original body.
//!
//! The verifier walks an explicit state machine:
//!
//! ```text
//! Sent -> DeliveredOnce -> RedeliveryAttempted(1..=N) -> ExpectedOnDlq -> Verified
//! ```
//!
//! where `N` is the configured `max_receive_count`.

use super::{assert_body, receive_correlated};
use crate::client::QueueService;
use crate::error::{AssertionFailure, ConformanceError};
use crate::message::{CorrelationId, DeadLetterQueueRef, OutgoingMessage, QueueRef, ReceivedMessage};
use crate::polling::{PollOutcome, PollPolicy};
use crate::settings::RedriveSettings;
use std::fmt;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "redrive_tests.rs"]
mod tests;

/// Progress of a redrive verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedriveState {
    /// Message enqueued on the primary queue
    Sent,
    /// First delivery received and deliberately not deleted
    DeliveredOnce,
    /// Receive attempts made on the primary queue after the first delivery
    RedeliveryAttempted { attempts: u32 },
    /// Threshold passed, the message should now be on the dead-letter queue
    ExpectedOnDlq,
    /// Message found on the dead-letter queue and gone from the primary
    Verified,
}

impl fmt::Display for RedriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::DeliveredOnce => write!(f, "delivered_once"),
            Self::RedeliveryAttempted { attempts } => write!(f, "redelivery_attempted({})", attempts),
            Self::ExpectedOnDlq => write!(f, "expected_on_dlq"),
            Self::Verified => write!(f, "verified"),
        }
    }
}

/// Details of a successful redrive verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedriveReport {
    pub correlation_id: CorrelationId,
    /// Every state the verifier passed through, in order
    pub transitions: Vec<RedriveState>,
    /// How many redelivery attempts actually returned the message
    pub redeliveries_observed: u32,
}

/// Verifies that an unacknowledged message ends up on the dead-letter queue
pub struct RedriveVerifier<'a> {
    service: &'a dyn QueueService,
    queue: &'a QueueRef,
    dead_letter: &'a DeadLetterQueueRef,
    settings: &'a RedriveSettings,
    transitions: Vec<RedriveState>,
}

impl<'a> RedriveVerifier<'a> {
    pub fn new(
        service: &'a dyn QueueService,
        queue: &'a QueueRef,
        dead_letter: &'a DeadLetterQueueRef,
        settings: &'a RedriveSettings,
    ) -> Self {
        Self {
            service,
            queue,
            dead_letter,
            settings,
            transitions: Vec::new(),
        }
    }

    /// The most recent state reached; after a failed run, the last state
    /// completed before the failure
    pub fn state(&self) -> Option<RedriveState> {
        self.transitions.last().copied()
    }

    pub async fn run(&mut self) -> Result<RedriveReport, ConformanceError> {
        let message = OutgoingMessage::new(self.settings.body.clone());
        let correlation_id = message.correlation_id.clone();

        self.service.send_message(self.queue.url(), &message).await?;
        self.advance(RedriveState::Sent);

        let first = self
            .poll_for(self.queue.url(), &correlation_id, &self.settings.first_delivery)
            .await?;
        assert_body(&self.settings.body, &first)?;
        debug!(
            message_id = %first.message_id,
            receive_count = first.receive_count,
            "First delivery received, leaving it unacknowledged"
        );
        // Never acknowledged; the handle is simply discarded.
        drop(first.receipt_handle);
        self.advance(RedriveState::DeliveredOnce);

        let mut redeliveries_observed = 0;
        for attempt in 1..=self.settings.max_receive_count {
            tokio::time::sleep(self.settings.visibility_timeout).await;

            if let Some(again) =
                receive_correlated(self.service, self.queue.url(), &correlation_id).await?
            {
                redeliveries_observed += 1;
                debug!(
                    attempt,
                    receive_count = again.receive_count,
                    "Message redelivered from primary queue"
                );
            }
            self.advance(RedriveState::RedeliveryAttempted { attempts: attempt });
        }

        self.advance(RedriveState::ExpectedOnDlq);
        let dead_lettered = match self
            .poll_for(
                self.dead_letter.url(),
                &correlation_id,
                &self.settings.dead_letter_settle,
            )
            .await
        {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    dead_letter = %self.dead_letter,
                    max_receive_count = self.settings.max_receive_count,
                    redeliveries_observed,
                    "Message did not reach the dead-letter queue; check the redrive policy matches max_receive_count"
                );
                return Err(err);
            }
        };

        let body_check = assert_body(&self.settings.body, &dead_lettered);
        self.service
            .delete_message(self.dead_letter.url(), dead_lettered.receipt_handle)
            .await?;
        body_check?;

        if let Some(leftover) =
            receive_correlated(self.service, self.queue.url(), &correlation_id).await?
        {
            return Err(AssertionFailure::StillOnPrimary {
                queue_url: self.queue.url().to_string(),
                body: leftover.body,
            }
            .into());
        }

        self.advance(RedriveState::Verified);
        info!(
            queue = %self.queue,
            dead_letter = %self.dead_letter,
            redeliveries_observed,
            "Redrive to dead-letter queue verified"
        );

        Ok(RedriveReport {
            correlation_id,
            transitions: self.transitions.clone(),
            redeliveries_observed,
        })
    }

    async fn poll_for(
        &self,
        queue_url: &str,
        correlation_id: &CorrelationId,
        policy: &PollPolicy,
    ) -> Result<ReceivedMessage, ConformanceError> {
        let service = self.service;
        let outcome = policy
            .poll(move |_| async move { receive_correlated(service, queue_url, correlation_id).await })
            .await?;

        match outcome {
            PollOutcome::Found { value, attempts, .. } => {
                debug!(queue_url = %queue_url, attempts, "Message found");
                Ok(value)
            }
            PollOutcome::Expired { elapsed, .. } => Err(AssertionFailure::NoMessageReceived {
                queue_url: queue_url.to_string(),
                waited: elapsed,
            }
            .into()),
        }
    }

    fn advance(&mut self, next: RedriveState) {
        debug!(from = ?self.state(), to = %next, "Redrive state transition");
        self.transitions.push(next);
    }
}
