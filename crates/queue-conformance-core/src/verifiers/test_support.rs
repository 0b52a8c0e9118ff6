//! Misbehaving queue service used to drive verifiers down their failure paths.

use crate::client::{QueueOperation, QueueService};
use crate::error::QueueServiceError;
use crate::message::{OutgoingMessage, ReceiptHandle, ReceivedMessage};
use crate::providers::InMemoryQueueService;
use async_trait::async_trait;
use std::sync::Mutex;

/// The way a [`MisbehavingQueueService`] deviates from a well-behaved queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Misbehavior {
    /// Accept sends without storing anything
    DropSends,
    /// Replace every received body
    CorruptBodies,
    /// Acknowledge deletes without removing the message
    IgnoreDeletes,
    /// Store every send on the given dead-letter queue as well
    CopyToDeadLetter { dead_letter_url: String },
    /// Let the first `successful` receives through, then fail every receive
    FailReceiveAfter { successful: usize },
}

pub struct MisbehavingQueueService {
    pub inner: InMemoryQueueService,
    pub misbehavior: Misbehavior,
    receives: Mutex<Vec<String>>,
}

impl MisbehavingQueueService {
    pub fn new(inner: InMemoryQueueService, misbehavior: Misbehavior) -> Self {
        Self {
            inner,
            misbehavior,
            receives: Mutex::new(Vec::new()),
        }
    }

    /// Queue URL of every receive call, in call order, failed ones included
    pub fn receive_calls(&self) -> Vec<String> {
        self.receives.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueService for MisbehavingQueueService {
    async fn list_queues(&self, name_prefix: &str) -> Result<Vec<String>, QueueServiceError> {
        self.inner.list_queues(name_prefix).await
    }

    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<(), QueueServiceError> {
        match &self.misbehavior {
            Misbehavior::DropSends => Ok(()),
            Misbehavior::CopyToDeadLetter { dead_letter_url } => {
                self.inner.send_message(dead_letter_url, message).await?;
                self.inner.send_message(queue_url, message).await
            }
            _ => self.inner.send_message(queue_url, message).await,
        }
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
    ) -> Result<Vec<ReceivedMessage>, QueueServiceError> {
        let previous = {
            let mut receives = self.receives.lock().unwrap();
            receives.push(queue_url.to_string());
            receives.len() - 1
        };
        if let Misbehavior::FailReceiveAfter { successful } = self.misbehavior {
            if previous >= successful {
                return Err(QueueServiceError::Transport {
                    operation: QueueOperation::ReceiveMessage.to_string(),
                    queue_url: queue_url.to_string(),
                    message: "connection reset".to_string(),
                });
            }
        }

        let mut messages = self.inner.receive_messages(queue_url).await?;
        if self.misbehavior == Misbehavior::CorruptBodies {
            for message in &mut messages {
                message.body = format!("{} (corrupted)", message.body);
            }
        }
        Ok(messages)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt: ReceiptHandle,
    ) -> Result<(), QueueServiceError> {
        if self.misbehavior == Misbehavior::IgnoreDeletes {
            return Ok(());
        }
        self.inner.delete_message(queue_url, receipt).await
    }
}
