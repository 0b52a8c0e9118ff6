//! The queue service capability surface used by the verifiers.
//!
//! Exactly four operations are exposed. Each is a single blocking round trip
//! to the service; none of them retries.

use crate::error::QueueServiceError;
use crate::message::{OutgoingMessage, ReceiptHandle, ReceivedMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Maximum number of messages a single receive may return
pub const MAX_RECEIVE_BATCH: u32 = 10;

/// Longest long-poll wait the service accepts
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// The operations the adapter performs, used for logging and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueOperation {
    ListQueues,
    SendMessage,
    ReceiveMessage,
    DeleteMessage,
}

impl QueueOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListQueues => "ListQueues",
            Self::SendMessage => "SendMessage",
            Self::ReceiveMessage => "ReceiveMessage",
            Self::DeleteMessage => "DeleteMessage",
        }
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interface implemented by queue service backends (AWS SQS, in-memory)
#[async_trait]
pub trait QueueService: Send + Sync {
    /// List URLs of queues whose name starts with `name_prefix`.
    ///
    /// Only the first page is returned; the prefix is expected to be narrow.
    async fn list_queues(&self, name_prefix: &str) -> Result<Vec<String>, QueueServiceError>;

    /// Enqueue one message
    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<(), QueueServiceError>;

    /// Poll once for available messages. An empty result is a normal outcome.
    async fn receive_messages(
        &self,
        queue_url: &str,
    ) -> Result<Vec<ReceivedMessage>, QueueServiceError>;

    /// Acknowledge a delivery so it is not redelivered. Consumes the handle.
    async fn delete_message(
        &self,
        queue_url: &str,
        receipt: ReceiptHandle,
    ) -> Result<(), QueueServiceError>;
}

/// How each receive call polls the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveOptions {
    /// Upper bound on messages returned per call (1..=10)
    pub max_messages: u32,
    /// Long-poll wait; zero keeps the service's default short poll
    pub wait_time_secs: u64,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_RECEIVE_BATCH,
            wait_time_secs: 0,
        }
    }
}

impl ReceiveOptions {
    /// Clamp values into the ranges the service accepts
    pub fn normalized(self) -> Self {
        Self {
            max_messages: self.max_messages.clamp(1, MAX_RECEIVE_BATCH),
            wait_time_secs: self.wait_time_secs.min(MAX_WAIT_TIME.as_secs()),
        }
    }
}
