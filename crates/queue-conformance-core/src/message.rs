//! Queue references and message types exchanged with the queue service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Message attribute carrying the per-scenario correlation token
pub const CORRELATION_ATTRIBUTE: &str = "conformance-correlation-id";

// ============================================================================
// Queue References
// ============================================================================

/// A resolved queue: its logical name and the URL the service addresses it by.
///
/// Identity is the URL. Two references with the same URL are the same queue
/// regardless of the name they were resolved under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRef {
    name: String,
    url: String,
}

impl QueueRef {
    /// Create a queue reference from an already validated name and URL
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Logical queue name, used as the listing prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved queue URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PartialEq for QueueRef {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for QueueRef {}

impl Hash for QueueRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Reference to the dead-letter queue paired with the primary queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeadLetterQueueRef(QueueRef);

impl DeadLetterQueueRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self(QueueRef::new(name, url))
    }

    /// View the dead-letter queue as a plain queue reference
    pub fn as_queue(&self) -> &QueueRef {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn url(&self) -> &str {
        self.0.url()
    }
}

impl fmt::Display for DeadLetterQueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Correlation
// ============================================================================

/// Token distinguishing one scenario's message from any other traffic on the
/// shared queues
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random token
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A message about to be enqueued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    pub correlation_id: CorrelationId,
}

impl OutgoingMessage {
    /// Create a message with a fresh correlation token
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            correlation_id: CorrelationId::new(),
        }
    }
}

/// Opaque token acknowledging one specific delivery.
///
/// The handle is not `Clone`: deleting consumes it, so the same delivery can
/// never be acknowledged twice.
#[derive(PartialEq, Eq)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "ReceiptHandle({}..)", prefix)
    }
}

/// A single delivery returned by a receive call
#[derive(Debug)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub body: String,
    /// Correlation token, absent for messages not sent by a conformance run
    pub correlation_id: Option<CorrelationId>,
    /// Approximate number of times the service has delivered this message
    pub receive_count: u32,
    pub receipt_handle: ReceiptHandle,
}

impl ReceivedMessage {
    /// Check whether this delivery carries the given correlation token
    pub fn belongs_to(&self, correlation_id: &CorrelationId) -> bool {
        self.correlation_id.as_ref() == Some(correlation_id)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
