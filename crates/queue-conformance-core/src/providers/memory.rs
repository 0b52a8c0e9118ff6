//! In-memory queue service that simulates SQS delivery semantics.
//!
//! This provider supports:
//! - Prefix-based queue listing
//! - Visibility timeouts and approximate receive counts
//! - Redrive to a dead-letter queue once the max receive count is exceeded
//! - Single-use receipt handles with accounting of every delete call
//! - One-shot fault injection per operation
//!
//! Time is read from `tokio::time`, so tests running on a paused clock see
//! visibility timeouts expire deterministically.
//!
//! This provider is intended for:
//! - Unit and integration testing of the verifiers
//! - Dry runs of the suite without cloud infrastructure

use crate::client::{QueueOperation, QueueService, ReceiveOptions};
use crate::error::QueueServiceError;
use crate::message::{
    CorrelationId, DeadLetterQueueRef, OutgoingMessage, QueueRef, ReceiptHandle, ReceivedMessage,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Base URL for simulated queues
pub const IN_MEMORY_ENDPOINT: &str = "https://sqs.in-memory.localhost/000000000000";

/// Visibility timeout applied when none is configured (SQS default)
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Redrive configuration of a source queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedrivePolicy {
    pub dead_letter_url: String,
    pub max_receive_count: u32,
}

/// Shared state for all simulated queues
#[derive(Default)]
struct ServiceState {
    queues: BTreeMap<String, SimulatedQueue>,
    deleted_handles: HashSet<String>,
    delete_calls: Vec<String>,
    double_deletes: Vec<String>,
    pending_faults: HashSet<QueueOperation>,
    next_message_id: u64,
    next_receipt: u64,
}

impl ServiceState {
    fn queue_mut(&mut self, queue_url: &str) -> Result<&mut SimulatedQueue, QueueServiceError> {
        self.queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueServiceError::QueueNotFound {
                queue_url: queue_url.to_string(),
            })
    }

    fn take_fault(&mut self, operation: QueueOperation, queue_url: &str) -> Result<(), QueueServiceError> {
        if self.pending_faults.remove(&operation) {
            return Err(QueueServiceError::Transport {
                operation: operation.to_string(),
                queue_url: queue_url.to_string(),
                message: "injected fault".to_string(),
            });
        }
        Ok(())
    }
}

/// A single simulated queue
struct SimulatedQueue {
    name: String,
    visibility_timeout: Duration,
    redrive: Option<RedrivePolicy>,
    messages: Vec<StoredMessage>,
}

/// A message stored in a queue with delivery metadata
struct StoredMessage {
    message_id: String,
    body: String,
    correlation_id: Option<CorrelationId>,
    receive_count: u32,
    visible_at: Instant,
    current_receipt: Option<String>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        now >= self.visible_at
    }
}

// ============================================================================
// InMemoryQueueService
// ============================================================================

/// In-memory queue service
#[derive(Clone)]
pub struct InMemoryQueueService {
    state: Arc<RwLock<ServiceState>>,
    receive: ReceiveOptions,
}

impl Default for InMemoryQueueService {
    fn default() -> Self {
        Self::new(ReceiveOptions::default())
    }
}

impl InMemoryQueueService {
    pub fn new(receive: ReceiveOptions) -> Self {
        Self {
            state: Arc::new(RwLock::new(ServiceState::default())),
            receive: receive.normalized(),
        }
    }

    /// Build the URL a queue with the given name is addressed by
    pub fn url_for(name: &str) -> String {
        format!("{}/{}", IN_MEMORY_ENDPOINT, name)
    }

    /// Create a queue (idempotent) and return its reference
    pub fn create_queue(&self, name: &str, visibility_timeout: Duration) -> QueueRef {
        let url = Self::url_for(name);
        let mut state = self.write_state();
        state
            .queues
            .entry(url.clone())
            .or_insert_with(|| SimulatedQueue {
                name: name.to_string(),
                visibility_timeout,
                redrive: None,
                messages: Vec::new(),
            });
        QueueRef::new(name, url)
    }

    /// Create a primary queue with a dead-letter queue and redrive policy
    pub fn create_queue_with_dead_letter(
        &self,
        name: &str,
        dead_letter_name: &str,
        visibility_timeout: Duration,
        max_receive_count: u32,
    ) -> (QueueRef, DeadLetterQueueRef) {
        let dead_letter = self.create_queue(dead_letter_name, DEFAULT_VISIBILITY_TIMEOUT);
        let queue = self.create_queue(name, visibility_timeout);
        let mut state = self.write_state();
        if let Some(source) = state.queues.get_mut(queue.url()) {
            source.redrive = Some(RedrivePolicy {
                dead_letter_url: dead_letter.url().to_string(),
                max_receive_count,
            });
        }
        (
            queue,
            DeadLetterQueueRef::new(dead_letter.name(), dead_letter.url()),
        )
    }

    /// Make the next call of `operation` fail with a transport error
    pub fn fail_next(&self, operation: QueueOperation) {
        self.write_state().pending_faults.insert(operation);
    }

    /// Number of messages currently stored in a queue, visible or not
    pub fn message_count(&self, queue_url: &str) -> usize {
        self.read_state()
            .queues
            .get(queue_url)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Bodies of every message currently stored in a queue
    pub fn bodies(&self, queue_url: &str) -> Vec<String> {
        self.read_state()
            .queues
            .get(queue_url)
            .map(|q| q.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Every receipt handle passed to `delete_message`, in call order
    pub fn delete_calls(&self) -> Vec<String> {
        self.read_state().delete_calls.clone()
    }

    /// Receipt handles that were deleted more than once
    pub fn double_deletes(&self) -> Vec<String> {
        self.read_state().double_deletes.clone()
    }

    /// Enqueue a message without a correlation token, as unrelated traffic would
    pub fn inject_foreign_message(&self, queue_url: &str, body: &str) -> Result<(), QueueServiceError> {
        let mut state = self.try_write_state()?;
        state.next_message_id += 1;
        let message_id = format!("msg-{}", state.next_message_id);
        let queue = state.queue_mut(queue_url)?;
        queue.messages.push(StoredMessage {
            message_id,
            body: body.to_string(),
            correlation_id: None,
            receive_count: 0,
            visible_at: Instant::now(),
            current_receipt: None,
        });
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_write_state(&self) -> Result<RwLockWriteGuard<'_, ServiceState>, QueueServiceError> {
        self.state.write().map_err(|_| QueueServiceError::Internal {
            message: "in-memory queue state lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn list_queues(&self, name_prefix: &str) -> Result<Vec<String>, QueueServiceError> {
        let mut state = self.try_write_state()?;
        state.take_fault(QueueOperation::ListQueues, name_prefix)?;

        let urls: Vec<String> = state
            .queues
            .iter()
            .filter(|(_, queue)| queue.name.starts_with(name_prefix))
            .map(|(url, _)| url.clone())
            .collect();

        debug!(prefix = %name_prefix, count = urls.len(), "Listed in-memory queues");
        Ok(urls)
    }

    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<(), QueueServiceError> {
        let mut state = self.try_write_state()?;
        state.take_fault(QueueOperation::SendMessage, queue_url)?;

        state.next_message_id += 1;
        let message_id = format!("msg-{}", state.next_message_id);
        let queue = state.queue_mut(queue_url)?;
        queue.messages.push(StoredMessage {
            message_id,
            body: message.body.clone(),
            correlation_id: Some(message.correlation_id.clone()),
            receive_count: 0,
            visible_at: Instant::now(),
            current_receipt: None,
        });
        Ok(())
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
    ) -> Result<Vec<ReceivedMessage>, QueueServiceError> {
        let mut state = self.try_write_state()?;
        state.take_fault(QueueOperation::ReceiveMessage, queue_url)?;

        let now = Instant::now();
        let limit = self.receive.max_messages as usize;
        let mut next_receipt = state.next_receipt;

        let queue = state.queue_mut(queue_url)?;
        let visibility_timeout = queue.visibility_timeout;
        let redrive = queue.redrive.clone();

        let mut delivered = Vec::new();
        let mut redriven = Vec::new();
        let mut index = 0;
        while index < queue.messages.len() && delivered.len() < limit {
            let message = &mut queue.messages[index];
            if !message.is_visible(now) {
                index += 1;
                continue;
            }

            if let Some(policy) = &redrive {
                if message.receive_count >= policy.max_receive_count {
                    redriven.push(queue.messages.remove(index));
                    continue;
                }
            }

            next_receipt += 1;
            let receipt = format!("rh-{}-{}", message.message_id, next_receipt);
            message.receive_count += 1;
            message.visible_at = now + visibility_timeout;
            message.current_receipt = Some(receipt.clone());

            delivered.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                correlation_id: message.correlation_id.clone(),
                receive_count: message.receive_count,
                receipt_handle: ReceiptHandle::new(receipt),
            });
            index += 1;
        }

        state.next_receipt = next_receipt;

        if let (Some(policy), false) = (redrive, redriven.is_empty()) {
            debug!(
                source = %queue_url,
                dead_letter = %policy.dead_letter_url,
                count = redriven.len(),
                "Redriving messages past max receive count"
            );
            let dead_letter = state.queue_mut(&policy.dead_letter_url)?;
            for mut message in redriven {
                message.receive_count = 0;
                message.visible_at = now;
                message.current_receipt = None;
                dead_letter.messages.push(message);
            }
        }

        Ok(delivered)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt: ReceiptHandle,
    ) -> Result<(), QueueServiceError> {
        let mut state = self.try_write_state()?;
        state.take_fault(QueueOperation::DeleteMessage, queue_url)?;

        let handle = receipt.into_inner();
        state.delete_calls.push(handle.clone());
        if !state.deleted_handles.insert(handle.clone()) {
            state.double_deletes.push(handle);
            return Err(QueueServiceError::InvalidReceipt {
                queue_url: queue_url.to_string(),
            });
        }

        let queue = state.queue_mut(queue_url)?;
        let position = queue
            .messages
            .iter()
            .position(|m| m.current_receipt.as_deref() == Some(handle.as_str()));

        match position {
            Some(index) => {
                queue.messages.remove(index);
                Ok(())
            }
            None => Err(QueueServiceError::InvalidReceipt {
                queue_url: queue_url.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for InMemoryQueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryQueueService")
            .field("receive", &self.receive)
            .finish()
    }
}
