//! Queue existence checks.

use crate::client::QueueService;
use crate::error::{AssertionFailure, ConformanceError};
use crate::message::QueueRef;
use crate::topology::QueueTopology;
use tracing::{debug, info};

#[cfg(test)]
#[path = "existence_tests.rs"]
mod tests;

/// Verify that listing queues by the queue's name yields the queue's URL.
///
/// The service matches by prefix, so other queues sharing the prefix may be
/// listed too. Only membership of the exact URL matters.
pub async fn verify_queue_listed(
    service: &dyn QueueService,
    queue: &QueueRef,
) -> Result<(), ConformanceError> {
    let listed = service.list_queues(queue.name()).await?;
    debug!(queue = %queue, listed = listed.len(), "Listed queues by name prefix");

    if listed.iter().any(|url| url == queue.url()) {
        info!(queue = %queue, "Queue exists");
        return Ok(());
    }

    Err(AssertionFailure::QueueNotListed {
        queue_name: queue.name().to_string(),
        queue_url: queue.url().to_string(),
        listed,
    }
    .into())
}

/// Verify that the topology's dead-letter queue is listed
pub async fn verify_dead_letter_listed(
    service: &dyn QueueService,
    topology: &QueueTopology,
) -> Result<(), ConformanceError> {
    let dead_letter = topology
        .dead_letter()
        .ok_or_else(|| ConformanceError::TopologyMismatch {
            scenario: "DlqExists".to_string(),
        })?;

    verify_queue_listed(service, dead_letter.as_queue()).await
}
