//! The shape of the provisioned queue resources.

use crate::message::{DeadLetterQueueRef, QueueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;

/// Provisioned queue topology under test
///
/// Dead-letter scenarios are only meaningful for [`QueueTopology::QueueWithDeadLetter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueTopology {
    SimpleQueue {
        queue: QueueRef,
    },
    QueueWithDeadLetter {
        queue: QueueRef,
        dead_letter: DeadLetterQueueRef,
    },
}

impl QueueTopology {
    /// The primary queue, present in every topology
    pub fn queue(&self) -> &QueueRef {
        match self {
            Self::SimpleQueue { queue } | Self::QueueWithDeadLetter { queue, .. } => queue,
        }
    }

    /// The dead-letter queue, if the topology has one
    pub fn dead_letter(&self) -> Option<&DeadLetterQueueRef> {
        match self {
            Self::SimpleQueue { .. } => None,
            Self::QueueWithDeadLetter { dead_letter, .. } => Some(dead_letter),
        }
    }

    pub fn has_dead_letter(&self) -> bool {
        self.dead_letter().is_some()
    }
}

impl fmt::Display for QueueTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimpleQueue { queue } => write!(f, "queue {}", queue),
            Self::QueueWithDeadLetter { queue, dead_letter } => {
                write!(f, "queue {} with dead-letter queue {}", queue, dead_letter)
            }
        }
    }
}
