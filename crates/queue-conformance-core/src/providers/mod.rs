//! Queue service implementations.
//!
//! This module contains concrete implementations of the `QueueService` trait
//! for different backends.

pub mod memory;
pub mod sqs;

pub use memory::{InMemoryQueueService, RedrivePolicy};
pub use sqs::{SqsQueueService, SqsSettings};
