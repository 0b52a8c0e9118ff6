//! # Queue Conformance Core
//!
//! Behavioral conformance checks for provisioned message-queue topologies.
//!
//! After infrastructure code provisions a queue, and optionally a dead-letter
//! queue with a redrive policy, this crate verifies that the live resources
//! behave the way they were declared:
//! - the queues are discoverable by name
//! - a message round-trips with its body intact and stays gone once deleted
//! - a message that is never acknowledged is moved to the dead-letter queue
//!
//! ## Architecture
//!
//! - Verifiers depend only on the [`QueueService`] trait
//! - [`SqsQueueService`] talks to Amazon SQS (or any SQS-compatible endpoint)
//! - [`InMemoryQueueService`] simulates SQS semantics on the tokio clock
//! - Queue locations come from provisioning outputs through [`OutputSource`]
//!
//! ## Usage
//!
//! ```rust
//! use queue_conformance_core::{
//!     ConformanceSettings, ConformanceSuite, FeatureFlags, InMemoryQueueService, QueueTopology,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let service = InMemoryQueueService::default();
//! let queue = service.create_queue("orders", Duration::from_secs(5));
//!
//! let suite = ConformanceSuite::new(
//!     Arc::new(service),
//!     QueueTopology::SimpleQueue { queue },
//!     FeatureFlags::default(),
//!     ConformanceSettings::default(),
//! );
//! let report = suite.run_all().await;
//! assert!(report.is_success());
//! # }
//! ```

/// Standard result type for conformance operations
pub type ConformanceResult<T> = Result<T, ConformanceError>;

// ============================================================================
// Module declarations
// ============================================================================

/// Error taxonomy separating setup defects from assertion failures
pub mod error;

/// Queue references, correlation tokens and message types
pub mod message;

/// Queue service abstraction
pub mod client;

/// Queue service implementations
pub mod providers;

/// Bounded polling with backoff
pub mod polling;

/// Provisioning output sources
pub mod outputs;

/// Feature flags gating optional scenario categories
pub mod features;

/// Provisioned queue topology variants
pub mod topology;

/// Queue resolution from provisioning outputs
pub mod locator;

/// Payload and timing settings for the verifiers
pub mod settings;

/// Behavioral verifiers
pub mod verifiers;

/// Scenario registry and reporting
pub mod scenario;

/// Suite execution
pub mod suite;

// Re-export key types for convenience
pub use client::{QueueOperation, QueueService, ReceiveOptions};
pub use error::{
    AssertionFailure, ConfigurationError, ConformanceError, ErrorClass, OutputError,
    QueueServiceError,
};
pub use features::{FeatureFlags, DLQ_FEATURE};
pub use locator::ResourceLocator;
pub use message::{
    CorrelationId, DeadLetterQueueRef, OutgoingMessage, QueueRef, ReceiptHandle, ReceivedMessage,
    CORRELATION_ATTRIBUTE,
};
pub use outputs::{
    JsonFileOutputSource, OutputSource, ProvisionedOutputs, StaticOutputSource,
    TerraformOutputSource,
};
pub use polling::{PollOutcome, PollPolicy};
pub use providers::{InMemoryQueueService, RedrivePolicy, SqsQueueService, SqsSettings};
pub use scenario::{ScenarioId, ScenarioOutcome, ScenarioStatus, SuiteReport};
pub use settings::{ConformanceSettings, RedriveSettings, RoundTripSettings, SuiteSettings};
pub use suite::ConformanceSuite;
pub use topology::QueueTopology;
pub use verifiers::{RedriveReport, RedriveState, RedriveVerifier, RoundTripReport, RoundTripVerifier};
