//! Error types for conformance runs.
//!
//! Two classes of failure exist. Setup errors (missing infrastructure outputs,
//! unresolvable credentials, transport failures) mean the environment could not
//! be exercised. Assertion failures mean the queue was exercised and behaved
//! differently than its declared configuration. Neither class is ever retried.

use std::time::Duration;
use thiserror::Error;

/// Broad classification used by the harness when reporting outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The environment could not be exercised
    Setup,
    /// The queue behaved differently than expected
    Assertion,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Assertion => write!(f, "assertion"),
        }
    }
}

/// Umbrella error for everything a scenario or the suite can report
#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("Infrastructure output error: {0}")]
    Output(#[from] OutputError),

    #[error("Queue service error: {0}")]
    QueueService(#[from] QueueServiceError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Assertion failed: {0}")]
    Assertion(#[from] AssertionFailure),

    #[error("Scenario '{scenario}' requires a dead-letter queue but the topology has none")]
    TopologyMismatch { scenario: String },
}

impl ConformanceError {
    /// Classify the error as a setup defect or a behavioral failure
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Assertion(_) => ErrorClass::Assertion,
            Self::Output(_) => ErrorClass::Setup,
            Self::QueueService(_) => ErrorClass::Setup,
            Self::Configuration(_) => ErrorClass::Setup,
            Self::TopologyMismatch { .. } => ErrorClass::Setup,
        }
    }

    /// Check if the error is an assertion failure
    pub fn is_assertion(&self) -> bool {
        self.class() == ErrorClass::Assertion
    }
}

/// Failures of the queue service adapter
#[derive(Debug, Error)]
pub enum QueueServiceError {
    #[error("{operation} on {queue_url} failed: {message}")]
    Transport {
        operation: String,
        queue_url: String,
        message: String,
    },

    #[error("Credential resolution failed: {message}")]
    Credentials { message: String },

    #[error("Receipt handle is not valid for {queue_url}")]
    InvalidReceipt { queue_url: String },

    #[error("Queue does not exist: {queue_url}")]
    QueueNotFound { queue_url: String },

    #[error("Internal adapter error: {message}")]
    Internal { message: String },
}

/// Failures reading the provisioning outputs
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Missing required infrastructure output: {key}")]
    Missing { key: String },

    #[error("Infrastructure output '{key}' is invalid: {message}")]
    Invalid { key: String, message: String },

    #[error("Unable to read infrastructure outputs: {message}")]
    Source { message: String },
}

/// Violated expectations about queue behavior
#[derive(Debug, Error)]
pub enum AssertionFailure {
    #[error("Expected queue URL {queue_url} not found when listing prefix '{queue_name}' (listed: {listed:?})")]
    QueueNotListed {
        queue_name: String,
        queue_url: String,
        listed: Vec<String>,
    },

    #[error("Expected a message on {queue_url}, none received within {waited:?}")]
    NoMessageReceived { queue_url: String, waited: Duration },

    #[error("Received body {actual:?} does not match sent body {expected:?}")]
    BodyMismatch { expected: String, actual: String },

    #[error("Message with body {body:?} was delivered again from {queue_url} after deletion")]
    MessageRedelivered { queue_url: String, body: String },

    #[error("Message with body {body:?} is still obtainable from {queue_url} after redrive")]
    StillOnPrimary { queue_url: String, body: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
