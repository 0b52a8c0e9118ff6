//! Tunable timing and payload settings for the verifiers.
//!
//! Every field carries a serde default, so an empty configuration produces
//! the values below.

use crate::client::ReceiveOptions;
use crate::error::ConfigurationError;
use crate::polling::{duration_ms, PollPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Body sent by the round-trip scenario
pub const DEFAULT_ROUND_TRIP_BODY: &str = "Hello, World!";

/// Body sent by the redrive scenario
pub const DEFAULT_REDRIVE_BODY: &str = "Hello, DLQ!";

/// Settings for the send/receive/delete scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTripSettings {
    pub body: String,
    /// How long to keep polling for the sent message
    pub settle: PollPolicy,
}

impl Default for RoundTripSettings {
    fn default() -> Self {
        Self {
            body: DEFAULT_ROUND_TRIP_BODY.to_string(),
            settle: PollPolicy::new(
                Duration::from_secs(1),
                Duration::from_millis(500),
                Duration::from_secs(5),
                Duration::from_secs(30),
            ),
        }
    }
}

/// Settings for the dead-letter redrive scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedriveSettings {
    pub body: String,

    /// Redrive threshold configured on the primary queue. This many
    /// redelivery attempts follow the first delivery.
    pub max_receive_count: u32,

    /// Visibility timeout configured on the primary queue
    #[serde(rename = "visibility_timeout_ms", with = "duration_ms")]
    pub visibility_timeout: Duration,

    /// Polling for the first delivery, which starts immediately
    pub first_delivery: PollPolicy,

    /// Polling for the message on the dead-letter queue
    pub dead_letter_settle: PollPolicy,
}

impl Default for RedriveSettings {
    fn default() -> Self {
        Self {
            body: DEFAULT_REDRIVE_BODY.to_string(),
            max_receive_count: 1,
            visibility_timeout: Duration::from_secs(5),
            first_delivery: PollPolicy::new(
                Duration::ZERO,
                Duration::from_millis(250),
                Duration::from_secs(2),
                Duration::from_secs(20),
            ),
            dead_letter_settle: PollPolicy::new(
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(60),
            ),
        }
    }
}

/// Suite-level execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteSettings {
    /// Run scenarios concurrently instead of one after another
    pub parallel: bool,
}

/// All verifier settings for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceSettings {
    pub round_trip: RoundTripSettings,
    pub redrive: RedriveSettings,
    pub receive: ReceiveOptions,
    pub suite: SuiteSettings,
}

impl ConformanceSettings {
    /// Reject settings that would make a scenario meaningless
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.round_trip.body.is_empty() {
            return Err(invalid("round_trip.body must not be empty"));
        }
        if self.redrive.body.is_empty() {
            return Err(invalid("redrive.body must not be empty"));
        }
        if self.redrive.max_receive_count == 0 {
            return Err(invalid("redrive.max_receive_count must be at least 1"));
        }
        if self.redrive.visibility_timeout.is_zero() {
            return Err(invalid("redrive.visibility_timeout_ms must be greater than zero"));
        }

        for (name, policy) in [
            ("round_trip.settle", &self.round_trip.settle),
            ("redrive.first_delivery", &self.redrive.first_delivery),
            ("redrive.dead_letter_settle", &self.redrive.dead_letter_settle),
        ] {
            validate_policy(name, policy)?;
        }

        Ok(())
    }
}

fn validate_policy(name: &str, policy: &PollPolicy) -> Result<(), ConfigurationError> {
    if policy.deadline.is_zero() {
        return Err(invalid(&format!("{}.deadline_ms must be greater than zero", name)));
    }
    if policy.initial_delay.is_zero() {
        return Err(invalid(&format!("{}.initial_delay_ms must be greater than zero", name)));
    }
    if policy.max_delay < policy.initial_delay {
        return Err(invalid(&format!(
            "{}.max_delay_ms must not be smaller than initial_delay_ms",
            name
        )));
    }
    if !(policy.backoff_multiplier >= 1.0) {
        return Err(invalid(&format!("{}.backoff_multiplier must be at least 1.0", name)));
    }
    if !policy.backoff_multiplier.is_finite() {
        return Err(invalid(&format!("{}.backoff_multiplier must be finite", name)));
    }
    if !(0.0..=1.0).contains(&policy.jitter_percent) {
        return Err(invalid(&format!(
            "{}.jitter_percent must be between 0.0 and 1.0",
            name
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigurationError {
    ConfigurationError::Invalid {
        message: message.to_string(),
    }
}
