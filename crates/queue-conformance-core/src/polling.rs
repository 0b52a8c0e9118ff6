//! # Bounded Polling
//!
//! Re-attempts a receive with exponential backoff until the expected message
//! shows up or a deadline passes. This makes the timing assumption of each
//! scenario explicit and configurable instead of relying on a single fixed
//! sleep before one receive.
//!
//! Errors returned by an attempt end the poll immediately. Polling waits for
//! a message to become visible; it never retries a failed call.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

#[cfg(test)]
#[path = "polling_tests.rs"]
mod tests;

/// Floor applied to every backoff delay so a zero-delay policy cannot spin
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Backoff and deadline settings for one polling wait
///
/// # Examples
///
/// ```rust
/// use queue_conformance_core::polling::PollPolicy;
/// use std::time::Duration;
///
/// // Start after 1s, back off 0.5s -> 1s -> 2s, give up after 30s
/// let policy = PollPolicy::new(
///     Duration::from_secs(1),
///     Duration::from_millis(500),
///     Duration::from_secs(2),
///     Duration::from_secs(30),
/// );
/// assert_eq!(policy.without_jitter().calculate_delay(1), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Wait before the first attempt
    #[serde(rename = "first_attempt_delay_ms", with = "duration_ms")]
    pub first_attempt_delay: Duration,

    /// Delay after the first empty attempt
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Total time budget measured from the start of the poll
    #[serde(rename = "deadline_ms", with = "duration_ms")]
    pub deadline: Duration,

    /// Whether to add jitter to delays
    pub use_jitter: bool,

    /// Jitter range as a fraction of the delay (0.1 = ±10%)
    pub jitter_percent: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            first_attempt_delay: Duration::ZERO,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            deadline: Duration::from_secs(30),
            use_jitter: true,
            jitter_percent: 0.1,
        }
    }
}

/// Result of a completed poll
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// An attempt produced a value
    Found {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    /// The deadline passed without any attempt producing a value
    Expired { attempts: u32, elapsed: Duration },
}

impl<T> PollOutcome<T> {
    /// Convert into the found value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Found { value, .. } => Some(value),
            Self::Expired { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Found { attempts, .. } | Self::Expired { attempts, .. } => *attempts,
        }
    }
}

impl PollPolicy {
    pub fn new(
        first_attempt_delay: Duration,
        initial_delay: Duration,
        max_delay: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            first_attempt_delay,
            initial_delay,
            max_delay,
            deadline,
            ..Self::default()
        }
    }

    /// Disable jitter, used where delays must be exact
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Set the wait before the first attempt
    pub fn with_first_attempt_delay(mut self, delay: Duration) -> Self {
        self.first_attempt_delay = delay;
        self
    }

    /// Calculate the delay after a given empty attempt (0-based)
    ///
    /// delay = initial * multiplier^attempt, capped at `max_delay`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        let final_delay_secs = if self.use_jitter {
            Self::add_jitter(capped_delay_secs, self.jitter_percent)
        } else {
            capped_delay_secs
        };

        Duration::from_secs_f64(final_delay_secs)
    }

    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent.clamp(0.0, 1.0);
        // NaN survives the clamp and would make the sample range empty.
        if !(jitter_range > 0.0) || !jitter_range.is_finite() {
            return delay_secs;
        }
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }

    /// Run `attempt` until it yields a value, fails, or the deadline passes.
    ///
    /// The attempt closure receives the 0-based attempt number. At least one
    /// attempt is always made, and a final attempt is made at the deadline.
    pub async fn poll<T, E, F, Fut>(&self, mut attempt: F) -> Result<PollOutcome<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let started = Instant::now();
        let deadline_at = started + self.deadline;

        if !self.first_attempt_delay.is_zero() {
            tokio::time::sleep(self.first_attempt_delay.min(self.deadline)).await;
        }

        let mut attempt_number = 0;
        loop {
            if let Some(value) = attempt(attempt_number).await? {
                return Ok(PollOutcome::Found {
                    value,
                    attempts: attempt_number + 1,
                    elapsed: started.elapsed(),
                });
            }

            let now = Instant::now();
            if now >= deadline_at {
                return Ok(PollOutcome::Expired {
                    attempts: attempt_number + 1,
                    elapsed: started.elapsed(),
                });
            }

            let delay = self
                .calculate_delay(attempt_number)
                .max(MIN_DELAY)
                .min(deadline_at.saturating_duration_since(now));
            trace!(attempt = attempt_number, delay_ms = delay.as_millis() as u64, "Nothing yet, backing off");
            tokio::time::sleep(delay).await;
            attempt_number += 1;
        }
    }
}

/// Serialize durations as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
