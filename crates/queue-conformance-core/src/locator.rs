//! Resource locator: resolves the provisioned queues from infrastructure outputs.
//!
//! A missing or malformed output is an environment-setup defect, not a test
//! failure, and aborts the run.

use crate::error::OutputError;
use crate::features::FeatureFlags;
use crate::message::{DeadLetterQueueRef, QueueRef};
use crate::outputs::{OutputSource, ProvisionedOutputs, DLQ_NAME, DLQ_URL, QUEUE_NAME, QUEUE_URL};
use crate::topology::QueueTopology;
use tracing::info;
use url::Url;

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;

/// Resolves queue references from provisioning outputs
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceLocator;

impl ResourceLocator {
    /// Load outputs from `source` and resolve the topology
    pub async fn resolve(
        source: &dyn OutputSource,
        features: &FeatureFlags,
    ) -> Result<QueueTopology, OutputError> {
        info!(source = %source.describe(), "Resolving queue topology");
        let outputs = source.load().await?;
        Self::locate(&outputs, features)
    }

    /// Resolve the topology from already loaded outputs.
    ///
    /// The dead-letter outputs are only read when the dead-letter feature is
    /// enabled for this run.
    pub fn locate(
        outputs: &ProvisionedOutputs,
        features: &FeatureFlags,
    ) -> Result<QueueTopology, OutputError> {
        let queue = Self::queue_ref(outputs, QUEUE_NAME, QUEUE_URL)?;

        if !features.dead_letter_enabled() {
            info!(queue = %queue, "Resolved simple queue topology");
            return Ok(QueueTopology::SimpleQueue { queue });
        }

        let dead_letter = Self::queue_ref(outputs, DLQ_NAME, DLQ_URL)?;
        if dead_letter == queue {
            return Err(OutputError::Invalid {
                key: DLQ_URL.to_string(),
                message: format!(
                    "dead-letter queue must differ from the primary queue ({})",
                    queue.url()
                ),
            });
        }

        info!(queue = %queue, dead_letter = %dead_letter, "Resolved queue topology with dead-letter queue");
        Ok(QueueTopology::QueueWithDeadLetter {
            queue,
            dead_letter: DeadLetterQueueRef::new(dead_letter.name(), dead_letter.url()),
        })
    }

    /// Read and cross-check a name/URL output pair.
    ///
    /// The URL must be absolute and its final non-empty path segment must be
    /// the queue name, so a trailing slash is tolerated.
    fn queue_ref(
        outputs: &ProvisionedOutputs,
        name_key: &str,
        url_key: &str,
    ) -> Result<QueueRef, OutputError> {
        let name = outputs.require(name_key)?;
        let raw_url = outputs.require(url_key)?;

        let parsed = Url::parse(raw_url).map_err(|e| OutputError::Invalid {
            key: url_key.to_string(),
            message: format!("not a valid URL: {}", e),
        })?;

        let last_segment = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|segment| !segment.is_empty()).next_back())
            .unwrap_or_default();
        if last_segment != name {
            return Err(OutputError::Invalid {
                key: url_key.to_string(),
                message: format!(
                    "URL {} does not address queue '{}' from output '{}'",
                    raw_url, name, name_key
                ),
            });
        }

        Ok(QueueRef::new(name, raw_url.strip_suffix('/').unwrap_or(raw_url)))
    }
}
