//! Common test utilities for queue-conformance integration tests
//!
//! This module provides:
//! - Provisioning fixtures backed by the in-memory queue service
//! - Builders for `terraform output -json` documents
//! - Suite construction from captured outputs

use queue_conformance_core::{
    ConformanceSettings, ConformanceSuite, FeatureFlags, InMemoryQueueService,
    JsonFileOutputSource, OutputError, ResourceLocator,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Visibility timeout used by provisioned fixture queues
#[allow(dead_code)]
pub const VISIBILITY: Duration = Duration::from_secs(5);

/// A provisioned set of in-memory queues and the outputs describing them
#[allow(dead_code)]
pub struct Provisioned {
    pub service: InMemoryQueueService,
    pub outputs: NamedTempFile,
}

impl Provisioned {
    /// Primary queue with a dead-letter queue and the given redrive threshold
    #[allow(dead_code)]
    pub fn with_dead_letter(max_receive_count: u32) -> Self {
        let service = InMemoryQueueService::default();
        let (queue, dead_letter) =
            service.create_queue_with_dead_letter("orders", "orders-dlq", VISIBILITY, max_receive_count);
        let outputs = write_outputs(&[
            ("queue_name", queue.name()),
            ("queue_url", queue.url()),
            ("dlq_name", dead_letter.name()),
            ("dlq_url", dead_letter.url()),
        ]);
        Self { service, outputs }
    }

    /// Primary queue only
    #[allow(dead_code)]
    pub fn simple() -> Self {
        let service = InMemoryQueueService::default();
        let queue = service.create_queue("orders", VISIBILITY);
        let outputs = write_outputs(&[("queue_name", queue.name()), ("queue_url", queue.url())]);
        Self { service, outputs }
    }

    /// Resolve outputs the way the runner does and build a suite over them
    #[allow(dead_code)]
    pub async fn suite(
        &self,
        features: FeatureFlags,
        settings: ConformanceSettings,
    ) -> Result<ConformanceSuite, OutputError> {
        let source = JsonFileOutputSource::new(self.outputs.path());
        let topology = ResourceLocator::resolve(&source, &features).await?;
        Ok(ConformanceSuite::new(
            Arc::new(self.service.clone()),
            topology,
            features,
            settings,
        ))
    }
}

/// Write a `terraform output -json` document for the given string outputs
#[allow(dead_code)]
pub fn write_outputs(pairs: &[(&str, &str)]) -> NamedTempFile {
    let document: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(key, value)| {
            (
                key.to_string(),
                serde_json::json!({ "sensitive": false, "type": "string", "value": value }),
            )
        })
        .collect();

    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(serde_json::Value::Object(document).to_string().as_bytes())
        .unwrap();
    file
}

/// Install a test subscriber once so scenario logs show up with `--nocapture`
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("queue_conformance_core=debug")
        .with_test_writer()
        .try_init();
}
