//! Provisioning-output sources.
//!
//! The infrastructure module exposes the identifiers of what it provisioned as
//! named outputs. A source loads those outputs once into [`ProvisionedOutputs`];
//! the resource locator then reads the keys it needs.

use crate::error::OutputError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(test)]
#[path = "outputs_tests.rs"]
mod tests;

/// Output holding the primary queue URL
pub const QUEUE_URL: &str = "queue_url";
/// Output holding the primary queue name
pub const QUEUE_NAME: &str = "queue_name";
/// Output holding the dead-letter queue URL
pub const DLQ_URL: &str = "dlq_url";
/// Output holding the dead-letter queue name
pub const DLQ_NAME: &str = "dlq_name";

/// Snapshot of infrastructure outputs keyed by output name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionedOutputs {
    values: BTreeMap<String, String>,
}

impl ProvisionedOutputs {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Look up an output that must be present and non-empty
    pub fn require(&self, key: &str) -> Result<&str, OutputError> {
        match self.values.get(key).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(OutputError::Missing {
                key: key.to_string(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse `terraform output -json` text or a flat JSON object of strings.
    ///
    /// Terraform wraps each output as `{"value": ..., "type": ..., "sensitive": ...}`.
    /// Non-string values are kept as their JSON text.
    pub fn from_json(text: &str) -> Result<Self, OutputError> {
        let parsed: Value = serde_json::from_str(text).map_err(|e| OutputError::Source {
            message: format!("outputs are not valid JSON: {}", e),
        })?;

        let Value::Object(entries) = parsed else {
            return Err(OutputError::Source {
                message: "outputs must be a JSON object".to_string(),
            });
        };

        let values = entries
            .into_iter()
            .map(|(key, entry)| {
                let value = match entry {
                    Value::Object(mut wrapped) if wrapped.contains_key("value") => {
                        wrapped.remove("value").unwrap_or(Value::Null)
                    }
                    other => other,
                };
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();

        Ok(Self { values })
    }
}

impl FromIterator<(String, String)> for ProvisionedOutputs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Interface implemented by provisioning-output backends
#[async_trait]
pub trait OutputSource: Send + Sync {
    /// Read every available output
    async fn load(&self) -> Result<ProvisionedOutputs, OutputError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

// ============================================================================
// Terraform
// ============================================================================

/// Reads outputs by running `terraform output -json` in a module directory
#[derive(Debug, Clone)]
pub struct TerraformOutputSource {
    working_dir: PathBuf,
    binary: String,
}

impl TerraformOutputSource {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            binary: "terraform".to_string(),
        }
    }

    /// Use a different executable, e.g. `tofu`
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl OutputSource for TerraformOutputSource {
    async fn load(&self) -> Result<ProvisionedOutputs, OutputError> {
        info!(dir = %self.working_dir.display(), binary = %self.binary, "Reading infrastructure outputs");

        let output = tokio::process::Command::new(&self.binary)
            .arg("output")
            .arg("-json")
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| OutputError::Source {
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(OutputError::Source {
                message: format!(
                    "{} output exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let outputs = ProvisionedOutputs::from_json(&text)?;
        debug!(count = outputs.len(), "Loaded terraform outputs");
        Ok(outputs)
    }

    fn describe(&self) -> String {
        format!("{} output -json in {}", self.binary, self.working_dir.display())
    }
}

// ============================================================================
// JSON File
// ============================================================================

/// Reads outputs previously captured with `terraform output -json > file`
#[derive(Debug, Clone)]
pub struct JsonFileOutputSource {
    path: PathBuf,
}

impl JsonFileOutputSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputSource for JsonFileOutputSource {
    async fn load(&self) -> Result<ProvisionedOutputs, OutputError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| OutputError::Source {
                message: format!("cannot read {}: {}", self.path.display(), e),
            })?;
        ProvisionedOutputs::from_json(&text)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

// ============================================================================
// Static
// ============================================================================

/// Outputs supplied directly, from inline configuration or tests
#[derive(Debug, Clone, Default)]
pub struct StaticOutputSource {
    outputs: ProvisionedOutputs,
}

impl StaticOutputSource {
    pub fn new(outputs: ProvisionedOutputs) -> Self {
        Self { outputs }
    }

    /// Convenience constructor from string pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[async_trait]
impl OutputSource for StaticOutputSource {
    async fn load(&self) -> Result<ProvisionedOutputs, OutputError> {
        Ok(self.outputs.clone())
    }

    fn describe(&self) -> String {
        format!("{} inline values", self.outputs.len())
    }
}
