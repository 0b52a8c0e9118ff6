//! Layered configuration for the conformance runner.
//!
//! Sources, later ones overriding earlier ones:
//!  1. `queue-conformance.{yaml,toml,json}` in the working directory (optional)
//!  2. An explicit file from `--config` / `QC_CONFIG_FILE` (required when given)
//!  3. Environment variables prefixed `QC__` with a `__` separator,
//!     e.g. `QC__REDRIVE__MAX_RECEIVE_COUNT=3`

use queue_conformance_core::{
    ConfigurationError, ConformanceSettings, FeatureFlags, JsonFileOutputSource, OutputSource,
    ProvisionedOutputs, ReceiveOptions, RedriveSettings, RoundTripSettings, SqsSettings,
    StaticOutputSource, SuiteSettings, TerraformOutputSource,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;

/// Base name of the optional configuration file in the working directory
pub const DEFAULT_CONFIG_NAME: &str = "queue-conformance";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "QC";

/// Complete runner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    pub outputs: OutputsConfig,
    pub features: FeaturesConfig,
    pub aws: SqsSettings,
    pub round_trip: RoundTripSettings,
    pub redrive: RedriveSettings,
    pub receive: ReceiveOptions,
    pub suite: SuiteSettings,
    pub logging: LoggingConfig,
}

/// Where provisioning outputs are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSourceKind {
    /// Run `terraform output -json` in `terraform_dir`
    #[default]
    Terraform,
    /// Read a captured `terraform output -json` document
    File,
    /// Use `values` directly
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    pub source: OutputSourceKind,
    pub terraform_dir: Option<PathBuf>,
    pub terraform_binary: String,
    pub file: Option<PathBuf>,
    pub values: BTreeMap<String, String>,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            source: OutputSourceKind::Terraform,
            terraform_dir: None,
            terraform_binary: "terraform".to_string(),
            file: None,
            values: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Enabled scenario categories, e.g. `["dlq"]`
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ConformanceConfig {
    /// Load configuration from the layered sources.
    ///
    /// The result is not validated; command-line overrides are applied first.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder().add_source(
            config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        );

        if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(ConfigurationError::Missing {
                    key: format!("configuration file {}", path.display()),
                });
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("features.enabled"),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize::<ConformanceConfig>())
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })
    }

    /// Verifier settings carried by this configuration
    pub fn settings(&self) -> ConformanceSettings {
        ConformanceSettings {
            round_trip: self.round_trip.clone(),
            redrive: self.redrive.clone(),
            receive: self.receive,
            suite: self.suite.clone(),
        }
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags::new(&self.features.enabled)
    }

    /// Enable additional scenario categories
    pub fn enable_features<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.features.enabled.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                self.features.enabled.push(tag);
            }
        }
    }

    /// Read outputs from a captured JSON file
    pub fn use_outputs_file(&mut self, path: impl Into<PathBuf>) {
        self.outputs.source = OutputSourceKind::File;
        self.outputs.file = Some(path.into());
    }

    /// Read outputs by running terraform in a module directory
    pub fn use_terraform_dir(&mut self, dir: impl Into<PathBuf>) {
        self.outputs.source = OutputSourceKind::Terraform;
        self.outputs.terraform_dir = Some(dir.into());
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.settings().validate()?;

        match self.outputs.source {
            OutputSourceKind::Terraform => {
                if self.outputs.terraform_dir.is_none() {
                    return Err(ConfigurationError::Missing {
                        key: "outputs.terraform_dir".to_string(),
                    });
                }
                if self.outputs.terraform_binary.trim().is_empty() {
                    return Err(ConfigurationError::Invalid {
                        message: "outputs.terraform_binary must not be empty".to_string(),
                    });
                }
            }
            OutputSourceKind::File => {
                if self.outputs.file.is_none() {
                    return Err(ConfigurationError::Missing {
                        key: "outputs.file".to_string(),
                    });
                }
            }
            OutputSourceKind::Inline => {
                if self.outputs.values.is_empty() {
                    return Err(ConfigurationError::Missing {
                        key: "outputs.values".to_string(),
                    });
                }
            }
        }

        log_filter(&self.logging.level)?;

        Ok(())
    }

    /// Build the output source selected by `outputs.source`
    pub fn output_source(&self) -> Result<Box<dyn OutputSource>, ConfigurationError> {
        match self.outputs.source {
            OutputSourceKind::Terraform => {
                let dir = self.outputs.terraform_dir.clone().ok_or_else(|| {
                    ConfigurationError::Missing {
                        key: "outputs.terraform_dir".to_string(),
                    }
                })?;
                Ok(Box::new(
                    TerraformOutputSource::new(dir).with_binary(&self.outputs.terraform_binary),
                ))
            }
            OutputSourceKind::File => {
                let file = self
                    .outputs
                    .file
                    .clone()
                    .ok_or_else(|| ConfigurationError::Missing {
                        key: "outputs.file".to_string(),
                    })?;
                Ok(Box::new(JsonFileOutputSource::new(file)))
            }
            OutputSourceKind::Inline => Ok(Box::new(StaticOutputSource::new(
                ProvisionedOutputs::new(self.outputs.values.clone()),
            ))),
        }
    }
}

/// Parse a log level or `EnvFilter` directive list such as
/// `info,queue_conformance_core=debug`
pub fn log_filter(directives: &str) -> Result<EnvFilter, ConfigurationError> {
    EnvFilter::try_new(directives).map_err(|e| ConfigurationError::Invalid {
        message: format!("log filter '{}' is not valid: {}", directives, e),
    })
}
