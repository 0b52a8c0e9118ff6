//! # Queue Conformance CLI
//!
//! Command-line runner for the queue conformance scenarios.
//!
//! This module provides commands for:
//! - Running the scenarios against a provisioned queue topology
//! - Listing the registered scenarios
//! - Resolving provisioning outputs without touching the queues
//! - Showing the resolved configuration

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use queue_conformance_core::{
    ConfigurationError, ConformanceError, ConformanceSuite, OutputError, QueueServiceError,
    ResourceLocator, ScenarioId, SqsQueueService, SuiteReport,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod configuration;

pub use configuration::{log_filter, ConformanceConfig, LogFormat, OutputSourceKind};

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue conformance runner
#[derive(Parser, Debug)]
#[command(name = "queue-conformance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Behavioral conformance checks for provisioned SQS queues")]
#[command(
    long_about = "Verifies that provisioned queues are discoverable, round-trip messages, and redrive unacknowledged messages to their dead-letter queue"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QC_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (overrides logging.level; RUST_LOG wins over both)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run conformance scenarios
    Run(RunArgs),

    /// List registered scenarios
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Resolve provisioning outputs and print the queue topology
    Outputs {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the resolved configuration
    Config {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Arguments for the `run` command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario to run, by name or alias (repeatable; default all)
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<ScenarioId>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Run scenarios concurrently
    #[arg(long)]
    pub parallel: bool,
}

/// Overrides for where outputs come from and which features are on
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Enable a scenario category, e.g. `dlq` (repeatable)
    #[arg(short, long = "enable")]
    pub enable: Vec<String>,

    /// Read outputs from a captured `terraform output -json` file
    #[arg(long, conflicts_with = "terraform_dir")]
    pub outputs_file: Option<PathBuf>,

    /// Run `terraform output -json` in this directory
    #[arg(long)]
    pub terraform_dir: Option<PathBuf>,
}

/// Report output formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Configuration output formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Setup error: {0}")]
    Setup(#[from] ConformanceError),

    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<OutputError> for CliError {
    fn from(e: OutputError) -> Self {
        Self::Setup(e.into())
    }
}

impl From<QueueServiceError> for CliError {
    fn from(e: QueueServiceError) -> Self {
        Self::Setup(e.into())
    }
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Setup(_) | Self::Io(_) | Self::Serialization { .. } => 2,
            Self::ScenariosFailed { .. } => 3,
            Self::InvalidArgument { .. } => 4,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            return Err(CliError::InvalidArgument {
                arg: "command line".to_string(),
                message: e.to_string(),
            })
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out).await
}

/// Execute a parsed command line, writing command output to `out`
pub async fn execute(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    if let Commands::List { format } = &cli.command {
        return execute_list_command(*format, out);
    }

    let mut config = ConformanceConfig::load(cli.config.as_deref())?;
    initialize_logging(&cli, &config)?;

    match cli.command {
        Commands::Run(args) => {
            apply_source_args(&mut config, &args.source);
            if args.parallel {
                config.suite.parallel = true;
            }
            config.validate()?;
            execute_run_command(&config, &args.scenarios, args.format, out).await
        }
        Commands::Outputs { source, format } => {
            apply_source_args(&mut config, &source);
            config.validate()?;
            execute_outputs_command(&config, format, out).await
        }
        Commands::Config { source, format } => {
            apply_source_args(&mut config, &source);
            execute_config_command(&config, format, out)
        }
        Commands::List { .. } => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging to stderr so stdout carries only command output
fn initialize_logging(cli: &Cli, config: &ConformanceConfig) -> Result<(), CliError> {
    let configured = match &cli.log_level {
        Some(level) => log_filter(level).map_err(|e| CliError::InvalidArgument {
            arg: "--log-level".to_string(),
            message: e.to_string(),
        })?,
        None => log_filter(&config.logging.level)?,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    let json = cli.json_logs || config.logging.format == LogFormat::Json;
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    // A subscriber may already be installed when embedded or under test.
    if let Err(e) = result {
        debug!(error = %e, "Logging already initialized");
    }
    Ok(())
}

fn apply_source_args(config: &mut ConformanceConfig, source: &SourceArgs) {
    config.enable_features(source.enable.iter().cloned());
    if let Some(file) = &source.outputs_file {
        config.use_outputs_file(file);
    }
    if let Some(dir) = &source.terraform_dir {
        config.use_terraform_dir(dir);
    }
}

/// Selected scenarios in order, without duplicates; all when none given
fn selected_scenarios(requested: &[ScenarioId]) -> Vec<ScenarioId> {
    if requested.is_empty() {
        return ScenarioId::ALL.to_vec();
    }
    let mut selection = Vec::with_capacity(requested.len());
    for scenario in requested {
        if !selection.contains(scenario) {
            selection.push(*scenario);
        }
    }
    selection
}

async fn execute_run_command(
    config: &ConformanceConfig,
    scenarios: &[ScenarioId],
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let features = config.feature_flags();
    let source = config.output_source()?;
    let topology = ResourceLocator::resolve(source.as_ref(), &features).await?;

    let service = SqsQueueService::connect(&config.aws, config.receive).await?;
    let suite = ConformanceSuite::new(Arc::new(service), topology, features, config.settings());

    let selection = selected_scenarios(scenarios);
    info!(scenarios = selection.len(), "Running conformance scenarios");
    let report = suite.run(&selection).await;

    write_report(&report, format, out)?;

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: report.failed(),
            total: report.outcomes.len(),
        })
    }
}

/// Write a suite report in the requested format
pub fn write_report(
    report: &SuiteReport,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => out.write_all(report.render_text().as_bytes())?,
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).map_err(|e| CliError::Serialization {
                message: e.to_string(),
            })?;
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}

fn execute_list_command(format: OutputFormat, out: &mut dyn Write) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => {
            for scenario in ScenarioId::ALL {
                writeln!(
                    out,
                    "{:<28} {:<13} {:<5} {}",
                    scenario.name(),
                    scenario.alias(),
                    scenario.required_feature().unwrap_or("-"),
                    scenario.description()
                )?;
            }
        }
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = ScenarioId::ALL
                .iter()
                .map(|scenario| {
                    serde_json::json!({
                        "name": scenario.name(),
                        "alias": scenario.alias(),
                        "required_feature": scenario.required_feature(),
                        "description": scenario.description(),
                    })
                })
                .collect();
            let json = serde_json::to_string_pretty(&entries).map_err(|e| {
                CliError::Serialization {
                    message: e.to_string(),
                }
            })?;
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}

async fn execute_outputs_command(
    config: &ConformanceConfig,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let source = config.output_source()?;
    let topology = ResourceLocator::resolve(source.as_ref(), &config.feature_flags()).await?;

    match format {
        OutputFormat::Text => writeln!(out, "{}", topology)?,
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&topology).map_err(|e| {
                CliError::Serialization {
                    message: e.to_string(),
                }
            })?;
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}

fn execute_config_command(
    config: &ConformanceConfig,
    format: ConfigFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| CliError::Serialization {
            message: e.to_string(),
        })?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| CliError::Serialization {
                message: e.to_string(),
            })?
        }
    };
    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
