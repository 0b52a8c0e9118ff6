//! Tests for the queue-conformance-cli library module.

use super::*;
use queue_conformance_core::{AssertionFailure, ErrorClass, ScenarioOutcome, ScenarioStatus};
use std::io::Write as _;
use std::time::Duration;

const OUTPUTS: &str = r#"{
  "queue_name": { "sensitive": false, "type": "string", "value": "orders" },
  "queue_url": { "sensitive": false, "type": "string", "value": "https://sqs.us-east-1.amazonaws.com/123456789012/orders" },
  "dlq_name": { "sensitive": false, "type": "string", "value": "orders-dlq" },
  "dlq_url": { "sensitive": false, "type": "string", "value": "https://sqs.us-east-1.amazonaws.com/123456789012/orders-dlq" }
}"#;

fn outputs_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(OUTPUTS.as_bytes()).unwrap();
    file
}

async fn execute_to_string(args: &[&str]) -> (Result<(), CliError>, String) {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    let result = execute(cli, &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

// ============================================================================
// Argument Parsing
// ============================================================================

mod parsing {
    use super::*;

    #[test]
    fn test_run_parses_scenarios_and_overrides() {
        let cli = Cli::try_parse_from([
            "queue-conformance",
            "run",
            "--scenario",
            "round-trip",
            "-s",
            "QueueExists",
            "--enable",
            "dlq",
            "--outputs-file",
            "outputs.json",
            "--format",
            "json",
            "--parallel",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(
                    args.scenarios,
                    vec![ScenarioId::SendAndReceiveMessage, ScenarioId::QueueExists]
                );
                assert_eq!(args.source.enable, vec!["dlq".to_string()]);
                assert_eq!(args.source.outputs_file, Some(PathBuf::from("outputs.json")));
                assert_eq!(args.format, OutputFormat::Json);
                assert!(args.parallel);
            }
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_scenario_is_rejected() {
        let err = Cli::try_parse_from(["queue-conformance", "run", "--scenario", "Purge"]).unwrap_err();
        assert!(err.to_string().contains("unknown scenario"));
    }

    #[test]
    fn test_outputs_file_conflicts_with_terraform_dir() {
        let result = Cli::try_parse_from([
            "queue-conformance",
            "outputs",
            "--outputs-file",
            "a.json",
            "--terraform-dir",
            "infra",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "queue-conformance",
            "--config",
            "qc.yaml",
            "--log-level",
            "debug",
            "--json-logs",
            "list",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("qc.yaml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.json_logs);
    }

    #[test]
    fn test_selection_defaults_to_all_and_deduplicates() {
        assert_eq!(selected_scenarios(&[]), ScenarioId::ALL.to_vec());
        assert_eq!(
            selected_scenarios(&[
                ScenarioId::DlqExists,
                ScenarioId::QueueExists,
                ScenarioId::DlqExists
            ]),
            vec![ScenarioId::DlqExists, ScenarioId::QueueExists]
        );
    }
}

// ============================================================================
// Exit Codes
// ============================================================================

mod exit_codes {
    use super::*;

    #[test]
    fn test_exit_codes_by_error_kind() {
        let configuration = CliError::from(ConfigurationError::Missing {
            key: "outputs.file".to_string(),
        });
        let setup = CliError::from(OutputError::Missing {
            key: "queue_url".to_string(),
        });
        let credentials = CliError::from(QueueServiceError::Credentials {
            message: "no provider".to_string(),
        });
        let failed = CliError::ScenariosFailed { failed: 1, total: 4 };
        let invalid = CliError::InvalidArgument {
            arg: "--scenario".to_string(),
            message: "unknown".to_string(),
        };

        assert_eq!(configuration.exit_code(), 1);
        assert_eq!(setup.exit_code(), 2);
        assert_eq!(credentials.exit_code(), 2);
        assert_eq!(failed.exit_code(), 3);
        assert_eq!(invalid.exit_code(), 4);
    }

    #[test]
    fn test_missing_output_message_names_key() {
        let err = CliError::from(OutputError::Missing {
            key: "dlq_url".to_string(),
        });
        assert!(err.to_string().contains("Missing required infrastructure output: dlq_url"));
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn test_list_prints_every_scenario() {
        let (result, out) = execute_to_string(&["queue-conformance", "list"]).await;

        result.unwrap();
        for scenario in ScenarioId::ALL {
            assert!(out.contains(scenario.name()), "missing {} in {}", scenario, out);
        }
        assert!(out.contains("dlq"));
    }

    #[tokio::test]
    async fn test_list_json() {
        let (result, out) = execute_to_string(&["queue-conformance", "list", "--format", "json"]).await;

        result.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
        assert_eq!(value[1]["required_feature"], "dlq");
        assert!(value[0]["required_feature"].is_null());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_outputs_resolves_topology_from_file() {
        let file = outputs_file();
        let path = file.path().to_str().unwrap().to_string();

        let (result, out) = execute_to_string(&[
            "queue-conformance",
            "outputs",
            "--outputs-file",
            &path,
            "--enable",
            "dlq",
        ])
        .await;

        result.unwrap();
        assert!(out.contains("with dead-letter queue orders-dlq"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_outputs_missing_key_is_setup_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"queue_name": {"value": "orders"}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let (result, _) =
            execute_to_string(&["queue-conformance", "outputs", "--outputs-file", &path]).await;

        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("queue_url"));
    }

    /// Verify a run without any output location fails as a configuration error.
    #[tokio::test]
    #[serial_test::serial]
    async fn test_run_without_output_location_is_configuration_error() {
        let (result, _) = execute_to_string(&["queue-conformance", "run"]).await;

        let err = result.unwrap_err();
        assert!(matches!(err, CliError::Configuration(_)));
        assert_eq!(err.exit_code(), 1);
    }

    /// Verify `--log-level` goes through the same filter rule as `logging.level`.
    #[tokio::test]
    #[serial_test::serial]
    async fn test_invalid_log_level_flag_is_invalid_argument() {
        let (result, _) = execute_to_string(&[
            "queue-conformance",
            "--log-level",
            "queue_conformance_core=loud",
            "config",
        ])
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { ref arg, .. } if arg == "--log-level"));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_config_shows_overrides_as_yaml() {
        let (result, out) = execute_to_string(&[
            "queue-conformance",
            "config",
            "--outputs-file",
            "captured.json",
            "--enable",
            "dlq",
        ])
        .await;

        result.unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(value["outputs"]["source"].as_str(), Some("file"));
        assert_eq!(value["outputs"]["file"].as_str(), Some("captured.json"));
        assert_eq!(value["redrive"]["max_receive_count"].as_u64(), Some(1));
        assert_eq!(value["features"]["enabled"][0].as_str(), Some("dlq"));
    }
}

// ============================================================================
// Report Rendering
// ============================================================================

mod report {
    use super::*;

    fn sample_report() -> SuiteReport {
        let now = chrono_now();
        let failure = ConformanceError::from(AssertionFailure::NoMessageReceived {
            queue_url: "https://sqs.us-east-1.amazonaws.com/123456789012/orders-dlq".to_string(),
            waited: Duration::from_secs(60),
        });
        SuiteReport {
            started_at: now,
            finished_at: now,
            outcomes: vec![
                ScenarioOutcome::passed(ScenarioId::QueueExists, Duration::from_millis(40)),
                ScenarioOutcome::failed(
                    ScenarioId::SendAndFailToReceiveMessage,
                    &failure,
                    Duration::from_secs(66),
                ),
            ],
        }
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_text_report() {
        let mut out = Vec::new();
        write_report(&sample_report(), OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("PASS QueueExists"));
        assert!(text.contains("FAIL SendAndFailToReceiveMessage"));
        assert!(text.contains("1 passed, 1 failed, 0 skipped"));
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_report(&sample_report(), OutputFormat::Json, &mut out).unwrap();

        let parsed: SuiteReport = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.outcomes.len(), 2);
        assert!(matches!(
            parsed.outcomes[1].status,
            ScenarioStatus::Failed { class: ErrorClass::Assertion, .. }
        ));
    }
}
