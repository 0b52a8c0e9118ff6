//! # Conformance Suite
//!
//! Runs the selected scenarios against one resolved topology and collects a
//! [`SuiteReport`]. Scenarios gated behind a disabled feature flag are
//! reported as skipped without touching the queues.
//!
//! Each scenario sends its own correlated message and ignores traffic from
//! the others. Concurrent runs still share the primary queue, so a foreign
//! receive can make the redrive message invisible for one visibility timeout.

use crate::client::QueueService;
use crate::error::{ConformanceError, ErrorClass};
use crate::features::FeatureFlags;
use crate::scenario::{ScenarioId, ScenarioOutcome, ScenarioStatus, SuiteReport};
use crate::settings::ConformanceSettings;
use crate::topology::QueueTopology;
use crate::verifiers::{self, RedriveVerifier, RoundTripVerifier};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

#[cfg(test)]
#[path = "suite_tests.rs"]
mod tests;

/// Runs conformance scenarios against a provisioned topology
#[derive(Clone)]
pub struct ConformanceSuite {
    service: Arc<dyn QueueService>,
    topology: Arc<QueueTopology>,
    features: Arc<FeatureFlags>,
    settings: Arc<ConformanceSettings>,
}

impl ConformanceSuite {
    pub fn new(
        service: Arc<dyn QueueService>,
        topology: QueueTopology,
        features: FeatureFlags,
        settings: ConformanceSettings,
    ) -> Self {
        Self {
            service,
            topology: Arc::new(topology),
            features: Arc::new(features),
            settings: Arc::new(settings),
        }
    }

    pub fn topology(&self) -> &QueueTopology {
        &self.topology
    }

    /// Run every known scenario
    pub async fn run_all(&self) -> SuiteReport {
        self.run(&ScenarioId::ALL).await
    }

    /// Run the selected scenarios, reporting outcomes in selection order
    pub async fn run(&self, selection: &[ScenarioId]) -> SuiteReport {
        let started_at = Utc::now();
        info!(
            topology = %self.topology,
            scenarios = selection.len(),
            parallel = self.settings.suite.parallel,
            "Starting conformance suite"
        );

        if self.settings.suite.parallel
            && selection.contains(&ScenarioId::SendAndReceiveMessage)
            && selection.contains(&ScenarioId::SendAndFailToReceiveMessage)
        {
            warn!("Concurrent receives on the primary queue can advance the redrive receive count early");
        }

        let outcomes = if self.settings.suite.parallel {
            self.run_concurrently(selection).await
        } else {
            let mut outcomes = Vec::with_capacity(selection.len());
            for scenario in selection {
                outcomes.push(self.run_scenario(*scenario).await);
            }
            outcomes
        };

        let report = SuiteReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Conformance suite finished"
        );
        report
    }

    async fn run_concurrently(&self, selection: &[ScenarioId]) -> Vec<ScenarioOutcome> {
        let mut joins = JoinSet::new();
        for (index, scenario) in selection.iter().copied().enumerate() {
            let suite = self.clone();
            joins.spawn(async move { (index, suite.run_scenario(scenario).await) });
        }

        let mut slots: Vec<Option<ScenarioOutcome>> = vec![None; selection.len()];
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(join_error) => error!(error = %join_error, "Scenario task did not complete"),
            }
        }

        slots
            .into_iter()
            .zip(selection)
            .map(|(slot, scenario)| {
                slot.unwrap_or_else(|| ScenarioOutcome {
                    scenario: *scenario,
                    status: ScenarioStatus::Failed {
                        class: ErrorClass::Setup,
                        cause: "scenario task panicked or was cancelled".to_string(),
                    },
                    elapsed: Duration::ZERO,
                })
            })
            .collect()
    }

    /// Run a single scenario, applying the feature and topology gates first
    pub async fn run_scenario(&self, scenario: ScenarioId) -> ScenarioOutcome {
        if let Some(feature) = scenario.required_feature() {
            if !self.features.is_enabled(feature) {
                info!(scenario = %scenario, feature, "Skipping scenario, feature not enabled");
                return ScenarioOutcome::skipped(
                    scenario,
                    format!("feature '{}' is not enabled", feature),
                );
            }
        }
        if scenario.requires_dead_letter() && !self.topology.has_dead_letter() {
            info!(scenario = %scenario, "Skipping scenario, topology has no dead-letter queue");
            return ScenarioOutcome::skipped(scenario, "topology has no dead-letter queue");
        }

        let span = info_span!("scenario", name = %scenario);
        let started = Instant::now();
        let result = self.execute(scenario).instrument(span).await;
        let elapsed = started.elapsed();

        match result {
            Ok(()) => {
                info!(scenario = %scenario, elapsed_ms = elapsed.as_millis() as u64, "Scenario passed");
                ScenarioOutcome::passed(scenario, elapsed)
            }
            Err(err) => {
                error!(
                    scenario = %scenario,
                    class = %err.class(),
                    error = %err,
                    "Scenario failed"
                );
                ScenarioOutcome::failed(scenario, &err, elapsed)
            }
        }
    }

    async fn execute(&self, scenario: ScenarioId) -> Result<(), ConformanceError> {
        let service = self.service.as_ref();
        let topology = self.topology.as_ref();

        match scenario {
            ScenarioId::QueueExists => verifiers::verify_queue_listed(service, topology.queue()).await,
            ScenarioId::DlqExists => verifiers::verify_dead_letter_listed(service, topology).await,
            ScenarioId::SendAndReceiveMessage => {
                RoundTripVerifier::new(service, topology.queue(), &self.settings.round_trip)
                    .run()
                    .await
                    .map(|_| ())
            }
            ScenarioId::SendAndFailToReceiveMessage => {
                let dead_letter = topology.dead_letter().ok_or_else(|| {
                    ConformanceError::TopologyMismatch {
                        scenario: scenario.name().to_string(),
                    }
                })?;
                RedriveVerifier::new(service, topology.queue(), dead_letter, &self.settings.redrive)
                    .run()
                    .await
                    .map(|_| ())
            }
        }
    }
}

impl std::fmt::Debug for ConformanceSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConformanceSuite")
            .field("topology", &self.topology)
            .field("features", &self.features)
            .finish()
    }
}
