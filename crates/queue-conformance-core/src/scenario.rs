//! Scenario identifiers, per-scenario outcomes and the suite report.

use crate::error::{ConformanceError, ErrorClass};
use crate::features::DLQ_FEATURE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod tests;

// ============================================================================
// Scenario Identifiers
// ============================================================================

/// A named conformance scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScenarioId {
    QueueExists,
    DlqExists,
    SendAndReceiveMessage,
    SendAndFailToReceiveMessage,
}

impl ScenarioId {
    /// Every scenario in execution order
    pub const ALL: [ScenarioId; 4] = [
        ScenarioId::QueueExists,
        ScenarioId::DlqExists,
        ScenarioId::SendAndReceiveMessage,
        ScenarioId::SendAndFailToReceiveMessage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueueExists => "QueueExists",
            Self::DlqExists => "DlqExists",
            Self::SendAndReceiveMessage => "SendAndReceiveMessage",
            Self::SendAndFailToReceiveMessage => "SendAndFailToReceiveMessage",
        }
    }

    /// Short kebab-case alias accepted on the command line
    pub fn alias(&self) -> &'static str {
        match self {
            Self::QueueExists => "queue-exists",
            Self::DlqExists => "dlq-exists",
            Self::SendAndReceiveMessage => "round-trip",
            Self::SendAndFailToReceiveMessage => "redrive",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::QueueExists => "The primary queue is listed under its name",
            Self::DlqExists => "The dead-letter queue is listed under its name",
            Self::SendAndReceiveMessage => {
                "A sent message is received unchanged and stays gone once deleted"
            }
            Self::SendAndFailToReceiveMessage => {
                "An unacknowledged message is moved to the dead-letter queue"
            }
        }
    }

    /// Feature flag that must be enabled for the scenario to run
    pub fn required_feature(&self) -> Option<&'static str> {
        match self {
            Self::QueueExists | Self::SendAndReceiveMessage => None,
            Self::DlqExists | Self::SendAndFailToReceiveMessage => Some(DLQ_FEATURE),
        }
    }

    pub fn requires_dead_letter(&self) -> bool {
        self.required_feature() == Some(DLQ_FEATURE)
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(wanted) || id.alias() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|id| id.name()).collect();
                format!("unknown scenario '{}' (known: {})", wanted, known.join(", "))
            })
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a single scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed { class: ErrorClass, cause: String },
    Skipped { reason: String },
}

impl ScenarioStatus {
    pub fn failed(error: &ConformanceError) -> Self {
        Self::Failed {
            class: error.class(),
            cause: error.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed { .. } => "FAIL",
            Self::Skipped { .. } => "SKIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: ScenarioId,
    #[serde(flatten)]
    pub status: ScenarioStatus,
    #[serde(rename = "elapsed_ms", with = "crate::polling::duration_ms")]
    pub elapsed: Duration,
}

impl ScenarioOutcome {
    pub fn passed(scenario: ScenarioId, elapsed: Duration) -> Self {
        Self {
            scenario,
            status: ScenarioStatus::Passed,
            elapsed,
        }
    }

    pub fn skipped(scenario: ScenarioId, reason: impl Into<String>) -> Self {
        Self {
            scenario,
            status: ScenarioStatus::Skipped {
                reason: reason.into(),
            },
            elapsed: Duration::ZERO,
        }
    }

    pub fn failed(scenario: ScenarioId, error: &ConformanceError, elapsed: Duration) -> Self {
        Self {
            scenario,
            status: ScenarioStatus::failed(error),
            elapsed,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, ScenarioStatus::Failed { .. })
    }
}

// ============================================================================
// Suite Report
// ============================================================================

/// Outcomes of one suite run, in scenario order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.count(|s| matches!(s, ScenarioStatus::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ScenarioStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ScenarioStatus::Skipped { .. }))
    }

    /// True when no scenario failed. Skips do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Outcome of a specific scenario, if it was selected
    pub fn outcome(&self, scenario: ScenarioId) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }

    /// Human readable multi-line summary
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            out.push_str(&format!(
                "{:<4} {:<28} {:>7}ms",
                outcome.status.label(),
                outcome.scenario.name(),
                outcome.elapsed.as_millis()
            ));
            match &outcome.status {
                ScenarioStatus::Passed => {}
                ScenarioStatus::Failed { class, cause } => {
                    out.push_str(&format!("  [{}] {}", class, cause));
                }
                ScenarioStatus::Skipped { reason } => {
                    out.push_str(&format!("  {}", reason));
                }
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} passed, {} failed, {} skipped in {}ms\n",
            self.passed(),
            self.failed(),
            self.skipped(),
            (self.finished_at - self.started_at).num_milliseconds().max(0)
        ));
        out
    }

    fn count(&self, predicate: impl Fn(&ScenarioStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}
