//! Feature-flag gate deciding which optional scenario categories run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[cfg(test)]
#[path = "features_tests.rs"]
mod tests;

/// Tag enabling the dead-letter scenarios
pub const DLQ_FEATURE: &str = "dlq";

/// Read-only set of enabled scenario categories for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags {
    enabled: BTreeSet<String>,
}

impl FeatureFlags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            enabled: tags
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Check whether a scenario category is enabled (case-insensitive)
    pub fn is_enabled(&self, tag: &str) -> bool {
        self.enabled.contains(&tag.to_ascii_lowercase())
    }

    pub fn dead_letter_enabled(&self) -> bool {
        self.is_enabled(DLQ_FEATURE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}
