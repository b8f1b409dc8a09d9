//! Workspace configuration.

use crate::persist::resolver::DEFAULT_FRESHNESS_WINDOW;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workspace configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Session identity recorded as comment author.
    pub author: String,

    /// How long a persisted notes write beats in-memory notes at load.
    pub freshness_window: Duration,

    /// Delay between hydration and the orphan sweep.
    pub sweep_delay: Duration,

    /// Quiet period before an edited notes value is written through.
    pub notes_debounce: Duration,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            author: "Current User".to_string(),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            sweep_delay: Duration::from_secs(2),
            notes_debounce: Duration::from_millis(500),
        }
    }
}

impl WorkspaceConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}
