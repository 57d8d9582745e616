//! Reconciler configuration.
//!
//! Defines the bound on passes per section update and what counts as a
//! live interaction on a map point.

use serde::{Deserialize, Serialize};
use survey_types::{ReconcileError, ReconcileResult};

/// Configuration for the reconciler and the section update loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Maximum number of passes a single section update may run while
    /// passes keep writing to the tree.
    pub max_rounds: u32,

    /// `properties.lastAction` values marking a map point the respondent is
    /// currently moving. Such points never get their default re-applied.
    pub live_interaction_actions: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            live_interaction_actions: vec![
                "markerDragged".to_string(),
                "mapClicked".to_string(),
                "geocoding".to_string(),
                "findPlace".to_string(),
            ],
        }
    }
}

impl ReconcilerConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> ReconcileResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ReconcileError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.max_rounds == 0 {
            return Err(ReconcileError::InvalidConfig(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_live_interaction(&self, action: &str) -> bool {
        self.live_interaction_actions.iter().any(|a| a == action)
    }
}
