//! Controller configuration.
use crate::constants::{DEFAULT_QUIET_PERIOD_MS, DEFAULT_STORAGE_PREFIX};
use crate::transfer::SimulationConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Search debounce quiet period.
    pub quiet_period_ms: u64,
    /// Prefix applied to preference keys by persistent stores.
    pub storage_prefix: String,
    pub simulation: SimulationConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            storage_prefix: String::from(DEFAULT_STORAGE_PREFIX),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }
}
