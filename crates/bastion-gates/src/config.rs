//! Gate thresholds, loaded from TOML.
//!
//! Every field has a default, so an empty document yields the baseline
//! thresholds:
//!
//! ```toml
//! min_precision = 0.95
//! max_latency_ms = 250.0
//! min_replay_n = 200   # omit to use the kernel's value
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use bastion_contracts::error::{BastionError, BastionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateThresholds {
    pub min_precision: f64,
    pub min_alignment: f64,
    pub max_latency_ms: f64,
    pub min_drift_correction: f64,
    pub max_planner_mismatch: u64,
    pub max_policy_violations: u64,
    /// `None` falls back to the kernel's `min_replay_n`.
    pub min_replay_n: Option<u64>,
    pub min_optimization_delta: f64,
    /// Safety entropy must stay strictly below this value.
    pub safety_entropy_ceiling: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_precision: 0.95,
            min_alignment: 0.90,
            max_latency_ms: 250.0,
            min_drift_correction: 0.90,
            max_planner_mismatch: 0,
            max_policy_violations: 0,
            min_replay_n: None,
            min_optimization_delta: 0.0,
            safety_entropy_ceiling: 1e-6,
        }
    }
}

impl GateThresholds {
    /// Returns `BastionError::ConfigError` if the TOML is malformed or names
    /// an unknown field.
    pub fn from_toml_str(s: &str) -> BastionResult<Self> {
        toml::from_str(s).map_err(|e| BastionError::ConfigError {
            reason: format!("failed to parse gate thresholds TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> BastionResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BastionError::ConfigError {
            reason: format!("failed to read thresholds file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn effective_min_replay_n(&self, kernel_min_replay_n: u64) -> u64 {
        self.min_replay_n.unwrap_or(kernel_min_replay_n)
    }
}
