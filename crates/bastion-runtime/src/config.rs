//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! agent_id = "ops-agent"
//! state_dir = "/var/lib/bastion"
//! replay_trials = 100
//!
//! [toolchain_pins]
//! rustc = "1.82.0"
//! cargo = "1.82.0"
//!
//! [thresholds]
//! max_latency_ms = 500.0
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bastion_contracts::error::{BastionError, BastionResult};
use bastion_gates::GateThresholds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub agent_id: String,
    /// Directory holding the execution log, status and telemetry files.
    pub state_dir: PathBuf,
    pub execution_log: String,
    pub status_file: String,
    pub telemetry_file: String,
    /// Planner replays run by the determinism pre-flight check.
    pub replay_trials: u64,
    /// Capacity of the sync metrics window and planner cache.
    pub metrics_window: usize,
    /// Number of recent executions whose policy violations G10 counts.
    pub violation_window: usize,
    /// Lifetime of the default capability token, in seconds.
    pub token_ttl_secs: i64,
    /// Toolchain pins written into the bootstrap kernel. Empty pins the
    /// toolchain the runtime was built with.
    pub toolchain_pins: BTreeMap<String, String>,
    /// Environment fingerprint recorded on the approved host. When unset,
    /// the fingerprint of this host under the kernel's pins is the baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_env_fingerprint: Option<String>,
    pub thresholds: GateThresholds,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            agent_id: "bastion-agent".to_string(),
            state_dir: PathBuf::from(".bastion"),
            execution_log: "execution.jsonl".to_string(),
            status_file: "status.json".to_string(),
            telemetry_file: "telemetry.json".to_string(),
            replay_trials: 100,
            metrics_window: 256,
            violation_window: 32,
            token_ttl_secs: 3600,
            toolchain_pins: BTreeMap::new(),
            pinned_env_fingerprint: None,
            thresholds: GateThresholds::default(),
        }
    }
}

impl RuntimeConfig {
    /// Default configuration rooted at `state_dir`.
    pub fn in_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> BastionResult<Self> {
        toml::from_str(s).map_err(|e| BastionError::ConfigError {
            reason: format!("failed to parse runtime TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> BastionResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BastionError::ConfigError {
            reason: format!("failed to read runtime config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn execution_log_path(&self) -> PathBuf {
        self.state_dir.join(&self.execution_log)
    }

    pub fn status_path(&self) -> PathBuf {
        self.state_dir.join(&self.status_file)
    }

    pub fn telemetry_path(&self) -> PathBuf {
        self.state_dir.join(&self.telemetry_file)
    }
}
