//! Rolling-metric snapshots consumed by the sync (G10) and invariant
//! fixation (G11) gates.
//!
//! Snapshots are computed on demand from bounded in-memory history; the raw
//! observations are never persisted.

use serde::{Deserialize, Serialize};

/// Short-horizon behavioral metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub precision: f64,
    pub alignment_score: f64,
    pub latency_ms: f64,
    pub drift_correction_success: f64,
    /// Planner nondeterminism events inside the window.
    pub planner_mismatch: u64,
    /// Number of observations the snapshot was computed from.
    pub observations: usize,
    /// True when the window was empty and ideal values were substituted.
    pub bootstrap_defaults: bool,
}

impl SyncSnapshot {
    /// The all-ideal snapshot reported before any behavior is observed.
    pub fn bootstrap() -> Self {
        Self {
            precision: 1.0,
            alignment_score: 1.0,
            latency_ms: 0.0,
            drift_correction_success: 1.0,
            planner_mismatch: 0,
            observations: 0,
            bootstrap_defaults: true,
        }
    }
}

/// Long-horizon self-modification metrics for one committed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixationSnapshot {
    pub epoch_id: String,
    /// 1.0 when the live kernel hash matched the held hash at commit.
    pub kernel_integrity: f64,
    pub ac_sha256_before: String,
    pub ac_sha256_after: String,
    /// Objective improvement across the epoch (after minus before).
    pub optimization_delta: f64,
    pub safety_entropy: f64,
    pub replay_n: u64,
    pub replay_mismatch: u64,
    pub compliance_regression: bool,
    pub architecture_review_ok: bool,
    pub change_failure_rate: f64,
}

impl FixationSnapshot {
    /// Placeholder used before any epoch is committed; G11 reports it as
    /// NOT_READY because `replay_n` is zero.
    pub fn unobserved(kernel_sha256: &str) -> Self {
        Self {
            epoch_id: "none".to_string(),
            kernel_integrity: 1.0,
            ac_sha256_before: kernel_sha256.to_string(),
            ac_sha256_after: kernel_sha256.to_string(),
            optimization_delta: 0.0,
            safety_entropy: 0.0,
            replay_n: 0,
            replay_mismatch: 0,
            compliance_regression: false,
            architecture_review_ok: false,
            change_failure_rate: 0.0,
        }
    }
}
