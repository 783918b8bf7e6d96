//! The self-modification boundary.
//!
//! Holds the kernel hash the agent was booted against and enforces the
//! kernel/peripheral split on every proposed mutation epoch. A kernel-hash
//! mismatch halts the boundary permanently: every later proposal is
//! rejected without being evaluated. Only the governance authority can
//! restore a last-known-good hash, and doing so leaves the boundary halted.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use bastion_contracts::metrics::FixationSnapshot;

use crate::planner::ReplayReport;
use crate::window::RollingWindow;

/// Marker carried by every rejection caused by the halted state.
pub const HALTED_MARKER: &str = "halted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentScope {
    Kernel,
    Peripheral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralMutation {
    pub component: String,
    pub scope: ComponentScope,
    pub reversible: bool,
    pub provenance_attested: bool,
    pub description: String,
}

/// A batch of peripheral mutations tied to one kernel hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfModEpoch {
    pub epoch_id: String,
    pub kernel_sha256: String,
    pub mutations: Vec<PeripheralMutation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationDecision {
    pub approved: bool,
    pub violations: Vec<String>,
}

impl MutationDecision {
    fn rejected(violations: Vec<String>) -> Self {
        Self {
            approved: false,
            violations,
        }
    }
}

/// Measurements gathered while an epoch ran, folded into its snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochOutcome {
    pub optimization_before: f64,
    pub optimization_after: f64,
    pub safety_entropy: f64,
    pub replay: ReplayReport,
    pub compliance_regression: bool,
    pub architecture_review_ok: bool,
    pub changes_attempted: u64,
    pub changes_failed: u64,
}

struct BoundaryState {
    kernel_sha256: String,
    halted: bool,
    history: RollingWindow<FixationSnapshot>,
}

pub struct SelfModificationBoundary {
    state: Mutex<BoundaryState>,
}

impl SelfModificationBoundary {
    pub fn new(kernel_sha256: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(BoundaryState {
                kernel_sha256: kernel_sha256.into(),
                halted: false,
                history: RollingWindow::new(history_capacity),
            }),
        }
    }

    // A poisoned lock means a caller panicked mid-decision; fail closed.
    fn lock(&self) -> MutexGuard<'_, BoundaryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                guard.halted = true;
                guard
            }
        }
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    pub fn kernel_sha256(&self) -> String {
        self.lock().kernel_sha256.clone()
    }

    fn integrity_locked(state: &mut BoundaryState, live_sha256: &str) -> bool {
        if state.halted {
            return false;
        }
        if live_sha256 != state.kernel_sha256 {
            state.halted = true;
            error!(
                held = %state.kernel_sha256,
                live = %live_sha256,
                "kernel integrity violated; boundary halted"
            );
            return false;
        }
        true
    }

    /// True iff the boundary is live and `live_sha256` equals the held hash.
    /// A mismatch halts the boundary permanently.
    pub fn check_kernel_integrity(&self, live_sha256: &str) -> bool {
        Self::integrity_locked(&mut self.lock(), live_sha256)
    }

    /// Decide whether `epoch` may be applied. Returns every violation found.
    pub fn propose_mutation(&self, epoch: &SelfModEpoch, live_sha256: &str) -> MutationDecision {
        let mut state = self.lock();

        if state.halted {
            return MutationDecision::rejected(vec![format!(
                "boundary {HALTED_MARKER}: epoch '{}' not evaluated",
                epoch.epoch_id
            )]);
        }
        if !Self::integrity_locked(&mut state, live_sha256) {
            return MutationDecision::rejected(vec![format!(
                "boundary {HALTED_MARKER}: live kernel hash '{live_sha256}' differs from held hash"
            )]);
        }

        let mut violations = Vec::new();
        if epoch.kernel_sha256 != state.kernel_sha256 {
            violations.push(format!(
                "epoch '{}' is tied to kernel '{}', boundary holds '{}'",
                epoch.epoch_id, epoch.kernel_sha256, state.kernel_sha256
            ));
        }
        for m in &epoch.mutations {
            if m.scope == ComponentScope::Kernel {
                violations.push(format!(
                    "mutation of '{}' targets a kernel-scoped component",
                    m.component
                ));
            }
            if !m.reversible {
                violations.push(format!("mutation of '{}' is not reversible", m.component));
            }
            if !m.provenance_attested {
                violations.push(format!(
                    "mutation of '{}' lacks provenance attestation",
                    m.component
                ));
            }
        }

        if violations.is_empty() {
            info!(
                epoch_id = %epoch.epoch_id,
                mutations = epoch.mutations.len(),
                "mutation epoch approved"
            );
            MutationDecision {
                approved: true,
                violations,
            }
        } else {
            warn!(
                epoch_id = %epoch.epoch_id,
                violations = violations.len(),
                "mutation epoch rejected"
            );
            MutationDecision::rejected(violations)
        }
    }

    /// Close an epoch and produce its long-horizon snapshot.
    pub fn commit_epoch(
        &self,
        epoch: &SelfModEpoch,
        outcome: &EpochOutcome,
        live_sha256: &str,
    ) -> FixationSnapshot {
        let mut state = self.lock();
        let intact = Self::integrity_locked(&mut state, live_sha256);

        let change_failure_rate = if outcome.changes_attempted == 0 {
            0.0
        } else {
            outcome.changes_failed as f64 / outcome.changes_attempted as f64
        };

        let snapshot = FixationSnapshot {
            epoch_id: epoch.epoch_id.clone(),
            kernel_integrity: if intact { 1.0 } else { 0.0 },
            ac_sha256_before: epoch.kernel_sha256.clone(),
            ac_sha256_after: live_sha256.to_string(),
            optimization_delta: outcome.optimization_after - outcome.optimization_before,
            safety_entropy: outcome.safety_entropy,
            replay_n: outcome.replay.replay_n,
            replay_mismatch: outcome.replay.replay_mismatch,
            compliance_regression: outcome.compliance_regression,
            architecture_review_ok: outcome.architecture_review_ok,
            change_failure_rate,
        };
        state.history.push(snapshot.clone());
        snapshot
    }

    pub fn latest_snapshot(&self) -> Option<FixationSnapshot> {
        self.lock().history.latest().cloned()
    }

    /// Revert to `last_known_good_sha256` and halt.
    pub fn hard_kill(&self, last_known_good_sha256: impl Into<String>) {
        let mut state = self.lock();
        state.kernel_sha256 = last_known_good_sha256.into();
        state.halted = true;
        error!(kernel_sha256 = %state.kernel_sha256, "hard kill: boundary halted");
    }
}
