//! The pre-flight telemetry checklist.
//!
//! Eight named checks must all pass before autonomous execution is enabled.
//! Each check is either probed (a closure returning `(pass, evidence)`) or
//! marked directly by the caller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryCheck {
    KernelSignature,
    ToolchainPins,
    EvidenceChain,
    InvariantProver,
    PlannerDeterminism,
    SandboxFingerprint,
    CapabilityBoundary,
    SelfModBoundary,
}

impl TelemetryCheck {
    pub const ALL: [TelemetryCheck; 8] = [
        TelemetryCheck::KernelSignature,
        TelemetryCheck::ToolchainPins,
        TelemetryCheck::EvidenceChain,
        TelemetryCheck::InvariantProver,
        TelemetryCheck::PlannerDeterminism,
        TelemetryCheck::SandboxFingerprint,
        TelemetryCheck::CapabilityBoundary,
        TelemetryCheck::SelfModBoundary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryCheck::KernelSignature => "kernel_signature",
            TelemetryCheck::ToolchainPins => "toolchain_pins",
            TelemetryCheck::EvidenceChain => "evidence_chain",
            TelemetryCheck::InvariantProver => "invariant_prover",
            TelemetryCheck::PlannerDeterminism => "planner_determinism",
            TelemetryCheck::SandboxFingerprint => "sandbox_fingerprint",
            TelemetryCheck::CapabilityBoundary => "capability_boundary",
            TelemetryCheck::SelfModBoundary => "self_mod_boundary",
        }
    }
}

impl fmt::Display for TelemetryCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pending,
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub check: TelemetryCheck,
    pub status: CheckStatus,
    pub evidence: String,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutonomyStatus {
    AutonomyEnabled,
    AutonomyBlocked,
}

impl fmt::Display for AutonomyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AutonomyStatus::AutonomyEnabled => "AUTONOMY_ENABLED",
            AutonomyStatus::AutonomyBlocked => "AUTONOMY_BLOCKED",
        })
    }
}

/// Persisted form of a checklist run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub execution_ready: bool,
    pub autonomy_status: AutonomyStatus,
    pub checks: Vec<CheckRecord>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TelemetryChecklist {
    records: Vec<CheckRecord>,
}

impl Default for TelemetryChecklist {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryChecklist {
    /// All eight checks, pending.
    pub fn new() -> Self {
        let records = TelemetryCheck::ALL
            .iter()
            .map(|&check| CheckRecord {
                check,
                status: CheckStatus::Pending,
                evidence: String::new(),
                checked_at: None,
            })
            .collect();
        Self { records }
    }

    /// Run `probe` and record its outcome. Returns the pass flag.
    pub fn run_probe<F>(&mut self, check: TelemetryCheck, probe: F) -> bool
    where
        F: FnOnce() -> (bool, String),
    {
        let (pass, evidence) = probe();
        self.mark(check, pass, evidence);
        pass
    }

    pub fn mark(&mut self, check: TelemetryCheck, pass: bool, evidence: impl Into<String>) {
        let evidence = evidence.into();
        if pass {
            debug!(check = %check, "telemetry check passed");
        } else {
            warn!(check = %check, evidence = %evidence, "telemetry check failed");
        }
        if let Some(record) = self.records.iter_mut().find(|r| r.check == check) {
            record.status = if pass {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            };
            record.evidence = evidence;
            record.checked_at = Some(Utc::now());
        }
    }

    pub fn status_of(&self, check: TelemetryCheck) -> CheckStatus {
        self.records
            .iter()
            .find(|r| r.check == check)
            .map(|r| r.status)
            .unwrap_or(CheckStatus::Pending)
    }

    pub fn records(&self) -> &[CheckRecord] {
        &self.records
    }

    pub fn execution_ready(&self) -> bool {
        self.records.iter().all(|r| r.status == CheckStatus::Pass)
    }

    pub fn autonomy_status(&self) -> AutonomyStatus {
        if self.execution_ready() {
            AutonomyStatus::AutonomyEnabled
        } else {
            AutonomyStatus::AutonomyBlocked
        }
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            execution_ready: self.execution_ready(),
            autonomy_status: self.autonomy_status(),
            checks: self.records.clone(),
            generated_at: Utc::now(),
        }
    }
}
