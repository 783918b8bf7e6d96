//! Gate identifiers, statuses, and result records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::hash_json;
use crate::error::BastionResult;

/// The six admission gates, in their fixed evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GateId {
    #[serde(rename = "G6_AUTH")]
    G6Auth,
    #[serde(rename = "G7_FORMAL")]
    G7Formal,
    #[serde(rename = "G8_SANDBOX")]
    G8Sandbox,
    #[serde(rename = "G9_POLICY_CALL")]
    G9PolicyCall,
    #[serde(rename = "G10_SYNC")]
    G10Sync,
    #[serde(rename = "G11_FIXATION")]
    G11Fixation,
}

impl GateId {
    pub const ORDER: [GateId; 6] = [
        GateId::G6Auth,
        GateId::G7Formal,
        GateId::G8Sandbox,
        GateId::G9PolicyCall,
        GateId::G10Sync,
        GateId::G11Fixation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GateId::G6Auth => "G6_AUTH",
            GateId::G7Formal => "G7_FORMAL",
            GateId::G8Sandbox => "G8_SANDBOX",
            GateId::G9PolicyCall => "G9_POLICY_CALL",
            GateId::G10Sync => "G10_SYNC",
            GateId::G11Fixation => "G11_FIXATION",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one gate.
///
/// Only `Pass` admits. `Error` means the gate could not evaluate its input;
/// `NotReady` means there is not yet enough evidence to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pass,
    Fail,
    Error,
    NotReady,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GateStatus::Pass => "PASS",
            GateStatus::Fail => "FAIL",
            GateStatus::Error => "ERROR",
            GateStatus::NotReady => "NOT_READY",
        })
    }
}

/// The record one gate produces for one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: GateId,
    pub status: GateStatus,
    pub evidence: Vec<String>,
    pub violations: Vec<String>,
}

impl GateResult {
    /// PASS when `violations` is empty, FAIL otherwise.
    pub fn from_violations(
        gate_id: GateId,
        evidence: Vec<String>,
        violations: Vec<String>,
    ) -> Self {
        let status = if violations.is_empty() {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        };
        Self {
            gate_id,
            status,
            evidence,
            violations,
        }
    }

    pub fn error(gate_id: GateId, reason: impl Into<String>) -> Self {
        Self {
            gate_id,
            status: GateStatus::Error,
            evidence: Vec::new(),
            violations: vec![reason.into()],
        }
    }

    pub fn not_ready(gate_id: GateId, evidence: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            gate_id,
            status: GateStatus::NotReady,
            evidence,
            violations: vec![reason.into()],
        }
    }

    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }
}

/// Aggregate record of one run of all six gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRun {
    pub all_pass: bool,
    /// Hash over the sorted serialized results; bound into the next bundle.
    pub gate_results_hash: String,
    pub results: Vec<GateResult>,
}

impl GateRun {
    pub fn status_of(&self, gate_id: GateId) -> Option<GateStatus> {
        self.results
            .iter()
            .find(|r| r.gate_id == gate_id)
            .map(|r| r.status)
    }
}

/// Deterministic hash over a set of gate results.
///
/// Each result is serialized on its own, the strings are sorted, and the
/// sorted list is hashed, so the value does not depend on evaluation order.
pub fn gate_results_hash(results: &[GateResult]) -> BastionResult<String> {
    let mut serialized = results
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    serialized.sort();
    hash_json(&serialized)
}
