//! The compliance control registry.
//!
//! Controls are grouped into four phases and aggregated into a coverage
//! fraction. Once the regression guard is enabled, coverage falling below
//! the floor captured at that moment counts as a regression.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bastion_contracts::{
    error::{BastionError, BastionResult},
    evidence::EvidenceRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    Protect,
    Produce,
    Respond,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Prepare => "prepare",
            Phase::Protect => "protect",
            Phase::Produce => "produce",
            Phase::Respond => "respond",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceControl {
    pub control_id: String,
    pub phase: Phase,
    pub description: String,
    pub satisfied: bool,
    pub evidence_ref: Option<EvidenceRef>,
}

#[derive(Debug, Clone, Default)]
pub struct ControlRegistry {
    /// Registration order.
    controls: Vec<ComplianceControl>,
    guard_floor: Option<f64>,
}

const BASELINE_CONTROLS: &[(&str, Phase, &str)] = &[
    ("PREP-01", Phase::Prepare, "governance roles and kernel issuer defined"),
    ("PREP-02", Phase::Prepare, "policy kernel signed by the root key"),
    ("PREP-03", Phase::Prepare, "toolchain pins recorded in the kernel"),
    ("PROT-01", Phase::Protect, "agent identity keys never persisted in plaintext"),
    ("PROT-02", Phase::Protect, "capability tokens scoped per agent"),
    ("PROT-03", Phase::Protect, "self-modification limited to peripheral components"),
    ("PROD-01", Phase::Produce, "every execution step attested in the evidence chain"),
    ("PROD-02", Phase::Produce, "plans proved against registered invariants"),
    ("PROD-03", Phase::Produce, "planner replay determinism measured"),
    ("RESP-01", Phase::Respond, "hard-kill procedure documented and exercised"),
    ("RESP-02", Phase::Respond, "execution log retained append-only"),
    ("RESP-03", Phase::Respond, "incident evidence references recorded"),
];

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the baseline controls, none satisfied.
    pub fn baseline() -> Self {
        let mut registry = Self::new();
        for (id, phase, description) in BASELINE_CONTROLS {
            registry.register(*id, *phase, *description);
        }
        registry
    }

    pub fn register(
        &mut self,
        control_id: impl Into<String>,
        phase: Phase,
        description: impl Into<String>,
    ) {
        self.controls.push(ComplianceControl {
            control_id: control_id.into(),
            phase,
            description: description.into(),
            satisfied: false,
            evidence_ref: None,
        });
    }

    fn control_mut(&mut self, control_id: &str) -> BastionResult<&mut ComplianceControl> {
        self.controls
            .iter_mut()
            .find(|c| c.control_id == control_id)
            .ok_or_else(|| BastionError::UnknownControl {
                control_id: control_id.to_string(),
            })
    }

    pub fn satisfy(&mut self, control_id: &str, evidence_ref: EvidenceRef) -> BastionResult<()> {
        let control = self.control_mut(control_id)?;
        control.satisfied = true;
        control.evidence_ref = Some(evidence_ref);
        info!(control_id, "compliance control satisfied");
        Ok(())
    }

    /// Mark a control as no longer satisfied.
    pub fn unsatisfy(&mut self, control_id: &str) -> BastionResult<()> {
        let control = self.control_mut(control_id)?;
        control.satisfied = false;
        control.evidence_ref = None;
        warn!(control_id, "compliance control un-marked");
        Ok(())
    }

    pub fn controls(&self) -> &[ComplianceControl] {
        &self.controls
    }

    /// Satisfied count over total; 0.0 for an empty registry.
    pub fn coverage(&self) -> f64 {
        ratio(self.controls.iter())
    }

    pub fn coverage_by_phase(&self) -> BTreeMap<Phase, f64> {
        let mut phases: BTreeMap<Phase, Vec<&ComplianceControl>> = BTreeMap::new();
        for c in &self.controls {
            phases.entry(c.phase).or_default().push(c);
        }
        phases
            .into_iter()
            .map(|(phase, controls)| (phase, ratio(controls.into_iter())))
            .collect()
    }

    /// Capture the current coverage as the regression floor and return it.
    pub fn enable_regression_guard(&mut self) -> f64 {
        let floor = self.coverage();
        self.guard_floor = Some(floor);
        info!(floor, "compliance regression guard enabled");
        floor
    }

    pub fn guard_enabled(&self) -> bool {
        self.guard_floor.is_some()
    }

    pub fn has_regression(&self) -> bool {
        match self.guard_floor {
            Some(floor) => self.coverage() < floor,
            None => false,
        }
    }
}

fn ratio<'a>(controls: impl Iterator<Item = &'a ComplianceControl>) -> f64 {
    let (satisfied, total) = controls.fold((0usize, 0usize), |(s, t), c| {
        (s + usize::from(c.satisfied), t + 1)
    });
    if total == 0 {
        0.0
    } else {
        satisfied as f64 / total as f64
    }
}
