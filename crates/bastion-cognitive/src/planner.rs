//! The deterministic planner.
//!
//! Maps a desired-state request to a plan using nothing but the request and
//! the toolchain context, so identical inputs always yield a bit-identical
//! plan hash. The planner remembers the last plan hash per desired-state
//! hash and flags a mismatch when a later call disagrees.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bastion_contracts::{
    digest::hash_json,
    error::BastionResult,
    evidence::{EvidenceKind, EvidenceRef},
    plan::{ActionKind, Plan, PlanBuilder, TypedAction},
};

use crate::window::RollingWindow;

/// What the caller wants the world to look like.
///
/// `intent` is `verb` or `verb:target`; recognised verbs are `deploy`,
/// `write`, `execute`, `mutate` and `read`. Anything else plans as `read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub intent: String,
    pub constraints: Vec<String>,
    pub objective: String,
    pub kernel_sha256: String,
    pub policy_sha256: String,
    pub telemetry_sha256: String,
}

impl DesiredState {
    pub fn content_hash(&self) -> BastionResult<String> {
        hash_json(self)
    }
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub plan_hash: String,
    pub desired_hash: String,
    /// True when an earlier call with the same desired-state hash produced
    /// a different plan hash.
    pub mismatch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub replay_n: u64,
    pub replay_mismatch: u64,
}

pub struct DeterministicPlanner {
    agent_id: String,
    toolchain_sha256: String,
    /// (desired hash, plan hash), newest last.
    last_plans: RollingWindow<(String, String)>,
    mismatches: u64,
}

fn evidence_id(raw: &str) -> String {
    raw.replace('#', "-")
}

impl DeterministicPlanner {
    pub fn new(
        agent_id: impl Into<String>,
        toolchain_sha256: impl Into<String>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            toolchain_sha256: toolchain_sha256.into(),
            last_plans: RollingWindow::new(cache_capacity),
            mismatches: 0,
        }
    }

    /// Replace the toolchain context, e.g. after a toolchain upgrade.
    pub fn rebind_toolchain(&mut self, toolchain_sha256: impl Into<String>) {
        self.toolchain_sha256 = toolchain_sha256.into();
    }

    /// Total mismatches observed since construction.
    pub fn mismatches(&self) -> u64 {
        self.mismatches
    }

    fn cached_hash(&self, desired_hash: &str) -> Option<&str> {
        self.last_plans
            .iter()
            .rev()
            .find(|(d, _)| d == desired_hash)
            .map(|(_, p)| p.as_str())
    }

    pub fn plan(&mut self, desired: &DesiredState) -> BastionResult<PlanOutcome> {
        let desired_hash = desired.content_hash()?;
        let plan = self.build(desired, &desired_hash)?;
        let plan_hash = plan.content_hash()?;

        let mismatch = match self.cached_hash(&desired_hash) {
            Some(previous) if previous != plan_hash => {
                warn!(
                    desired_hash = %desired_hash,
                    previous = %previous,
                    current = %plan_hash,
                    "planner nondeterminism detected"
                );
                true
            }
            _ => false,
        };
        if mismatch {
            self.mismatches += 1;
        }
        self.last_plans.push((desired_hash.clone(), plan_hash.clone()));

        debug!(plan_id = %plan.plan_id, plan_hash = %plan_hash, "plan produced");
        Ok(PlanOutcome {
            plan,
            plan_hash,
            desired_hash,
            mismatch,
        })
    }

    /// Plan `n` times on the same input and count hashes that differ from
    /// the first run.
    pub fn replay(&mut self, desired: &DesiredState, n: u64) -> BastionResult<ReplayReport> {
        let mut reference: Option<String> = None;
        let mut replay_mismatch = 0;

        for _ in 0..n {
            let outcome = self.plan(desired)?;
            match &reference {
                None => reference = Some(outcome.plan_hash),
                Some(first) if *first != outcome.plan_hash => replay_mismatch += 1,
                Some(_) => {}
            }
        }

        Ok(ReplayReport {
            replay_n: n,
            replay_mismatch,
        })
    }

    fn build(&self, desired: &DesiredState, desired_hash: &str) -> BastionResult<Plan> {
        let (verb, target) = match desired.intent.split_once(':') {
            Some((verb, target)) => (verb.trim(), target.trim()),
            None => (desired.intent.trim(), ""),
        };
        let target = if target.is_empty() { "default" } else { target };
        let plan_id = format!("sps-{}", &desired_hash[..16]);
        let attestation = EvidenceRef::new(
            EvidenceKind::Attest,
            evidence_id(&format!("{plan_id}-{verb}")),
            desired_hash,
        )?;

        let constraints: Vec<&str> = desired
            .constraints
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();

        // Fixed step ids are `{verb}-<step>`; the target step is `{verb}:{target}`.
        // `verb` never contains ':', so no target can collide with a fixed id.
        let checkpoint_id = format!("{verb}-checkpoint");
        let checkpoint = TypedAction::new(&checkpoint_id, ActionKind::Checkpoint)
            .with_postcondition("state snapshot recorded")
            .with_metadata("objective", serde_json::json!(desired.objective))
            .with_metadata("toolchain_sha256", serde_json::json!(self.toolchain_sha256));

        let mut builder = PlanBuilder::new(format!("{verb}:{target}"), &self.agent_id)
            .with_plan_id(&plan_id)
            .push(checkpoint);

        let effect_kind = match verb {
            "deploy" => Some(ActionKind::Deploy),
            "write" => Some(ActionKind::Write),
            "execute" => Some(ActionKind::Execute),
            _ => None,
        };

        if let Some(kind) = effect_kind {
            let rollback_id = format!("{verb}-rollback");
            let mut effect = TypedAction::new(format!("{verb}:{target}"), kind)
                .with_precondition(format!("checkpoint {checkpoint_id} recorded"))
                .with_rollback(&rollback_id)
                .with_evidence(attestation.clone())
                .with_metadata("target", serde_json::json!(target));
            for c in &constraints {
                effect = effect.with_precondition(*c);
            }
            builder = builder.push(effect).push(
                TypedAction::new(rollback_id, ActionKind::Rollback)
                    .with_precondition(format!("checkpoint {checkpoint_id} recorded"))
                    .with_rollback("no-op"),
            );
        } else if verb == "mutate" {
            let mut mutation =
                TypedAction::new(format!("mutate:{target}"), ActionKind::MutatePeripheral)
                    .touching(format!("peripheral.{target}"))
                    .with_rollback("no-op");
            for c in &constraints {
                mutation = mutation.with_precondition(*c);
            }
            builder = builder.push(mutation);
        } else {
            let mut read = TypedAction::new(format!("read:{target}"), ActionKind::Read);
            for c in &constraints {
                read = read.with_precondition(*c);
            }
            builder = builder.push(read);
        }

        let emit = TypedAction::new(format!("{verb}-evidence"), ActionKind::EmitEvidence)
            .with_evidence(attestation)
            .with_postcondition("evidence bundle emitted");

        Ok(builder.push(emit).freeze())
    }
}
