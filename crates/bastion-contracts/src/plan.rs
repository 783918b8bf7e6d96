//! Typed action plans.
//!
//! A `Plan` is built append-only through a [`PlanBuilder`] and frozen before
//! it reaches the prover; the builder is consumed by `freeze`, so a frozen
//! plan cannot grow.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::hash_json;
use crate::error::BastionResult;
use crate::evidence::EvidenceRef;

/// The kinds of step a plan may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Read,
    Write,
    Execute,
    Deploy,
    Rollback,
    MutatePeripheral,
    Checkpoint,
    EmitEvidence,
    Escalate,
}

impl ActionKind {
    /// Actions with effects outside the agent's own state.
    pub fn is_external_effect(&self) -> bool {
        matches!(
            self,
            ActionKind::Deploy | ActionKind::Write | ActionKind::Execute
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Read => "read",
            ActionKind::Write => "write",
            ActionKind::Execute => "execute",
            ActionKind::Deploy => "deploy",
            ActionKind::Rollback => "rollback",
            ActionKind::MutatePeripheral => "mutate_peripheral",
            ActionKind::Checkpoint => "checkpoint",
            ActionKind::EmitEvidence => "emit_evidence",
            ActionKind::Escalate => "escalate",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an action's `rollback` string is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackRef<'a> {
    /// Empty string: nothing declared.
    Missing,
    /// `"none"`: the author declared there is no rollback.
    DeclaredNone,
    /// `"noop"` / `"no-op"`: undoing the action requires nothing.
    NoOp,
    /// The id of another action in the same plan.
    Action(&'a str),
}

/// Prefix marking an invariant id as kernel-scoped.
pub const KERNEL_INVARIANT_PREFIX: &str = "kernel.";

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedAction {
    pub action_id: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub postconditions: Vec<String>,
    /// Invariant ids this action touches. Ids starting with `kernel.` are
    /// kernel-scoped.
    #[serde(default)]
    pub touched_invariants: Vec<String>,
    /// Rollback reference; see [`RollbackRef`].
    #[serde(default)]
    pub rollback: String,
    #[serde(default)]
    pub evidence_refs: Vec<EvidenceRef>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl TypedAction {
    /// A bare action with no conditions, no rollback, and no evidence.
    pub fn new(action_id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            action_id: action_id.into(),
            kind,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            touched_invariants: Vec::new(),
            rollback: String::new(),
            evidence_refs: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_precondition(mut self, condition: impl Into<String>) -> Self {
        self.preconditions.push(condition.into());
        self
    }

    pub fn with_postcondition(mut self, condition: impl Into<String>) -> Self {
        self.postconditions.push(condition.into());
        self
    }

    pub fn with_rollback(mut self, rollback: impl Into<String>) -> Self {
        self.rollback = rollback.into();
        self
    }

    pub fn with_evidence(mut self, evidence: EvidenceRef) -> Self {
        self.evidence_refs.push(evidence);
        self
    }

    pub fn touching(mut self, invariant_id: impl Into<String>) -> Self {
        self.touched_invariants.push(invariant_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn rollback_ref(&self) -> RollbackRef<'_> {
        match self.rollback.trim() {
            "" => RollbackRef::Missing,
            "none" => RollbackRef::DeclaredNone,
            "noop" | "no-op" => RollbackRef::NoOp,
            id => RollbackRef::Action(id),
        }
    }
}

/// An ordered, frozen sequence of typed actions for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub name: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub actions: Vec<TypedAction>,
}

#[derive(Serialize)]
struct PlanContent<'a> {
    name: &'a str,
    agent_id: &'a str,
    actions: &'a [TypedAction],
}

impl Plan {
    /// Deterministic content hash over name, agent id and actions.
    ///
    /// The plan id and timestamp are excluded so two plans with the same
    /// content always hash the same.
    pub fn content_hash(&self) -> BastionResult<String> {
        hash_json(&PlanContent {
            name: &self.name,
            agent_id: &self.agent_id,
            actions: &self.actions,
        })
    }

    pub fn action(&self, action_id: &str) -> Option<&TypedAction> {
        self.actions.iter().find(|a| a.action_id == action_id)
    }
}

/// Append-only construction of a [`Plan`].
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    plan_id: String,
    name: String,
    agent_id: String,
    created_at: DateTime<Utc>,
    actions: Vec<TypedAction>,
}

impl PlanBuilder {
    /// Start a plan with a random id and the current time.
    pub fn new(name: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            plan_id: format!("sps-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            agent_id: agent_id.into(),
            created_at: Utc::now(),
            actions: Vec::new(),
        }
    }

    /// Override the plan id (the planner derives ids from its input hash).
    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = plan_id.into();
        self
    }

    pub fn push(mut self, action: TypedAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn freeze(self) -> Plan {
        Plan {
            plan_id: self.plan_id,
            name: self.name,
            agent_id: self.agent_id,
            created_at: self.created_at,
            actions: self.actions,
        }
    }
}
