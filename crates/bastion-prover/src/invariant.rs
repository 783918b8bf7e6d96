//! Invariants and the invariant set.
//!
//! An invariant is a named predicate over a whole plan. The set evaluates
//! every registered invariant in registration order and collects one
//! message per failing invariant, so operators see the full picture in one
//! pass.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bastion_contracts::plan::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantKind {
    Safety,
    Security,
    Determinism,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A predicate over a plan.
///
/// Returns `Some(detail)` when the plan violates the invariant, `None` when
/// it holds.
pub type InvariantFn = Box<dyn Fn(&Plan) -> Option<String> + Send + Sync>;

pub struct Invariant {
    pub id: String,
    pub description: String,
    pub kind: InvariantKind,
    pub severity: Severity,
    predicate: InvariantFn,
}

impl Invariant {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        kind: InvariantKind,
        severity: Severity,
        predicate: InvariantFn,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind,
            severity,
            predicate,
        }
    }

    pub fn check(&self, plan: &Plan) -> Option<String> {
        (self.predicate)(plan)
    }
}

impl std::fmt::Debug for Invariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invariant")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Result of evaluating an invariant set against a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub passed: bool,
    /// One message per failing invariant, in registration order.
    pub violations: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InvariantSet {
    invariants: Vec<Invariant>,
}

impl InvariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invariant. A second registration under the same id
    /// replaces the first in place.
    pub fn register(&mut self, invariant: Invariant) {
        match self.invariants.iter_mut().find(|i| i.id == invariant.id) {
            Some(existing) => *existing = invariant,
            None => self.invariants.push(invariant),
        }
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.invariants.iter().map(|i| i.id.as_str())
    }

    pub fn evaluate(&self, plan: &Plan) -> InvariantReport {
        let mut violations = Vec::new();

        for invariant in &self.invariants {
            debug!(invariant_id = %invariant.id, plan_id = %plan.plan_id, "evaluating invariant");
            if let Some(detail) = invariant.check(plan) {
                warn!(
                    invariant_id = %invariant.id,
                    severity = ?invariant.severity,
                    %detail,
                    "invariant violated"
                );
                violations.push(format!("invariant '{}' violated: {}", invariant.id, detail));
            }
        }

        InvariantReport {
            passed: violations.is_empty(),
            violations,
        }
    }
}
