//! Structural well-formedness checks, independent of any invariant set.
//!
//! A plan that fails here cannot be meaningfully proved; the formal gate
//! runs this first and reports ERROR on failure.

use serde::{Deserialize, Serialize};

use bastion_contracts::plan::{Plan, RollbackRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub failures: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticValidator;

impl StaticValidator {
    pub fn validate(&self, plan: &Plan) -> ValidationReport {
        let mut failures = Vec::new();

        for action in &plan.actions {
            if let RollbackRef::Action(target) = action.rollback_ref() {
                if plan.action(target).is_none() {
                    failures.push(format!(
                        "action '{}' rolls back to '{}', which is not in the plan",
                        action.action_id, target
                    ));
                }
            }

            if action.preconditions.iter().any(|p| p.trim().is_empty()) {
                failures.push(format!(
                    "action '{}' has an empty precondition",
                    action.action_id
                ));
            }

            if action.kind.is_external_effect() && action.evidence_refs.is_empty() {
                failures.push(format!(
                    "{} action '{}' carries no evidence reference",
                    action.kind, action.action_id
                ));
            }
        }

        ValidationReport {
            valid: failures.is_empty(),
            failures,
        }
    }
}
