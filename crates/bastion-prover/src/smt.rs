//! The fail-closed formal gate.
//!
//! An empty invariant set can never prove safety, only fail to find
//! problems, so proving against it yields ERROR rather than PASS.

use tracing::{debug, warn};

use bastion_contracts::{
    gate::{GateId, GateResult},
    plan::Plan,
};

use crate::invariant::InvariantSet;
use crate::validator::StaticValidator;

#[derive(Debug, Default)]
pub struct SmtGate {
    invariants: InvariantSet,
    validator: StaticValidator,
}

impl SmtGate {
    pub fn new(invariants: InvariantSet) -> Self {
        Self {
            invariants,
            validator: StaticValidator,
        }
    }

    pub fn invariants(&self) -> &InvariantSet {
        &self.invariants
    }

    /// Prove `plan` against the registered invariants.
    ///
    /// - empty invariant set → ERROR
    /// - structurally malformed plan → ERROR listing every structural fault
    /// - otherwise PASS iff every invariant holds
    pub fn prove(&self, plan: &Plan) -> GateResult {
        if self.invariants.is_empty() {
            warn!(plan_id = %plan.plan_id, "formal gate has no invariants registered");
            return GateResult::error(
                GateId::G7Formal,
                "invariant set is empty: an empty policy cannot prove safety",
            );
        }

        let structure = self.validator.validate(plan);
        if !structure.valid {
            warn!(
                plan_id = %plan.plan_id,
                failures = structure.failures.len(),
                "plan is structurally malformed"
            );
            let mut result = GateResult::error(GateId::G7Formal, "plan failed static validation");
            result
                .violations
                .extend(structure.failures.into_iter().map(|f| format!("structure: {f}")));
            return result;
        }

        let report = self.invariants.evaluate(plan);
        let plan_hash = plan
            .content_hash()
            .unwrap_or_else(|e| format!("unhashable: {e}"));
        let evidence = vec![
            format!("plan {} ({plan_hash})", plan.plan_id),
            format!(
                "{} invariants evaluated: {}",
                self.invariants.len(),
                self.invariants.ids().collect::<Vec<_>>().join(", ")
            ),
        ];
        debug!(plan_id = %plan.plan_id, passed = report.passed, "formal proof complete");

        GateResult::from_violations(GateId::G7Formal, evidence, report.violations)
    }
}
