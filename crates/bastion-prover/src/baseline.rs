//! The baseline invariants every plan is proved against.

use std::collections::HashSet;

use bastion_contracts::plan::{ActionKind, Plan, RollbackRef, KERNEL_INVARIANT_PREFIX};

use crate::invariant::{Invariant, InvariantKind, InvariantSet, Severity};

/// External-effect actions name a real rollback action or an explicit no-op.
pub fn rollback_required() -> Invariant {
    Invariant::new(
        "rollback_required",
        "external-effect actions declare a rollback action or an explicit no-op",
        InvariantKind::Safety,
        Severity::Critical,
        Box::new(|plan: &Plan| {
            let offenders: Vec<String> = plan
                .actions
                .iter()
                .filter(|a| a.kind.is_external_effect())
                .filter(|a| {
                    matches!(
                        a.rollback_ref(),
                        RollbackRef::Missing | RollbackRef::DeclaredNone
                    )
                })
                .map(|a| format!("{} action '{}'", a.kind, a.action_id))
                .collect();
            (!offenders.is_empty())
                .then(|| format!("rollback required for {}", offenders.join(", ")))
        }),
    )
}

pub fn non_empty_plan() -> Invariant {
    Invariant::new(
        "non_empty_plan",
        "a plan contains at least one action",
        InvariantKind::Safety,
        Severity::High,
        Box::new(|plan: &Plan| {
            plan.actions
                .is_empty()
                .then(|| "plan contains no actions".to_string())
        }),
    )
}

/// Every peripheral mutation is accompanied by an evidence emission.
pub fn peripheral_evidence_pairing() -> Invariant {
    Invariant::new(
        "peripheral_evidence_pairing",
        "mutate-peripheral actions are paired with an emit-evidence action",
        InvariantKind::Security,
        Severity::High,
        Box::new(|plan: &Plan| {
            let mutates = plan
                .actions
                .iter()
                .any(|a| a.kind == ActionKind::MutatePeripheral);
            let emits = plan
                .actions
                .iter()
                .any(|a| a.kind == ActionKind::EmitEvidence);
            (mutates && !emits).then(|| {
                "mutate_peripheral action without a paired emit_evidence action".to_string()
            })
        }),
    )
}

pub fn unique_action_ids() -> Invariant {
    Invariant::new(
        "unique_action_ids",
        "action ids are unique within a plan",
        InvariantKind::Determinism,
        Severity::High,
        Box::new(|plan: &Plan| {
            let mut seen = HashSet::new();
            let mut duplicates: Vec<&str> = plan
                .actions
                .iter()
                .map(|a| a.action_id.as_str())
                .filter(|id| !seen.insert(*id))
                .collect();
            duplicates.sort_unstable();
            duplicates.dedup();
            (!duplicates.is_empty())
                .then(|| format!("duplicate action ids: {}", duplicates.join(", ")))
        }),
    )
}

/// Deploy and write actions declare at least one precondition.
pub fn effect_preconditions() -> Invariant {
    Invariant::new(
        "effect_preconditions",
        "deploy and write actions declare at least one precondition",
        InvariantKind::Safety,
        Severity::Medium,
        Box::new(|plan: &Plan| {
            let offenders: Vec<&str> = plan
                .actions
                .iter()
                .filter(|a| matches!(a.kind, ActionKind::Deploy | ActionKind::Write))
                .filter(|a| a.preconditions.is_empty())
                .map(|a| a.action_id.as_str())
                .collect();
            (!offenders.is_empty())
                .then(|| format!("no preconditions on {}", offenders.join(", ")))
        }),
    )
}

/// Peripheral mutations never touch kernel-scoped invariants.
pub fn kernel_isolation() -> Invariant {
    Invariant::new(
        "kernel_isolation",
        "mutate-peripheral actions never touch kernel-scoped invariants",
        InvariantKind::Security,
        Severity::Critical,
        Box::new(|plan: &Plan| {
            let offenders: Vec<String> = plan
                .actions
                .iter()
                .filter(|a| a.kind == ActionKind::MutatePeripheral)
                .flat_map(|a| {
                    a.touched_invariants
                        .iter()
                        .filter(|inv| inv.starts_with(KERNEL_INVARIANT_PREFIX))
                        .map(move |inv| format!("'{}' touches '{}'", a.action_id, inv))
                })
                .collect();
            (!offenders.is_empty())
                .then(|| format!("kernel-scoped invariant touched: {}", offenders.join(", ")))
        }),
    )
}

/// Actions whose id or `operation` metadata names a kernel-forbidden action.
pub fn forbidden_actions(forbidden: Vec<String>) -> Invariant {
    Invariant::new(
        "forbidden_actions",
        "no action performs an operation the kernel forbids",
        InvariantKind::Forbidden,
        Severity::Critical,
        Box::new(move |plan: &Plan| {
            let offenders: Vec<String> = plan
                .actions
                .iter()
                .filter_map(|a| {
                    let operation = a
                        .metadata
                        .get("operation")
                        .and_then(|v| v.as_str())
                        .unwrap_or(a.action_id.as_str());
                    forbidden
                        .iter()
                        .find(|f| f.as_str() == operation || f.as_str() == a.action_id)
                        .map(|f| format!("'{}' performs '{}'", a.action_id, f))
                })
                .collect();
            (!offenders.is_empty())
                .then(|| format!("forbidden action: {}", offenders.join(", ")))
        }),
    )
}

/// The six baseline invariants, in their canonical order.
pub fn baseline_invariants() -> InvariantSet {
    let mut set = InvariantSet::new();
    set.register(rollback_required());
    set.register(non_empty_plan());
    set.register(peripheral_evidence_pairing());
    set.register(unique_action_ids());
    set.register(effect_preconditions());
    set.register(kernel_isolation());
    set
}

/// Baseline invariants plus the kernel's forbidden-action list.
pub fn kernel_invariants(forbidden: &[String]) -> InvariantSet {
    let mut set = baseline_invariants();
    if !forbidden.is_empty() {
        set.register(forbidden_actions(forbidden.to_vec()));
    }
    set
}
