//! # bastion-contracts
//!
//! Shared records and error types for the Bastion admission pipeline.
//!
//! Every crate in the workspace imports from here. No admission logic lives
//! in this crate, only data definitions, canonical hashing, and errors.

pub mod bundle;
pub mod capability;
pub mod digest;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod kernel;
pub mod metrics;
pub mod plan;

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use capability::{Capability, CapabilitySet, CapabilityToken};
    use digest::sha256_hex;
    use error::BastionError;
    use evidence::{EvidenceKind, EvidenceRef};
    use gate::{GateId, GateResult, GateStatus};
    use kernel::PolicyKernel;
    use plan::{ActionKind, PlanBuilder, RollbackRef, TypedAction};

    fn digest() -> String {
        sha256_hex(b"artifact")
    }

    // ── EvidenceRef ──────────────────────────────────────────────────────────

    #[test]
    fn evidence_ref_parses_and_displays() {
        let s = format!("§REF:TEST#unit-42#{}", digest());
        let parsed: EvidenceRef = s.parse().unwrap();

        assert_eq!(parsed.kind, EvidenceKind::Test);
        assert_eq!(parsed.id, "unit-42");
        assert_eq!(parsed.to_string(), s);
    }

    #[test]
    fn evidence_ref_rejects_unknown_kind() {
        let s = format!("§REF:BLOG#x#{}", digest());
        let err = s.parse::<EvidenceRef>().unwrap_err();
        assert!(err.to_string().contains("unknown evidence kind 'BLOG'"));
    }

    #[test]
    fn evidence_ref_rejects_bad_digest() {
        let upper = digest().to_uppercase();
        assert!(format!("§REF:LOG#x#{upper}").parse::<EvidenceRef>().is_err());
        assert!("§REF:LOG#x#abc123".parse::<EvidenceRef>().is_err());
        assert!(format!("REF:LOG#x#{}", digest()).parse::<EvidenceRef>().is_err());
        assert!(format!("§REF:LOG##{}", digest()).parse::<EvidenceRef>().is_err());
    }

    #[test]
    fn evidence_ref_serializes_as_string() {
        let r = EvidenceRef::new(EvidenceKind::Attest, "a1", digest()).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, format!("\"§REF:ATTEST#a1#{}\"", digest()));
        let back: EvidenceRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    // ── PolicyKernel ─────────────────────────────────────────────────────────

    #[test]
    fn kernel_hash_is_stable_and_excludes_signature() {
        let kernel = PolicyKernel::baseline("governance").unwrap();
        assert_eq!(kernel.kernel_sha256, kernel.compute_sha256().unwrap());

        let mut signed = kernel.clone();
        signed.signature = Some(kernel::SignatureBlock {
            signature_token: "sig".to_string(),
            algorithm: "Ed25519".to_string(),
            key_id: "k".to_string(),
            signed_at: Utc::now(),
        });
        assert_eq!(
            signed.canonical_bytes().unwrap(),
            kernel.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn kernel_issue_next_leaves_original_untouched() {
        let v1 = PolicyKernel::baseline("governance").unwrap();
        let v2 = v1
            .issue_next("1.1.0", |k| k.forbidden_actions.push("drop_tables".to_string()))
            .unwrap();

        assert_ne!(v1.kernel_sha256, v2.kernel_sha256);
        assert_eq!(v1.version, "1.0.0");
        assert_eq!(v1.kernel_sha256, v1.compute_sha256().unwrap());
        assert!(v2.signature.is_none());
    }

    // ── Plan ─────────────────────────────────────────────────────────────────

    #[test]
    fn plan_hash_ignores_id_and_timestamp() {
        let build = || {
            PlanBuilder::new("nightly", "agent-a")
                .push(TypedAction::new("a1", ActionKind::Checkpoint))
                .push(TypedAction::new("a2", ActionKind::EmitEvidence))
                .freeze()
        };
        let first = build();
        let second = build();

        assert_ne!(first.plan_id, second.plan_id);
        assert_eq!(first.content_hash().unwrap(), second.content_hash().unwrap());
    }

    #[test]
    fn plan_hash_changes_with_action_content() {
        let a = PlanBuilder::new("p", "agent")
            .push(TypedAction::new("a1", ActionKind::Read))
            .freeze();
        let b = PlanBuilder::new("p", "agent")
            .push(TypedAction::new("a1", ActionKind::Read).with_precondition("ready"))
            .freeze();
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn rollback_reference_classes() {
        let action = |r: &str| TypedAction::new("x", ActionKind::Deploy).with_rollback(r);
        assert_eq!(action("").rollback_ref(), RollbackRef::Missing);
        assert_eq!(action("none").rollback_ref(), RollbackRef::DeclaredNone);
        assert_eq!(action("no-op").rollback_ref(), RollbackRef::NoOp);
        assert_eq!(action("noop").rollback_ref(), RollbackRef::NoOp);
        assert_eq!(action("undo-1").rollback_ref(), RollbackRef::Action("undo-1"));
    }

    // ── Gate records ─────────────────────────────────────────────────────────

    #[test]
    fn gate_status_serializes_screaming_case() {
        let json = serde_json::to_string(&GateStatus::NotReady).unwrap();
        assert_eq!(json, "\"NOT_READY\"");
        let id = serde_json::to_string(&GateId::G9PolicyCall).unwrap();
        assert_eq!(id, "\"G9_POLICY_CALL\"");
    }

    #[test]
    fn gate_result_status_follows_violations() {
        let pass = GateResult::from_violations(GateId::G8Sandbox, vec![], vec![]);
        let fail = GateResult::from_violations(GateId::G8Sandbox, vec![], vec!["x".into()]);
        assert_eq!(pass.status, GateStatus::Pass);
        assert_eq!(fail.status, GateStatus::Fail);
        assert!(!GateResult::error(GateId::G7Formal, "broken").passed());
    }

    #[test]
    fn gate_results_hash_is_order_independent() {
        let a = GateResult::from_violations(GateId::G6Auth, vec!["ok".into()], vec![]);
        let b = GateResult::error(GateId::G7Formal, "empty invariant set");
        let forward = gate::gate_results_hash(&[a.clone(), b.clone()]).unwrap();
        let reverse = gate::gate_results_hash(&[b, a.clone()]).unwrap();
        assert_eq!(forward, reverse);
        assert_ne!(forward, gate::gate_results_hash(&[a]).unwrap());
    }

    // ── CapabilityToken ──────────────────────────────────────────────────────

    #[test]
    fn capability_token_liveness() {
        let mut token = CapabilityToken {
            token_id: "t1".to_string(),
            agent_id: "agent".to_string(),
            capabilities: ["tool:read"].into_iter().collect::<CapabilitySet>(),
            expires_at: Utc::now() + Duration::hours(1),
            revoked: false,
        };
        assert!(token.is_live(Utc::now()));
        assert!(token.capabilities.has(&Capability::new("tool:read")));
        assert!(!token.is_live(Utc::now() + Duration::hours(2)));

        token.revoked = true;
        assert!(!token.is_live(Utc::now()));
    }

    // ── BastionError display messages ────────────────────────────────────────

    #[test]
    fn error_display_messages() {
        let err = BastionError::UnknownControl {
            control_id: "CC-99".to_string(),
        };
        assert!(err.to_string().contains("CC-99"));

        let err = BastionError::ChainWriteFailed {
            reason: "lock poisoned".to_string(),
        };
        assert!(err.to_string().contains("evidence chain write failed"));
    }
}
