//! # bastion-identity
//!
//! Agent identity, the root policy key, and the signed, hash-chained
//! evidence ledger.
//!
//! ## Overview
//!
//! Each execution step is recorded as an `AttestedBundle` signed with the
//! agent's key and linked to its predecessor by canonical hash. Editing any
//! field of any bundle breaks either its token or the next bundle's link,
//! and `verify_chain` reports every break it finds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bastion_identity::{AgentIdentity, ChainContext, EvidenceChain};
//!
//! let identity = Arc::new(AgentIdentity::generate("agent-7")?);
//! let chain = EvidenceChain::new(identity, context);
//! chain.append(&input, &output, &[], vec![])?;
//! assert!(chain.verify_chain()?.valid);
//! ```

pub mod chain;
pub mod identity;
pub mod record;
pub mod scheme;
pub mod token;
pub mod zero_trust;

pub use chain::{verify_bundles, ChainContext, ChainExport, ChainReport, EvidenceChain};
pub use identity::{AgentIdentity, RootPolicyKey};
pub use record::load_kernel_record;
pub use scheme::{Ed25519Scheme, HmacScheme};
pub use zero_trust::{zto_verify, ZeroTrustInputs};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use bastion_contracts::{
        digest::sha256_hex,
        error::BastionError,
        gate::{GateId, GateResult},
        kernel::PolicyKernel,
    };

    use bastion_core::traits::SignatureScheme;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn identity(agent: &str) -> Arc<AgentIdentity> {
        Arc::new(AgentIdentity::generate(agent).unwrap())
    }

    fn context(kernel: &PolicyKernel) -> ChainContext {
        ChainContext {
            kernel_sha256: kernel.kernel_sha256.clone(),
            toolchain_sha256: kernel.toolchain_sha256().unwrap(),
            env_fingerprint: sha256_hex(b"linux-x86_64"),
        }
    }

    fn chain_with(n: usize) -> (EvidenceChain, PolicyKernel) {
        let kernel = PolicyKernel::baseline("governance").unwrap();
        let chain = EvidenceChain::new(identity("agent-a"), context(&kernel));
        for i in 0..n {
            chain
                .append(&json!({ "step": i }), &json!({ "ok": true }), &[], vec![])
                .unwrap();
        }
        (chain, kernel)
    }

    /// Flip the lowest bit of the first raw MAC byte and re-encode.
    fn flip_first_mac_bit(mac: &str) -> String {
        let mut raw = token::unb64(mac).unwrap();
        raw[0] ^= 0x01;
        token::b64(&raw)
    }

    // ── Signing ───────────────────────────────────────────────────────────────

    #[test]
    fn hmac_sign_verify_is_symmetric_and_strict() {
        let id = identity("agent-a");
        let mac = id.sign(b"payload");

        assert!(id.verify(b"payload", &mac));
        assert!(!id.verify(b"payloae", &mac), "payload bit flip must fail");

        let tampered = flip_first_mac_bit(&mac);
        let raw = token::unb64(&tampered).unwrap();
        assert_eq!(raw.len(), 32, "tampered mac still decodes to a full MAC");
        assert!(!id.verify(b"payload", &tampered), "mac bit flip must fail");

        let scheme = HmacScheme::from_key(b"fixed-test-key").unwrap();
        let good = scheme.sign(b"payload");
        let mut flipped = good.clone();
        flipped[31] ^= 0x80;
        assert!(scheme.verify(b"payload", &good));
        assert!(!scheme.verify(b"payload", &flipped));
    }

    #[test]
    fn ed25519_scheme_is_interchangeable() {
        let id = AgentIdentity::new("agent-e", Box::new(Ed25519Scheme::generate()));
        let sig = id.sign(b"payload");
        assert!(id.verify(b"payload", &sig));
        assert!(!id.verify(b"Payload", &sig));
        assert!(id.public_id().starts_with("ed25519-"));
    }

    #[test]
    fn different_identities_do_not_cross_verify() {
        let a = identity("agent-a");
        let b = identity("agent-b");
        assert_ne!(a.public_id(), b.public_id());
        assert!(!b.verify(b"payload", &a.sign(b"payload")));
    }

    #[test]
    fn root_key_signs_kernel_records() {
        let root = RootPolicyKey::generate();
        let mut kernel = PolicyKernel::baseline("governance").unwrap();
        kernel.signature = Some(root.sign_kernel_record(&kernel).unwrap());

        assert!(root.verify_kernel_record(&kernel).unwrap());

        let mut edited = kernel.clone();
        edited.min_replay_n = 1;
        assert!(!root.verify_kernel_record(&edited).unwrap());

        let other = RootPolicyKey::generate();
        assert!(!other.verify_kernel_record(&kernel).unwrap());
    }

    #[test]
    fn unsigned_kernel_record_is_an_error() {
        let root = RootPolicyKey::generate();
        let kernel = PolicyKernel::baseline("governance").unwrap();
        assert!(matches!(
            root.verify_kernel_record(&kernel),
            Err(BastionError::Crypto { .. })
        ));
    }

    // ── Evidence chain ────────────────────────────────────────────────────────

    #[test]
    fn untampered_chain_verifies_for_any_length() {
        for n in [0, 1, 2, 7] {
            let (chain, _) = chain_with(n);
            let report = chain.verify_chain().unwrap();
            assert!(report.valid, "n={n}: {:?}", report.violations);
            assert!(report.violations.is_empty());
            assert_eq!(chain.len().unwrap(), n);
        }
    }

    #[test]
    fn genesis_prev_hash_is_empty_and_counters_increase() {
        let (chain, _) = chain_with(3);
        let bundles = chain.bundles().unwrap();

        assert_eq!(bundles[0].prev_hash, "");
        for (idx, bundle) in bundles.iter().enumerate() {
            assert_eq!(bundle.counter, idx as u64 + 1);
        }
        assert_eq!(bundles[1].prev_hash, bundles[0].canonical_hash().unwrap());
    }

    #[test]
    fn concurrent_appends_stay_linked_and_counted() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 16;

        let (chain, _) = chain_with(0);
        let chain = Arc::new(chain);
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let chain = Arc::clone(&chain);
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        chain
                            .append(&json!({ "thread": t, "i": i }), &json!({}), &[], vec![])
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = chain.verify_chain().unwrap();
        assert!(report.valid, "{:?}", report.violations);

        let counters: Vec<u64> = chain.bundles().unwrap().iter().map(|b| b.counter).collect();
        let expected: Vec<u64> = (1..=THREADS * PER_THREAD).collect();
        assert_eq!(counters, expected);
    }

    #[test]
    fn poisoned_chain_lock_is_an_error_not_empty() {
        let (chain, _) = chain_with(2);
        let chain = Arc::new(chain);
        let poisoner = Arc::clone(&chain);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison the chain lock");
        })
        .join();
        assert!(joined.is_err());

        assert!(matches!(
            chain.len(),
            Err(BastionError::ChainWriteFailed { .. })
        ));
        assert!(chain.is_empty().is_err());
    }

    #[test]
    fn tampered_prev_hash_names_the_bundle() {
        let (chain, _) = chain_with(3);
        {
            let mut state = chain.state.lock().unwrap();
            state.bundles[1].prev_hash = sha256_hex(b"forged");
        }

        let report = chain.verify_chain().unwrap();
        assert!(!report.valid);
        assert!(
            report
                .violations
                .iter()
                .any(|v| v.contains("chain break at bundle 2")),
            "violations: {:?}",
            report.violations
        );
    }

    #[test]
    fn tampered_field_breaks_the_token() {
        let (chain, _) = chain_with(2);
        {
            let mut state = chain.state.lock().unwrap();
            state.bundles[0].output_sha256 = sha256_hex(b"other output");
        }

        let report = chain.verify_chain().unwrap();
        assert!(!report.valid);
        assert!(report
            .violations
            .iter()
            .any(|v| v.starts_with("bundle 1:")));
    }

    #[test]
    fn gate_results_are_bound_into_the_bundle() {
        let (chain, _) = chain_with(0);
        let pass = GateResult::from_violations(GateId::G6Auth, vec![], vec![]);
        let a = chain.append(&json!({}), &json!({}), &[], vec![]).unwrap();
        let b = chain
            .append(&json!({}), &json!({}), &[pass], vec![])
            .unwrap();
        assert_ne!(a.gate_results_sha256, b.gate_results_sha256);
    }

    #[test]
    fn export_carries_terminal_hash() {
        let (chain, _) = chain_with(2);
        let export = chain.export().unwrap();
        assert_eq!(export.bundles.len(), 2);
        assert_eq!(
            export.terminal_hash,
            export.bundles[1].canonical_hash().unwrap()
        );
        assert_eq!(export.terminal_hash, chain.head_hash().unwrap());
    }

    // ── Zero-trust verification ───────────────────────────────────────────────

    #[test]
    fn zto_verify_passes_with_correct_inputs() {
        let (chain, kernel) = chain_with(1);
        let root = RootPolicyKey::generate();
        let bytes = kernel.canonical_bytes().unwrap();
        let sig = root.sign_kernel(&bytes);
        let bundle = chain.bundles().unwrap().remove(0);

        let report = zto_verify(
            &bundle,
            &ZeroTrustInputs {
                verifier: chain.identity(),
                root_key: &root,
                live_kernel_bytes: &bytes,
                kernel_signature: &sig,
                expected_prev_hash: "",
            },
        );
        assert!(report.valid, "{:?}", report.violations);
    }

    #[test]
    fn zto_verify_rejects_foreign_verifier() {
        let (chain, kernel) = chain_with(1);
        let root = RootPolicyKey::generate();
        let bytes = kernel.canonical_bytes().unwrap();
        let sig = root.sign_kernel(&bytes);
        let bundle = chain.bundles().unwrap().remove(0);
        let stranger = identity("agent-a");

        let report = zto_verify(
            &bundle,
            &ZeroTrustInputs {
                verifier: &stranger,
                root_key: &root,
                live_kernel_bytes: &bytes,
                kernel_signature: &sig,
                expected_prev_hash: "",
            },
        );
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].contains("JWS signature failed"));
    }

    #[test]
    fn zto_verify_reports_every_failure() {
        let (chain, kernel) = chain_with(1);
        let root = RootPolicyKey::generate();
        let rotated = kernel
            .issue_next("2.0.0", |k| k.min_replay_n = 200)
            .unwrap();
        let bytes = rotated.canonical_bytes().unwrap();
        let bundle = chain.bundles().unwrap().remove(0);

        let report = zto_verify(
            &bundle,
            &ZeroTrustInputs {
                verifier: chain.identity(),
                root_key: &root,
                live_kernel_bytes: &bytes,
                kernel_signature: "bm90LWEtc2lnbmF0dXJl",
                expected_prev_hash: "deadbeef",
            },
        );
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 3, "{:?}", report.violations);
        assert!(report.violations.iter().any(|v| v.contains("kernel hash mismatch")));
        assert!(report.violations.iter().any(|v| v.contains("root key")));
        assert!(report.violations.iter().any(|v| v.contains("fork or replay")));
    }

    // ── Kernel records ────────────────────────────────────────────────────────

    #[test]
    fn kernel_record_loads_after_round_trip() {
        let root = RootPolicyKey::generate();
        let mut kernel = PolicyKernel::baseline("governance").unwrap();
        kernel.signature = Some(root.sign_kernel_record(&kernel).unwrap());

        let raw = record::kernel_record_json(&kernel).unwrap();
        let loaded = load_kernel_record(&raw).unwrap();
        assert_eq!(loaded, kernel);
        assert!(root.verify_kernel_record(&loaded).unwrap());
    }

    #[test]
    fn kernel_record_schema_violations_are_collected() {
        let raw = json!({
            "version": "",
            "issuer": "governance",
            "invariants": [],
            "forbidden_actions": [],
            "toolchain_pins": {},
            "min_replay_n": 0,
            "kernel_sha256": "XYZ"
        })
        .to_string();

        match load_kernel_record(&raw) {
            Err(BastionError::SchemaValidation { reason }) => {
                assert!(reason.contains("environment_class"), "{reason}");
                assert!(reason.contains("min_replay_n"), "{reason}");
                assert!(reason.contains("kernel_sha256"), "{reason}");
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn kernel_record_with_stale_hash_is_rejected() {
        let mut kernel = PolicyKernel::baseline("governance").unwrap();
        kernel.forbidden_actions.clear();
        let raw = serde_json::to_string(&kernel).unwrap();

        match load_kernel_record(&raw) {
            Err(BastionError::SchemaValidation { reason }) => {
                assert!(reason.contains("does not match canonical hash"));
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }
}
