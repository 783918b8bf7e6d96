//! # bastion-runtime
//!
//! The runtime facade over the Bastion layers.
//!
//! [`Runtime::bootstrap`] creates the agent identity, root-signs the
//! kernel, fingerprints the environment and issues a default capability
//! token. [`Runtime::run_telemetry_checklist`] exercises every layer once
//! and decides whether autonomy is enabled. [`Runtime::execute_sps`] is the
//! single admission entry point.
//!
//! ```rust,ignore
//! let mut runtime = Runtime::bootstrap(RuntimeConfig::in_dir("/var/lib/bastion"))?;
//! runtime.run_telemetry_checklist()?;
//! let plan = runtime.plan("deploy:api", &[], "ship")?.plan;
//! let outcome = runtime.execute_sps(&plan, &[])?;
//! ```

pub mod config;
pub mod fingerprint;
pub mod runtime;
pub mod sink;

pub use config::RuntimeConfig;
pub use runtime::{ExecutionOutcome, ExecutionRecord, Runtime, StatusSnapshot};
pub use sink::JsonlSink;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bastion_contracts::gate::{GateId, GateStatus};
    use bastion_core::traits::RecordSink;
    use tempfile::TempDir;

    use super::*;
    use bastion_compliance::{CheckStatus, TelemetryCheck};
    use fingerprint::{env_fingerprint, live_toolchain, toolchain_sha256};

    fn runtime(dir: &TempDir) -> Runtime {
        Runtime::bootstrap(RuntimeConfig::in_dir(dir.path())).unwrap()
    }

    fn ready_runtime(dir: &TempDir) -> Runtime {
        let mut rt = runtime(dir);
        let summary = rt.run_telemetry_checklist().unwrap();
        assert!(summary.execution_ready, "{:#?}", summary.checks);
        rt
    }

    // ── End to end ───────────────────────────────────────────────────────────

    #[test]
    fn checkpoint_plan_is_admitted_after_preflight() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        assert_eq!(rt.checklist().autonomy_status().to_string(), "AUTONOMY_ENABLED");

        let plan = rt.sample_plan();
        let calls = vec![rt.policy_call("c-1", "fs", "tool:read")];
        let outcome = rt.execute_sps(&plan, &calls).unwrap();

        assert!(outcome.execution_allowed, "{:#?}", outcome.gate_run.results);
        for id in GateId::ORDER {
            assert_eq!(outcome.gate_run.status_of(id), Some(GateStatus::Pass), "{id}");
        }
        assert_eq!(
            outcome.final_bundle.gate_results_sha256,
            outcome.gate_run.gate_results_hash
        );
        assert!(outcome.compliance_coverage > 0.0);

        let report = rt.verify_chain().unwrap();
        assert!(report.valid, "{:?}", report.violations);
        assert_eq!(rt.chain().len().unwrap(), 3);
        assert_eq!(rt.execution_log().len(), 1);
    }

    #[test]
    fn planned_deploy_is_admitted() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        let outcome = rt
            .plan("deploy:api", &["change window open".to_string()], "ship")
            .unwrap();
        assert!(!outcome.mismatch);

        let result = rt.execute_sps(&outcome.plan, &[]).unwrap();
        assert!(result.execution_allowed, "{:#?}", result.gate_run.results);
        assert_eq!(result.sync_snapshot.observations, 1);
    }

    #[test]
    fn step_named_targets_pass_the_formal_gate() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        for intent in ["read:evidence", "deploy:rollback", "write:checkpoint"] {
            let planned = rt
                .plan(intent, &["change window open".to_string()], "ship")
                .unwrap();
            let outcome = rt.execute_sps(&planned.plan, &[]).unwrap();
            assert_eq!(
                outcome.gate_run.status_of(GateId::G7Formal),
                Some(GateStatus::Pass),
                "{intent}: {:?}",
                outcome.gate_run.results[1].violations
            );
        }
    }

    #[test]
    fn execution_log_line_records_the_outcome() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        let plan = rt.sample_plan();
        let outcome = rt.execute_sps(&plan, &[]).unwrap();

        let lines = rt.execution_log().read_all().unwrap();
        assert_eq!(lines.len(), 1);
        let record: ExecutionRecord = serde_json::from_value(lines[0].clone()).unwrap();
        assert_eq!(record.plan_id, plan.plan_id);
        assert_eq!(record.plan_hash, plan.content_hash().unwrap());
        assert!(record.execution_allowed);
        assert_eq!(record.gate_statuses.len(), 6);
        assert_eq!(record.bundle_id, outcome.final_bundle.bundle_id);
        assert_eq!(lines[0]["gate_statuses"]["G9_POLICY_CALL"], "PASS");
    }

    // ── Fail-closed paths ────────────────────────────────────────────────────

    #[test]
    fn without_preflight_fixation_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let mut rt = runtime(&dir);
        let plan = rt.sample_plan();
        let outcome = rt.execute_sps(&plan, &[]).unwrap();

        assert!(!outcome.execution_allowed);
        assert_eq!(
            outcome.gate_run.status_of(GateId::G11Fixation),
            Some(GateStatus::NotReady)
        );
        assert_eq!(outcome.fixation_snapshot.replay_n, 0);
        assert_eq!(rt.execution_log().len(), 1);
    }

    #[test]
    fn hard_kill_blocks_every_later_execution() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        rt.hard_kill(&"0".repeat(64));

        let plan = rt.sample_plan();
        let outcome = rt.execute_sps(&plan, &[]).unwrap();
        assert!(!outcome.execution_allowed);
        assert_eq!(
            outcome.gate_run.status_of(GateId::G11Fixation),
            Some(GateStatus::Fail)
        );
        assert_eq!(outcome.fixation_snapshot.kernel_integrity, 0.0);
        assert!(rt.status().unwrap().boundary_halted);
    }

    #[test]
    fn compliance_regression_fails_fixation() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        rt.controls_mut().unsatisfy("PREP-02").unwrap();

        let plan = rt.sample_plan();
        let outcome = rt.execute_sps(&plan, &[]).unwrap();
        assert!(!outcome.execution_allowed);
        let g11 = &outcome.gate_run.results[5];
        assert_eq!(g11.status, GateStatus::Fail);
        assert!(g11.violations.iter().any(|v| v.contains("regression")));
    }

    #[test]
    fn policy_violations_carry_into_the_sync_gate() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        let plan = rt.sample_plan();

        let mut rogue = rt.policy_call("c-1", "shell", "tool:read");
        rogue.token_id = "cap-unknown".to_string();
        let first = rt.execute_sps(&plan, &[rogue]).unwrap();
        assert_eq!(first.gate_run.status_of(GateId::G9PolicyCall), Some(GateStatus::Fail));
        assert_eq!(first.gate_run.status_of(GateId::G10Sync), Some(GateStatus::Pass));

        let good = rt.policy_call("c-2", "fs", "tool:read");
        let second = rt.execute_sps(&plan, &[good]).unwrap();
        assert_eq!(second.gate_run.status_of(GateId::G9PolicyCall), Some(GateStatus::Pass));
        assert_eq!(second.gate_run.status_of(GateId::G10Sync), Some(GateStatus::Fail));
        assert!(!second.execution_allowed);
    }

    #[test]
    fn revoked_default_token_blocks_calls() {
        let dir = TempDir::new().unwrap();
        let mut rt = ready_runtime(&dir);
        let token_id = rt.default_token_id().to_string();
        assert!(rt.tokens_mut().revoke(&token_id));

        let plan = rt.sample_plan();
        let call = rt.policy_call("c-1", "fs", "tool:read");
        let outcome = rt.execute_sps(&plan, &[call]).unwrap();
        assert!(!outcome.execution_allowed);
        assert!(outcome.gate_run.results[3].violations[0].contains("revoked"));
    }

    #[test]
    fn toolchain_pin_drift_fails_the_sandbox_gate() {
        let dir = TempDir::new().unwrap();
        let mut config = RuntimeConfig::in_dir(dir.path());
        config
            .toolchain_pins
            .insert("rustc".to_string(), "0.0.1-pinned".to_string());
        let mut rt = Runtime::bootstrap(config).unwrap();
        assert_eq!(rt.kernel().toolchain_pins["rustc"], "0.0.1-pinned");

        let summary = rt.run_telemetry_checklist().unwrap();
        assert!(!summary.execution_ready);
        assert_eq!(
            rt.checklist().status_of(TelemetryCheck::ToolchainPins),
            CheckStatus::Fail
        );
        assert_eq!(
            rt.checklist().status_of(TelemetryCheck::SandboxFingerprint),
            CheckStatus::Fail
        );

        let plan = rt.sample_plan();
        let outcome = rt.execute_sps(&plan, &[]).unwrap();
        assert!(!outcome.execution_allowed);
        let g8 = &outcome.gate_run.results[2];
        assert_eq!(g8.gate_id, GateId::G8Sandbox);
        assert_eq!(g8.status, GateStatus::Fail);
        assert_eq!(g8.violations.len(), 2);
        assert!(g8.violations[0].starts_with("env_fingerprint: live"));
        assert!(g8.violations[1].starts_with("toolchain_sha256: live"));
    }

    #[test]
    fn foreign_host_fingerprint_fails_the_sandbox_gate() {
        let dir = TempDir::new().unwrap();
        let mut config = RuntimeConfig::in_dir(dir.path());
        config.pinned_env_fingerprint = Some("e".repeat(64));
        let mut rt = Runtime::bootstrap(config).unwrap();
        rt.run_telemetry_checklist().unwrap();

        let plan = rt.sample_plan();
        let outcome = rt.execute_sps(&plan, &[]).unwrap();
        assert!(!outcome.execution_allowed);
        assert_eq!(
            outcome.gate_run.status_of(GateId::G8Sandbox),
            Some(GateStatus::Fail)
        );
        assert_eq!(outcome.gate_run.results[2].violations.len(), 1);
    }

    // ── Status and persistence ───────────────────────────────────────────────

    #[test]
    fn status_is_written_on_every_query() {
        let dir = TempDir::new().unwrap();
        let rt = ready_runtime(&dir);
        let snapshot = rt.status().unwrap();
        assert!(snapshot.execution_ready);
        assert_eq!(snapshot.chain_length, 1);
        assert!(!snapshot.boundary_halted);
        assert!(!snapshot.compliance_regression);

        let raw = std::fs::read_to_string(rt.config().status_path()).unwrap();
        let on_disk: StatusSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk, snapshot);
        assert_eq!(on_disk.autonomy_status.to_string(), "AUTONOMY_ENABLED");
    }

    #[test]
    fn telemetry_summary_is_persisted() {
        let dir = TempDir::new().unwrap();
        let rt = ready_runtime(&dir);
        let raw = std::fs::read_to_string(rt.config().telemetry_path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["execution_ready"], true);
        assert_eq!(json["checks"].as_array().map(Vec::len), Some(8));
    }

    #[test]
    fn jsonl_sink_reopens_with_existing_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("log.jsonl");
        let sink = JsonlSink::open(&path).unwrap();
        sink.append(&serde_json::json!({"n": 1})).unwrap();
        sink.append(&serde_json::json!({"n": 2})).unwrap();
        drop(sink);

        let reopened = JsonlSink::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.read_all().unwrap()[1]["n"], 2);
    }

    // ── Config and fingerprint ───────────────────────────────────────────────

    #[test]
    fn runtime_config_parses_nested_thresholds() {
        let cfg = RuntimeConfig::from_toml_str(
            r#"
            agent_id = "ops-agent"
            replay_trials = 200
            pinned_env_fingerprint = "abc123"

            [toolchain_pins]
            rustc = "1.82.0"

            [thresholds]
            max_latency_ms = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.toolchain_pins["rustc"], "1.82.0");
        assert_eq!(cfg.pinned_env_fingerprint.as_deref(), Some("abc123"));
        assert_eq!(cfg.agent_id, "ops-agent");
        assert_eq!(cfg.replay_trials, 200);
        assert_eq!(cfg.thresholds.max_latency_ms, 500.0);
        assert_eq!(cfg.thresholds.min_precision, 0.95);
        assert_eq!(cfg.execution_log, "execution.jsonl");
    }

    #[test]
    fn runtime_config_rejects_unknown_fields() {
        let err = RuntimeConfig::from_toml_str("agent = \"x\"").unwrap_err();
        assert!(err.to_string().contains("runtime TOML"));
    }

    #[test]
    fn live_toolchain_hash_matches_kernel_pin_hash() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir);
        let live = live_toolchain();
        assert_eq!(rt.kernel().toolchain_pins, live);
        assert_eq!(
            toolchain_sha256(&live).unwrap(),
            rt.kernel().toolchain_sha256().unwrap()
        );
    }

    #[test]
    fn fingerprint_tracks_pins() {
        let mut pins = BTreeMap::new();
        pins.insert("rustc".to_string(), "1.82.0".to_string());
        let a = env_fingerprint(&pins).unwrap();
        assert_eq!(a, env_fingerprint(&pins).unwrap());

        pins.insert("rustc".to_string(), "1.83.0".to_string());
        assert_ne!(a, env_fingerprint(&pins).unwrap());
    }
}
