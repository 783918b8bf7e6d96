//! The Bastion runtime: one agent, one kernel, one evidence chain.
//!
//! The runtime enforces the admission pipeline:
//!
//!   pre-execution bundle → G6 … G11 → final bundle → execution log
//!
//! Execution is allowed only when all six gates PASS. A gate that does not
//! pass never raises; its result is recorded in the final bundle and the
//! log line like any other. Only internal faults (serialization, I/O, a
//! poisoned chain lock) propagate as `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use bastion_cognitive::{
    DeterministicPlanner, DesiredState, EpochOutcome, PlanOutcome, ReplayReport,
    RollingWindow, SelfModEpoch, SelfModificationBoundary, SyncMetrics, SyncObservation,
};
use bastion_compliance::{
    AutonomyStatus, CheckStatus, ControlRegistry, TelemetryCheck, TelemetryChecklist,
    TelemetrySummary,
};
use bastion_contracts::{
    bundle::AttestedBundle,
    capability::{Capability, CapabilitySet, PolicyCall},
    digest::{hash_json, sha256_hex},
    error::{BastionError, BastionResult},
    evidence::{EvidenceKind, EvidenceRef},
    gate::{GateId, GateRun, GateStatus},
    kernel::PolicyKernel,
    metrics::{FixationSnapshot, SyncSnapshot},
    plan::{ActionKind, Plan, PlanBuilder, TypedAction},
};
use bastion_core::traits::RecordSink;
use bastion_gates::{
    policy_call_violations, run_gates, GateContext, SandboxFacts, TokenRegistry,
};
use bastion_identity::{
    AgentIdentity, ChainContext, ChainReport, EvidenceChain, RootPolicyKey, ZeroTrustInputs,
};
use bastion_prover::{baseline::kernel_invariants, InvariantSet, SmtGate};

use crate::config::RuntimeConfig;
use crate::fingerprint::{env_fingerprint, live_toolchain, toolchain_sha256};
use crate::sink::{write_snapshot, JsonlSink};

/// Capabilities carried by the default token issued at bootstrap.
pub const DEFAULT_CAPABILITIES: &[&str] = &["tool:read", "tool:write", "tool:emit_evidence"];

/// Which compliance control a passing pre-flight check satisfies.
const CHECK_CONTROLS: &[(TelemetryCheck, &str)] = &[
    (TelemetryCheck::KernelSignature, "PREP-02"),
    (TelemetryCheck::ToolchainPins, "PREP-03"),
    (TelemetryCheck::CapabilityBoundary, "PROT-02"),
    (TelemetryCheck::SelfModBoundary, "PROT-03"),
    (TelemetryCheck::EvidenceChain, "PROD-01"),
    (TelemetryCheck::InvariantProver, "PROD-02"),
    (TelemetryCheck::PlannerDeterminism, "PROD-03"),
];

/// Result of one `execute_sps` call.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub execution_allowed: bool,
    pub gate_run: GateRun,
    pub pre_bundle: AttestedBundle,
    pub final_bundle: AttestedBundle,
    pub sync_snapshot: SyncSnapshot,
    pub fixation_snapshot: FixationSnapshot,
    pub compliance_coverage: f64,
}

/// One line of the execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub plan_id: String,
    pub plan_hash: String,
    pub execution_allowed: bool,
    pub gate_statuses: BTreeMap<GateId, GateStatus>,
    pub gate_results_hash: String,
    pub bundle_id: String,
    pub bundle_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Written to the status file on every `status()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub agent_id: String,
    pub kernel_version: String,
    pub kernel_sha256: String,
    pub execution_ready: bool,
    pub autonomy_status: AutonomyStatus,
    pub chain_length: usize,
    pub chain_head: String,
    pub compliance_coverage: f64,
    pub compliance_regression: bool,
    pub boundary_halted: bool,
    pub generated_at: DateTime<Utc>,
}

pub struct Runtime {
    config: RuntimeConfig,
    identity: Arc<AgentIdentity>,
    root_key: RootPolicyKey,
    kernel: PolicyKernel,
    kernel_signature: String,
    toolchain_sha256: String,
    env_fingerprint: String,
    chain: EvidenceChain,
    prover: SmtGate,
    tokens: TokenRegistry,
    default_token_id: String,
    planner: DeterministicPlanner,
    sync_metrics: SyncMetrics,
    /// Policy-call violations per recent execution, newest last.
    violations: RollingWindow<u64>,
    boundary: SelfModificationBoundary,
    controls: ControlRegistry,
    checklist: TelemetryChecklist,
    log: JsonlSink,
}

impl Runtime {
    /// Bootstrap with a fresh HMAC agent identity, a fresh Ed25519 root key
    /// and the baseline kernel pinned to the configured toolchain.
    pub fn bootstrap(config: RuntimeConfig) -> BastionResult<Self> {
        let identity = AgentIdentity::generate(config.agent_id.clone())?;
        let root_key = RootPolicyKey::generate();
        let mut kernel = PolicyKernel::baseline("bastion-governance")?;
        kernel.toolchain_pins = if config.toolchain_pins.is_empty() {
            live_toolchain()
        } else {
            config.toolchain_pins.clone()
        };
        let kernel = kernel.seal()?;
        Self::with_components(config, identity, root_key, kernel)
    }

    /// Bootstrap around caller-supplied keys and kernel. The kernel is
    /// (re)signed by `root_key`.
    pub fn with_components(
        config: RuntimeConfig,
        identity: AgentIdentity,
        root_key: RootPolicyKey,
        mut kernel: PolicyKernel,
    ) -> BastionResult<Self> {
        let kernel_sha256 = kernel.compute_sha256()?;
        if kernel.kernel_sha256 != kernel_sha256 {
            return Err(BastionError::ConfigError {
                reason: format!(
                    "kernel {} is not sealed: stored hash '{}' != canonical '{}'",
                    kernel.version, kernel.kernel_sha256, kernel_sha256
                ),
            });
        }
        let block = root_key.sign_kernel_record(&kernel)?;
        let kernel_signature = block.signature_token.clone();
        kernel.signature = Some(block);

        let toolchain_sha256 = kernel.toolchain_sha256()?;
        let env_fingerprint = match &config.pinned_env_fingerprint {
            Some(pinned) => pinned.clone(),
            None => env_fingerprint(&kernel.toolchain_pins)?,
        };
        let identity = Arc::new(identity);

        let chain = EvidenceChain::new(
            Arc::clone(&identity),
            ChainContext {
                kernel_sha256: kernel_sha256.clone(),
                toolchain_sha256: toolchain_sha256.clone(),
                env_fingerprint: env_fingerprint.clone(),
            },
        );

        let mut tokens = TokenRegistry::new();
        let default_token = tokens.issue(
            identity.agent_id(),
            DEFAULT_CAPABILITIES.iter().copied().collect::<CapabilitySet>(),
            Duration::seconds(config.token_ttl_secs),
        );

        let planner = DeterministicPlanner::new(
            identity.agent_id(),
            toolchain_sha256.clone(),
            config.metrics_window,
        );
        let log = JsonlSink::open(config.execution_log_path())?;

        info!(
            agent_id = %identity.agent_id(),
            signer = %identity.public_id(),
            root_key = %root_key.key_id(),
            kernel_sha256 = %kernel_sha256,
            "runtime bootstrapped"
        );

        Ok(Self {
            prover: SmtGate::new(kernel_invariants(&kernel.forbidden_actions)),
            default_token_id: default_token.token_id,
            sync_metrics: SyncMetrics::new(config.metrics_window),
            violations: RollingWindow::new(config.violation_window),
            boundary: SelfModificationBoundary::new(kernel_sha256, config.metrics_window),
            controls: ControlRegistry::baseline(),
            checklist: TelemetryChecklist::new(),
            config,
            identity,
            root_key,
            kernel,
            kernel_signature,
            toolchain_sha256,
            env_fingerprint,
            chain,
            tokens,
            planner,
            log,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn agent_id(&self) -> &str {
        self.identity.agent_id()
    }

    pub fn kernel(&self) -> &PolicyKernel {
        &self.kernel
    }

    pub fn chain(&self) -> &EvidenceChain {
        &self.chain
    }

    pub fn controls(&self) -> &ControlRegistry {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut ControlRegistry {
        &mut self.controls
    }

    pub fn checklist(&self) -> &TelemetryChecklist {
        &self.checklist
    }

    pub fn tokens_mut(&mut self) -> &mut TokenRegistry {
        &mut self.tokens
    }

    pub fn default_token_id(&self) -> &str {
        &self.default_token_id
    }

    pub fn boundary(&self) -> &SelfModificationBoundary {
        &self.boundary
    }

    pub fn execution_log(&self) -> &JsonlSink {
        &self.log
    }

    /// A hermetic call through the default token.
    pub fn policy_call(&self, call_id: &str, tool: &str, capability: &str) -> PolicyCall {
        PolicyCall {
            call_id: call_id.to_string(),
            tool: tool.to_string(),
            hermetic: true,
            token_id: self.default_token_id.clone(),
            required_capability: Capability::new(capability),
        }
    }

    // ── Planning and metrics ─────────────────────────────────────────────────

    fn desired_state(
        &self,
        intent: &str,
        constraints: &[String],
        objective: &str,
    ) -> BastionResult<DesiredState> {
        let telemetry: Vec<_> = self
            .checklist
            .records()
            .iter()
            .map(|r| (r.check, r.status))
            .collect();
        Ok(DesiredState {
            intent: intent.to_string(),
            constraints: constraints.to_vec(),
            objective: objective.to_string(),
            kernel_sha256: self.kernel.kernel_sha256.clone(),
            policy_sha256: hash_json(&self.config.thresholds)?,
            telemetry_sha256: hash_json(&telemetry)?,
        })
    }

    /// Plan `intent` under the live kernel, recording the call in the sync
    /// metrics window.
    pub fn plan(
        &mut self,
        intent: &str,
        constraints: &[String],
        objective: &str,
    ) -> BastionResult<PlanOutcome> {
        let desired = self.desired_state(intent, constraints, objective)?;
        let started = Instant::now();
        let outcome = self.planner.plan(&desired)?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.sync_metrics
            .record(SyncObservation::planner(latency_ms, outcome.mismatch));
        Ok(outcome)
    }

    /// Record an observation from an external evaluator.
    pub fn record_observation(&mut self, observation: SyncObservation) {
        self.sync_metrics.record(observation);
    }

    pub fn sync_snapshot(&self) -> SyncSnapshot {
        self.sync_metrics.snapshot()
    }

    // ── Pre-flight ───────────────────────────────────────────────────────────

    /// The fixed plan used to exercise the prover during pre-flight.
    pub fn sample_plan(&self) -> Plan {
        PlanBuilder::new("preflight-sample", self.agent_id())
            .push(TypedAction::new("checkpoint-1", ActionKind::Checkpoint))
            .push(TypedAction::new("emit-evidence-1", ActionKind::EmitEvidence))
            .freeze()
    }

    /// Probe all eight pre-flight checks against the live components,
    /// commit the baseline self-modification epoch, satisfy the controls the
    /// passing checks cover, and persist the summary.
    pub fn run_telemetry_checklist(&mut self) -> BastionResult<TelemetrySummary> {
        let kernel_sha256 = self.kernel.kernel_sha256.clone();

        let signature_ok = self.root_key.verify_kernel_record(&self.kernel)?;
        self.checklist.mark(
            TelemetryCheck::KernelSignature,
            signature_ok,
            format!("kernel {kernel_sha256} under root key {}", self.root_key.key_id()),
        );

        let first = toolchain_sha256(&live_toolchain())?;
        let second = toolchain_sha256(&live_toolchain())?;
        let pins_ok = first == second && first == self.toolchain_sha256;
        self.checklist.mark(
            TelemetryCheck::ToolchainPins,
            pins_ok,
            format!("toolchain {first} / {second}, pinned {}", self.toolchain_sha256),
        );

        self.chain.append(
            &json!({"phase": "preflight", "kernel_sha256": kernel_sha256}),
            &json!({"checks": TelemetryCheck::ALL.len()}),
            &[],
            Vec::new(),
        )?;
        let report = self.chain.verify_chain()?;
        self.checklist.mark(
            TelemetryCheck::EvidenceChain,
            report.valid,
            chain_evidence(&report, self.chain.len()?),
        );

        let sample = self.sample_plan();
        let proof = self.prover.prove(&sample);
        let empty_set = SmtGate::new(InvariantSet::new()).prove(&sample);
        let prover_ok = proof.passed() && empty_set.status == GateStatus::Error;
        self.checklist.mark(
            TelemetryCheck::InvariantProver,
            prover_ok,
            format!(
                "sample plan {:?}, empty invariant set {:?}",
                proof.status, empty_set.status
            ),
        );

        let desired = self.desired_state("read:preflight", &[], "verify determinism")?;
        let replay = self.planner.replay(&desired, self.config.replay_trials)?;
        self.checklist.run_probe(TelemetryCheck::PlannerDeterminism, || {
            (
                replay.replay_n > 0 && replay.replay_mismatch == 0,
                format!("{} mismatches in {} replays", replay.replay_mismatch, replay.replay_n),
            )
        });

        let live_env = env_fingerprint(&live_toolchain())?;
        let pinned_env = self.env_fingerprint.clone();
        self.checklist.run_probe(TelemetryCheck::SandboxFingerprint, || {
            (
                live_env == pinned_env,
                format!("live {live_env}, pinned {pinned_env}"),
            )
        });

        let now = Utc::now();
        let allowed = policy_call_violations(
            &[self.policy_call("preflight-allowed", "probe", "tool:read")],
            &self.tokens,
            self.agent_id(),
            now,
        );
        let mut bypass = self.policy_call("preflight-bypass", "probe", "tool:admin");
        bypass.hermetic = false;
        let denied = policy_call_violations(&[bypass], &self.tokens, self.agent_id(), now);
        self.checklist.run_probe(TelemetryCheck::CapabilityBoundary, || {
            (
                allowed.is_empty() && denied.len() == 2,
                format!(
                    "granted call: {} violations, bypassing call: {} violations",
                    allowed.len(),
                    denied.len()
                ),
            )
        });

        let boundary_ok = self.boundary_probe(&kernel_sha256, replay);
        self.checklist.mark(
            TelemetryCheck::SelfModBoundary,
            boundary_ok,
            format!("halted={}, baseline epoch committed", self.boundary.is_halted()),
        );

        self.satisfy_covered_controls()?;
        let summary = self.checklist.summary();
        write_snapshot(&self.config.telemetry_path(), &summary)?;
        info!(
            ready = summary.execution_ready,
            autonomy = %summary.autonomy_status,
            coverage = self.controls.coverage(),
            "telemetry checklist complete"
        );
        Ok(summary)
    }

    fn boundary_probe(&self, kernel_sha256: &str, replay: ReplayReport) -> bool {
        if !self.boundary.check_kernel_integrity(kernel_sha256) {
            return false;
        }
        let epoch = SelfModEpoch {
            epoch_id: format!("baseline-{}", &kernel_sha256[..kernel_sha256.len().min(12)]),
            kernel_sha256: kernel_sha256.to_string(),
            mutations: Vec::new(),
        };
        let decision = self.boundary.propose_mutation(&epoch, kernel_sha256);
        if !decision.approved {
            return false;
        }
        let outcome = EpochOutcome {
            optimization_before: 0.0,
            optimization_after: 0.0,
            safety_entropy: 0.0,
            replay,
            compliance_regression: self.controls.has_regression(),
            architecture_review_ok: self.kernel.signature.is_some(),
            changes_attempted: 0,
            changes_failed: 0,
        };
        let snapshot = self.boundary.commit_epoch(&epoch, &outcome, kernel_sha256);
        snapshot.kernel_integrity == 1.0
    }

    fn satisfy_covered_controls(&mut self) -> BastionResult<()> {
        for (check, control_id) in CHECK_CONTROLS {
            let Some(record) = self
                .checklist
                .records()
                .iter()
                .find(|r| r.check == *check && r.status == CheckStatus::Pass)
            else {
                continue;
            };
            let evidence = EvidenceRef::new(
                EvidenceKind::Test,
                check.as_str(),
                sha256_hex(record.evidence.as_bytes()),
            )?;
            self.controls.satisfy(control_id, evidence)?;
        }
        if !self.controls.guard_enabled() {
            self.controls.enable_regression_guard();
        }
        Ok(())
    }

    // ── Execution ────────────────────────────────────────────────────────────

    fn live_fixation(&self, live_kernel_sha256: &str) -> FixationSnapshot {
        let mut snapshot = self
            .boundary
            .latest_snapshot()
            .unwrap_or_else(|| FixationSnapshot::unobserved(&self.kernel.kernel_sha256));
        if !self.boundary.check_kernel_integrity(live_kernel_sha256) {
            snapshot.kernel_integrity = 0.0;
        }
        snapshot.compliance_regression |= self.controls.has_regression();
        snapshot
    }

    /// Admit `plan` through G6–G11 and record the outcome.
    ///
    /// Always appends a pre-execution bundle, a final bundle binding the
    /// gate results, and one execution-log line, whether or not execution
    /// is allowed.
    pub fn execute_sps(
        &mut self,
        plan: &Plan,
        policy_calls: &[PolicyCall],
    ) -> BastionResult<ExecutionOutcome> {
        let plan_hash = plan.content_hash()?;
        let expected_prev = self.chain.head_hash()?;
        let pre_bundle = self.chain.append(
            &json!({"phase": "pre-execution", "plan_id": plan.plan_id, "plan_hash": plan_hash}),
            &json!({"policy_calls": policy_calls.len()}),
            &[],
            Vec::new(),
        )?;

        let kernel_bytes = self.kernel.canonical_bytes()?;
        let live_kernel_sha256 = sha256_hex(&kernel_bytes);
        let toolchain = live_toolchain();
        let live_env = env_fingerprint(&toolchain)?;
        let live_toolchain_sha256 = toolchain_sha256(&toolchain)?;
        let sync_snapshot = self.sync_metrics.snapshot();
        let fixation_snapshot = self.live_fixation(&live_kernel_sha256);
        let policy_violations: u64 = self.violations.iter().sum();

        let ctx = GateContext {
            bundle: &pre_bundle,
            zero_trust: ZeroTrustInputs {
                verifier: &self.identity,
                root_key: &self.root_key,
                live_kernel_bytes: &kernel_bytes,
                kernel_signature: &self.kernel_signature,
                expected_prev_hash: &expected_prev,
            },
            plan,
            prover: &self.prover,
            sandbox: SandboxFacts {
                pinned_env_fingerprint: &self.env_fingerprint,
                live_env_fingerprint: &live_env,
                pinned_toolchain_sha256: &self.toolchain_sha256,
                live_toolchain_sha256: &live_toolchain_sha256,
            },
            policy_calls,
            tokens: &self.tokens,
            sync: &sync_snapshot,
            policy_violations,
            fixation: &fixation_snapshot,
            kernel_min_replay_n: self.kernel.min_replay_n,
            thresholds: &self.config.thresholds,
            now: Utc::now(),
        };
        let gate_run = run_gates(&ctx)?;
        let execution_allowed = gate_run.all_pass;

        let g9_violations = gate_run
            .results
            .iter()
            .find(|r| r.gate_id == GateId::G9PolicyCall && !r.passed())
            .map_or(0, |r| r.violations.len() as u64);
        self.violations.push(g9_violations);

        let pre_ref = EvidenceRef::new(
            EvidenceKind::Attest,
            pre_bundle.bundle_id.as_str(),
            pre_bundle.canonical_hash()?,
        )?;
        let final_bundle = self.chain.append(
            &json!({"phase": "final", "plan_id": plan.plan_id, "plan_hash": plan_hash}),
            &json!({
                "execution_allowed": execution_allowed,
                "gate_results_hash": gate_run.gate_results_hash,
            }),
            &gate_run.results,
            vec![pre_ref],
        )?;

        let record = ExecutionRecord {
            plan_id: plan.plan_id.clone(),
            plan_hash,
            execution_allowed,
            gate_statuses: gate_run
                .results
                .iter()
                .map(|r| (r.gate_id, r.status))
                .collect(),
            gate_results_hash: gate_run.gate_results_hash.clone(),
            bundle_id: final_bundle.bundle_id.clone(),
            bundle_hash: final_bundle.canonical_hash()?,
            timestamp: Utc::now(),
        };
        self.log.append(&serde_json::to_value(&record)?)?;

        if execution_allowed {
            info!(
                plan_id = %plan.plan_id,
                bundle_id = %final_bundle.bundle_id,
                "execution allowed"
            );
        } else {
            warn!(
                plan_id = %plan.plan_id,
                bundle_id = %final_bundle.bundle_id,
                "execution blocked"
            );
        }

        Ok(ExecutionOutcome {
            execution_allowed,
            gate_run,
            pre_bundle,
            final_bundle,
            sync_snapshot,
            fixation_snapshot,
            compliance_coverage: self.controls.coverage(),
        })
    }

    // ── Status and governance ────────────────────────────────────────────────

    /// Build the status snapshot and write it to the status file.
    pub fn status(&self) -> BastionResult<StatusSnapshot> {
        let snapshot = StatusSnapshot {
            agent_id: self.agent_id().to_string(),
            kernel_version: self.kernel.version.clone(),
            kernel_sha256: self.kernel.kernel_sha256.clone(),
            execution_ready: self.checklist.execution_ready(),
            autonomy_status: self.checklist.autonomy_status(),
            chain_length: self.chain.len()?,
            chain_head: self.chain.head_hash()?,
            compliance_coverage: self.controls.coverage(),
            compliance_regression: self.controls.has_regression(),
            boundary_halted: self.boundary.is_halted(),
            generated_at: Utc::now(),
        };
        write_snapshot(&self.config.status_path(), &snapshot)?;
        Ok(snapshot)
    }

    pub fn verify_chain(&self) -> BastionResult<ChainReport> {
        self.chain.verify_chain()
    }

    /// Governance hard-kill: revert the boundary to `last_known_good_sha256`
    /// and halt it. Every later execution fails G11.
    pub fn hard_kill(&self, last_known_good_sha256: &str) {
        self.boundary.hard_kill(last_known_good_sha256);
    }
}

fn chain_evidence(report: &ChainReport, length: usize) -> String {
    if report.valid {
        format!("{length} bundles verified")
    } else {
        report.violations.join("; ")
    }
}
