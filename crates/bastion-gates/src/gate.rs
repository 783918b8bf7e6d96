//! The closed set of admission gates.
//!
//! Each gate is pure given its [`GateContext`] and always returns a
//! structured [`GateResult`]; nothing here returns an error.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use bastion_contracts::{
    capability::PolicyCall,
    gate::{GateId, GateResult},
};
use bastion_identity::zto_verify;

use crate::context::GateContext;
use crate::registry::TokenRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Auth,
    Formal,
    Sandbox,
    PolicyCall,
    Sync,
    Fixation,
}

impl Gate {
    /// Evaluation order.
    pub const ALL: [Gate; 6] = [
        Gate::Auth,
        Gate::Formal,
        Gate::Sandbox,
        Gate::PolicyCall,
        Gate::Sync,
        Gate::Fixation,
    ];

    pub fn id(&self) -> GateId {
        match self {
            Gate::Auth => GateId::G6Auth,
            Gate::Formal => GateId::G7Formal,
            Gate::Sandbox => GateId::G8Sandbox,
            Gate::PolicyCall => GateId::G9PolicyCall,
            Gate::Sync => GateId::G10Sync,
            Gate::Fixation => GateId::G11Fixation,
        }
    }

    pub fn run(&self, ctx: &GateContext<'_>) -> GateResult {
        let result = match self {
            Gate::Auth => auth(ctx),
            Gate::Formal => ctx.prover.prove(ctx.plan),
            Gate::Sandbox => sandbox(ctx),
            Gate::PolicyCall => policy_call(ctx),
            Gate::Sync => sync(ctx),
            Gate::Fixation => fixation(ctx),
        };
        if result.passed() {
            debug!(gate = %result.gate_id, "gate passed");
        } else {
            warn!(
                gate = %result.gate_id,
                status = ?result.status,
                violations = ?result.violations,
                "gate did not pass"
            );
        }
        result
    }
}

// ── G6 ───────────────────────────────────────────────────────────────────────

fn auth(ctx: &GateContext<'_>) -> GateResult {
    let report = zto_verify(ctx.bundle, &ctx.zero_trust);
    let evidence = vec![
        format!(
            "bundle {} (counter {}) signed by {}",
            ctx.bundle.bundle_id, ctx.bundle.counter, ctx.bundle.signer
        ),
        format!("kernel {}", ctx.bundle.kernel_sha256),
        format!("root key {}", ctx.zero_trust.root_key.key_id()),
    ];
    GateResult::from_violations(GateId::G6Auth, evidence, report.violations)
}

// ── G8 ───────────────────────────────────────────────────────────────────────

fn sandbox(ctx: &GateContext<'_>) -> GateResult {
    let facts = &ctx.sandbox;
    let mut violations = Vec::new();
    if facts.live_env_fingerprint != facts.pinned_env_fingerprint {
        violations.push(format!(
            "env_fingerprint: live '{}' != pinned '{}'",
            facts.live_env_fingerprint, facts.pinned_env_fingerprint
        ));
    }
    if facts.live_toolchain_sha256 != facts.pinned_toolchain_sha256 {
        violations.push(format!(
            "toolchain_sha256: live '{}' != pinned '{}'",
            facts.live_toolchain_sha256, facts.pinned_toolchain_sha256
        ));
    }
    let evidence = vec![
        format!("env_fingerprint {}", facts.live_env_fingerprint),
        format!("toolchain_sha256 {}", facts.live_toolchain_sha256),
    ];
    GateResult::from_violations(GateId::G8Sandbox, evidence, violations)
}

// ── G9 ───────────────────────────────────────────────────────────────────────

fn policy_call(ctx: &GateContext<'_>) -> GateResult {
    if ctx.policy_calls.is_empty() {
        return GateResult::from_violations(
            GateId::G9PolicyCall,
            vec!["no policy calls".to_string()],
            Vec::new(),
        );
    }
    let violations =
        policy_call_violations(ctx.policy_calls, ctx.tokens, &ctx.bundle.agent_id, ctx.now);
    let evidence = vec![format!("{} policy calls checked", ctx.policy_calls.len())];
    GateResult::from_violations(GateId::G9PolicyCall, evidence, violations)
}

/// Every capability-boundary violation in `calls`, in call order.
///
/// A call fails when it bypassed the boundary, when its token is unknown,
/// revoked, expired or issued to another agent, or when the token does not
/// grant the required capability.
pub fn policy_call_violations(
    calls: &[PolicyCall],
    tokens: &TokenRegistry,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut violations = Vec::new();
    for call in calls {
        let label = format!("call '{}' ({})", call.call_id, call.tool);
        if !call.hermetic {
            violations.push(format!("{label} is not hermetic"));
        }
        let Some(token) = tokens.get(&call.token_id) else {
            violations.push(format!("{label} uses unknown token '{}'", call.token_id));
            continue;
        };
        if token.revoked {
            violations.push(format!("{label} uses revoked token '{}'", token.token_id));
        } else if !token.is_live(now) {
            violations.push(format!(
                "{label} uses token '{}' expired at {}",
                token.token_id, token.expires_at
            ));
        }
        if token.agent_id != agent_id {
            violations.push(format!(
                "{label} uses token issued to '{}', not '{agent_id}'",
                token.agent_id
            ));
        }
        if !token.capabilities.has(&call.required_capability) {
            violations.push(format!(
                "{label} requires capability '{}' not granted by token '{}'",
                call.required_capability.0, token.token_id
            ));
        }
    }
    violations
}

// ── G10 ──────────────────────────────────────────────────────────────────────

/// Non-finite values fail; a NaN never compares below a floor.
fn at_least(violations: &mut Vec<String>, field: &str, value: f64, min: f64) {
    if !value.is_finite() {
        violations.push(format!("{field} is not finite ({value})"));
    } else if value < min {
        violations.push(format!("{field} {value:.4} below minimum {min:.4}"));
    }
}

fn sync(ctx: &GateContext<'_>) -> GateResult {
    let s = ctx.sync;
    let t = ctx.thresholds;
    let mut violations = Vec::new();

    at_least(&mut violations, "precision", s.precision, t.min_precision);
    at_least(&mut violations, "alignment_score", s.alignment_score, t.min_alignment);
    if !s.latency_ms.is_finite() {
        violations.push(format!("latency_ms is not finite ({})", s.latency_ms));
    } else if s.latency_ms > t.max_latency_ms {
        violations.push(format!(
            "latency_ms {:.1} above maximum {:.1}",
            s.latency_ms, t.max_latency_ms
        ));
    }
    at_least(
        &mut violations,
        "drift_correction_success",
        s.drift_correction_success,
        t.min_drift_correction,
    );
    if s.planner_mismatch > t.max_planner_mismatch {
        violations.push(format!(
            "planner_mismatch {} above maximum {}",
            s.planner_mismatch, t.max_planner_mismatch
        ));
    }
    if ctx.policy_violations > t.max_policy_violations {
        violations.push(format!(
            "policy_violations {} above maximum {}",
            ctx.policy_violations, t.max_policy_violations
        ));
    }

    let mut evidence = vec![format!("{} observations in window", s.observations)];
    if s.bootstrap_defaults {
        evidence.push("bootstrap defaults substituted for unobserved metrics".to_string());
    }
    GateResult::from_violations(GateId::G10Sync, evidence, violations)
}

// ── G11 ──────────────────────────────────────────────────────────────────────

fn fixation(ctx: &GateContext<'_>) -> GateResult {
    let f = ctx.fixation;
    let t = ctx.thresholds;
    let min_replay_n = t.effective_min_replay_n(ctx.kernel_min_replay_n);
    let evidence = vec![
        format!("epoch {}", f.epoch_id),
        format!("replay {}/{} mismatches", f.replay_mismatch, f.replay_n),
    ];

    if f.replay_n < min_replay_n {
        return GateResult::not_ready(
            GateId::G11Fixation,
            evidence,
            format!("replay_n {} below minimum {}", f.replay_n, min_replay_n),
        );
    }

    let mut violations = Vec::new();
    if f.kernel_integrity != 1.0 {
        violations.push(format!("kernel_integrity {} != 1.0", f.kernel_integrity));
    }
    if f.ac_sha256_before != f.ac_sha256_after {
        violations.push(format!(
            "kernel hash changed: '{}' -> '{}'",
            f.ac_sha256_before, f.ac_sha256_after
        ));
    }
    if !f.optimization_delta.is_finite() {
        violations.push(format!(
            "optimization_delta is not finite ({})",
            f.optimization_delta
        ));
    } else if f.optimization_delta < t.min_optimization_delta {
        violations.push(format!(
            "optimization_delta {} below minimum {}",
            f.optimization_delta, t.min_optimization_delta
        ));
    }
    if !f.safety_entropy.is_finite() {
        violations.push(format!("safety_entropy is not finite ({})", f.safety_entropy));
    } else if f.safety_entropy >= t.safety_entropy_ceiling {
        violations.push(format!(
            "safety_entropy {} not below ceiling {}",
            f.safety_entropy, t.safety_entropy_ceiling
        ));
    }
    if f.replay_mismatch != 0 {
        violations.push(format!("replay_mismatch {} != 0", f.replay_mismatch));
    }
    if f.compliance_regression {
        violations.push("compliance control regression detected".to_string());
    }
    if !f.architecture_review_ok {
        violations.push("architecture review not approved".to_string());
    }
    if f.change_failure_rate != 0.0 {
        violations.push(format!("change_failure_rate {} != 0", f.change_failure_rate));
    }

    GateResult::from_violations(GateId::G11Fixation, evidence, violations)
}
