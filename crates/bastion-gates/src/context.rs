//! Inputs shared by the six gates for one admission attempt.
//!
//! The context only borrows; gates never mutate what they check.

use chrono::{DateTime, Utc};

use bastion_contracts::{
    bundle::AttestedBundle,
    capability::PolicyCall,
    metrics::{FixationSnapshot, SyncSnapshot},
    plan::Plan,
};
use bastion_identity::ZeroTrustInputs;
use bastion_prover::SmtGate;

use crate::config::GateThresholds;
use crate::registry::TokenRegistry;

/// Pinned and live sandbox facts compared by G8.
#[derive(Debug, Clone, Copy)]
pub struct SandboxFacts<'a> {
    pub pinned_env_fingerprint: &'a str,
    pub live_env_fingerprint: &'a str,
    pub pinned_toolchain_sha256: &'a str,
    pub live_toolchain_sha256: &'a str,
}

pub struct GateContext<'a> {
    /// The bundle under attestation (G6).
    pub bundle: &'a AttestedBundle,
    pub zero_trust: ZeroTrustInputs<'a>,
    /// The candidate plan (G7).
    pub plan: &'a Plan,
    pub prover: &'a SmtGate,
    pub sandbox: SandboxFacts<'a>,
    /// Recorded tool calls (G9).
    pub policy_calls: &'a [PolicyCall],
    pub tokens: &'a TokenRegistry,
    /// Short-horizon metrics (G10).
    pub sync: &'a SyncSnapshot,
    /// Policy violations observed in the trailing window.
    pub policy_violations: u64,
    /// Long-horizon metrics (G11).
    pub fixation: &'a FixationSnapshot,
    pub kernel_min_replay_n: u64,
    pub thresholds: &'a GateThresholds,
    pub now: DateTime<Utc>,
}
