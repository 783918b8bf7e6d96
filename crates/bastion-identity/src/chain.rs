//! The per-agent evidence chain.
//!
//! Bundle *n* commits to bundle *n−1* through `prev_hash`, which is the
//! canonical hash of the complete previous bundle (token included). The
//! first bundle's `prev_hash` is empty. Appends are serialized by a mutex;
//! out-of-order appends would silently break the linkage.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use bastion_contracts::{
    bundle::AttestedBundle,
    digest::hash_json,
    error::{BastionError, BastionResult},
    evidence::EvidenceRef,
    gate::{gate_results_hash, GateResult},
};

use crate::identity::AgentIdentity;

/// The environment a chain's bundles are attested against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    pub kernel_sha256: String,
    pub toolchain_sha256: String,
    pub env_fingerprint: String,
}

/// Outcome of a chain or bundle verification. Lists every failing reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

impl ChainReport {
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// A sealed copy of a chain, for persistence or hand-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExport {
    pub agent_id: String,
    pub bundles: Vec<AttestedBundle>,
    /// Canonical hash of the last bundle; empty for an empty chain.
    pub terminal_hash: String,
    pub exported_at: DateTime<Utc>,
}

pub(crate) struct ChainState {
    pub(crate) bundles: Vec<AttestedBundle>,
    pub(crate) counter: u64,
    pub(crate) last_hash: String,
}

/// Append-only, signed, hash-chained bundle sequence for one agent.
pub struct EvidenceChain {
    identity: Arc<AgentIdentity>,
    context: ChainContext,
    pub(crate) state: Mutex<ChainState>,
}

impl EvidenceChain {
    pub fn new(identity: Arc<AgentIdentity>, context: ChainContext) -> Self {
        Self {
            identity,
            context,
            state: Mutex::new(ChainState {
                bundles: Vec::new(),
                counter: 0,
                last_hash: String::new(),
            }),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn context(&self) -> &ChainContext {
        &self.context
    }

    fn lock(&self) -> BastionResult<std::sync::MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| BastionError::ChainWriteFailed {
            reason: format!("chain state lock poisoned: {e}"),
        })
    }

    /// Append one bundle and return it.
    ///
    /// Links to the previous bundle's canonical hash, signs every field but
    /// the token with the agent key, and advances the counter. The lock is
    /// held for the whole operation.
    pub fn append(
        &self,
        input_state: &serde_json::Value,
        output_state: &serde_json::Value,
        gate_results: &[GateResult],
        evidence_refs: Vec<EvidenceRef>,
    ) -> BastionResult<AttestedBundle> {
        let mut state = self.lock()?;

        let mut bundle = AttestedBundle {
            bundle_id: format!("apb-{}", uuid::Uuid::new_v4()),
            signer: self.identity.public_id(),
            agent_id: self.identity.agent_id().to_string(),
            timestamp: Utc::now(),
            counter: state.counter + 1,
            input_sha256: hash_json(input_state)?,
            output_sha256: hash_json(output_state)?,
            kernel_sha256: self.context.kernel_sha256.clone(),
            toolchain_sha256: self.context.toolchain_sha256.clone(),
            env_fingerprint: self.context.env_fingerprint.clone(),
            gate_results_sha256: gate_results_hash(gate_results)?,
            prev_hash: state.last_hash.clone(),
            evidence_refs,
            signature_token: String::new(),
        };
        bundle.signature_token = self.identity.sign_token(&bundle.unsigned_bytes()?)?;

        let this_hash = bundle.canonical_hash()?;
        state.bundles.push(bundle.clone());
        state.counter = bundle.counter;
        state.last_hash = this_hash;

        debug!(
            agent_id = %bundle.agent_id,
            counter = bundle.counter,
            bundle_id = %bundle.bundle_id,
            "bundle appended"
        );
        Ok(bundle)
    }

    pub fn len(&self) -> BastionResult<usize> {
        Ok(self.lock()?.bundles.len())
    }

    pub fn is_empty(&self) -> BastionResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Canonical hash of the newest bundle; empty before the first append.
    pub fn head_hash(&self) -> BastionResult<String> {
        Ok(self.lock()?.last_hash.clone())
    }

    pub fn bundles(&self) -> BastionResult<Vec<AttestedBundle>> {
        Ok(self.lock()?.bundles.clone())
    }

    /// Walk the whole chain checking linkage and signatures.
    pub fn verify_chain(&self) -> BastionResult<ChainReport> {
        let state = self.lock()?;
        let report = verify_bundles(&state.bundles, &self.identity);
        if report.valid {
            info!(
                agent_id = %self.identity.agent_id(),
                length = state.bundles.len(),
                "evidence chain verified"
            );
        }
        Ok(report)
    }

    pub fn export(&self) -> BastionResult<ChainExport> {
        let state = self.lock()?;
        Ok(ChainExport {
            agent_id: self.identity.agent_id().to_string(),
            bundles: state.bundles.clone(),
            terminal_hash: state.last_hash.clone(),
            exported_at: Utc::now(),
        })
    }
}

/// Check that `bundle`'s token verifies under `verifier` and that the
/// signed payload is exactly the bundle's unsigned bytes.
pub fn check_bundle_signature(
    bundle: &AttestedBundle,
    verifier: &AgentIdentity,
) -> Result<(), String> {
    let (_, payload) = verifier
        .verify_token(&bundle.signature_token)
        .map_err(|fault| fault.to_string())?;

    let expected = bundle
        .unsigned_bytes()
        .map_err(|e| format!("bundle could not be re-serialized: {e}"))?;
    if !bool::from(payload.as_slice().ct_eq(expected.as_slice())) {
        return Err("signed payload does not match bundle fields".to_string());
    }
    Ok(())
}

/// Verify linkage and signatures of an ordered bundle sequence.
///
/// Positions in violation messages are 1-based. An empty sequence is valid.
pub fn verify_bundles(bundles: &[AttestedBundle], verifier: &AgentIdentity) -> ChainReport {
    let mut violations = Vec::new();
    let mut expected_prev = String::new();

    for (idx, bundle) in bundles.iter().enumerate() {
        let position = idx + 1;

        if bundle.prev_hash != expected_prev {
            violations.push(format!(
                "chain break at bundle {position}: prev_hash '{}' does not match predecessor hash '{}'",
                bundle.prev_hash, expected_prev
            ));
        }

        if bundle.counter != position as u64 {
            violations.push(format!(
                "counter gap at bundle {position}: recorded counter {}",
                bundle.counter
            ));
        }

        if let Err(reason) = check_bundle_signature(bundle, verifier) {
            violations.push(format!("bundle {position}: {reason}"));
        }

        expected_prev = match bundle.canonical_hash() {
            Ok(h) => h,
            Err(e) => {
                violations.push(format!("bundle {position}: hash failed: {e}"));
                String::new()
            }
        };
    }

    if !violations.is_empty() {
        warn!(violations = violations.len(), "evidence chain verification failed");
    }
    ChainReport::from_violations(violations)
}
