//! Attested bundles: one signed, hash-chained record per execution step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{canonical_json, sha256_hex};
use crate::error::BastionResult;
use crate::evidence::EvidenceRef;

/// An immutable, signed evidence record.
///
/// `signature_token` is a three-part `header.payload.signature` token whose
/// payload is [`AttestedBundle::unsigned_bytes`]. Any edit to any other
/// field therefore breaks the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedBundle {
    pub bundle_id: String,
    /// Public identifier of the signing key.
    pub signer: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    /// Per-chain counter, starting at 1.
    pub counter: u64,
    pub input_sha256: String,
    pub output_sha256: String,
    pub kernel_sha256: String,
    pub toolchain_sha256: String,
    pub env_fingerprint: String,
    pub gate_results_sha256: String,
    /// Canonical hash of the previous bundle; empty for the first.
    pub prev_hash: String,
    pub evidence_refs: Vec<EvidenceRef>,
    pub signature_token: String,
}

#[derive(Serialize)]
struct UnsignedBundle<'a> {
    bundle_id: &'a str,
    signer: &'a str,
    agent_id: &'a str,
    timestamp: &'a DateTime<Utc>,
    counter: u64,
    input_sha256: &'a str,
    output_sha256: &'a str,
    kernel_sha256: &'a str,
    toolchain_sha256: &'a str,
    env_fingerprint: &'a str,
    gate_results_sha256: &'a str,
    prev_hash: &'a str,
    evidence_refs: &'a [EvidenceRef],
}

impl AttestedBundle {
    /// Canonical bytes of every field except the signature token.
    pub fn unsigned_bytes(&self) -> BastionResult<Vec<u8>> {
        canonical_json(&UnsignedBundle {
            bundle_id: &self.bundle_id,
            signer: &self.signer,
            agent_id: &self.agent_id,
            timestamp: &self.timestamp,
            counter: self.counter,
            input_sha256: &self.input_sha256,
            output_sha256: &self.output_sha256,
            kernel_sha256: &self.kernel_sha256,
            toolchain_sha256: &self.toolchain_sha256,
            env_fingerprint: &self.env_fingerprint,
            gate_results_sha256: &self.gate_results_sha256,
            prev_hash: &self.prev_hash,
            evidence_refs: &self.evidence_refs,
        })
    }

    /// Hash of the complete record, token included. The next bundle's
    /// `prev_hash` must equal this value.
    pub fn canonical_hash(&self) -> BastionResult<String> {
        Ok(sha256_hex(&canonical_json(self)?))
    }
}
