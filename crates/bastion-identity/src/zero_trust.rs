//! Zero-trust verification of a single bundle.
//!
//! Beyond the bundle's own signature, the bundle must be bound to the
//! kernel currently in force, that kernel must carry a valid root signature,
//! and the bundle must sit where the caller expects it in the chain.

use tracing::warn;

use bastion_contracts::{bundle::AttestedBundle, digest::sha256_hex};

use crate::chain::{check_bundle_signature, ChainReport};
use crate::identity::{AgentIdentity, RootPolicyKey};

/// Everything `zto_verify` checks a bundle against.
pub struct ZeroTrustInputs<'a> {
    pub verifier: &'a AgentIdentity,
    pub root_key: &'a RootPolicyKey,
    /// Canonical bytes of the kernel currently in force.
    pub live_kernel_bytes: &'a [u8],
    /// Root signature over `live_kernel_bytes`.
    pub kernel_signature: &'a str,
    /// The prev-hash the caller expects, used to detect forks and replays.
    pub expected_prev_hash: &'a str,
}

/// Run every zero-trust condition and report all failures.
pub fn zto_verify(bundle: &AttestedBundle, inputs: &ZeroTrustInputs<'_>) -> ChainReport {
    let mut violations = Vec::new();

    if let Err(reason) = check_bundle_signature(bundle, inputs.verifier) {
        violations.push(reason);
    }

    let live_sha256 = sha256_hex(inputs.live_kernel_bytes);
    if bundle.kernel_sha256 != live_sha256 {
        violations.push(format!(
            "kernel hash mismatch: bundle attests '{}', live kernel is '{}'",
            bundle.kernel_sha256, live_sha256
        ));
    }

    if !inputs
        .root_key
        .verify_kernel(inputs.live_kernel_bytes, inputs.kernel_signature)
    {
        violations.push(format!(
            "live kernel signature does not verify under root key '{}'",
            inputs.root_key.key_id()
        ));
    }

    if bundle.prev_hash != inputs.expected_prev_hash {
        violations.push(format!(
            "prev_hash '{}' differs from expected '{}' (fork or replay)",
            bundle.prev_hash, inputs.expected_prev_hash
        ));
    }

    if !violations.is_empty() {
        warn!(
            bundle_id = %bundle.bundle_id,
            violations = violations.len(),
            "zero-trust verification failed"
        );
    }
    ChainReport::from_violations(violations)
}
