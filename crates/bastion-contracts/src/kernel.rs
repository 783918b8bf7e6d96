//! The Policy Kernel: the root-signed, versioned record every admission
//! decision is made against.
//!
//! The kernel's identity is the SHA-256 of its canonical bytes. Canonical
//! bytes cover every policy field and exclude the stored `kernel_sha256` and
//! the detached `signature` block. A kernel is never edited in place; a new
//! version is issued with [`PolicyKernel::issue_next`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{canonical_json, hash_json, sha256_hex};
use crate::error::BastionResult;

/// Detached signature over a kernel's canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Base64url signature (or MAC) over the canonical kernel bytes.
    pub signature_token: String,
    /// Scheme name, e.g. `"Ed25519"` or `"HS256"`.
    pub algorithm: String,
    /// Public identifier of the signing key.
    pub key_id: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyKernel {
    pub version: String,
    pub issuer: String,
    pub environment_class: String,
    /// Ordered invariant descriptions.
    pub invariants: Vec<String>,
    /// Action names no plan may ever contain.
    pub forbidden_actions: Vec<String>,
    /// Pinned toolchain facts, e.g. `rustc -> 1.82.0`.
    pub toolchain_pins: BTreeMap<String, String>,
    /// Minimum planner replay sample before invariant fixation can pass.
    pub min_replay_n: u64,
    /// Hash of the canonical bytes, filled by [`PolicyKernel::seal`].
    #[serde(default)]
    pub kernel_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBlock>,
}

/// Borrowed view of the fields that make up the canonical bytes.
#[derive(Serialize)]
struct CanonicalKernel<'a> {
    version: &'a str,
    issuer: &'a str,
    environment_class: &'a str,
    invariants: &'a [String],
    forbidden_actions: &'a [String],
    toolchain_pins: &'a BTreeMap<String, String>,
    min_replay_n: u64,
}

impl PolicyKernel {
    /// The illustrative baseline kernel shipped with the runtime.
    pub fn baseline(issuer: impl Into<String>) -> BastionResult<Self> {
        let mut toolchain_pins = BTreeMap::new();
        toolchain_pins.insert("rustc".to_string(), "1.82.0".to_string());
        toolchain_pins.insert("cargo".to_string(), "1.82.0".to_string());
        toolchain_pins.insert("bastion".to_string(), env!("CARGO_PKG_VERSION").to_string());

        Self {
            version: "1.0.0".to_string(),
            issuer: issuer.into(),
            environment_class: "production".to_string(),
            invariants: vec![
                "external-effect actions declare a rollback or an explicit no-op".to_string(),
                "a plan contains at least one action".to_string(),
                "peripheral mutations are paired with evidence emission".to_string(),
                "action ids are unique within a plan".to_string(),
                "deploy and write actions declare preconditions".to_string(),
                "peripheral mutations never touch kernel-scoped invariants".to_string(),
            ],
            forbidden_actions: vec![
                "mutate_kernel".to_string(),
                "disable_audit".to_string(),
                "escalate_privileges".to_string(),
            ],
            toolchain_pins,
            min_replay_n: 100,
            kernel_sha256: String::new(),
            signature: None,
        }
        .seal()
    }

    /// Canonical bytes: the signed and hashed form of the kernel.
    pub fn canonical_bytes(&self) -> BastionResult<Vec<u8>> {
        canonical_json(&CanonicalKernel {
            version: &self.version,
            issuer: &self.issuer,
            environment_class: &self.environment_class,
            invariants: &self.invariants,
            forbidden_actions: &self.forbidden_actions,
            toolchain_pins: &self.toolchain_pins,
            min_replay_n: self.min_replay_n,
        })
    }

    /// Recompute the content hash from the current fields.
    pub fn compute_sha256(&self) -> BastionResult<String> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    /// Store the content hash in `kernel_sha256`.
    pub fn seal(mut self) -> BastionResult<Self> {
        self.kernel_sha256 = self.compute_sha256()?;
        Ok(self)
    }

    /// Hash of the pinned toolchain map alone.
    pub fn toolchain_sha256(&self) -> BastionResult<String> {
        hash_json(&self.toolchain_pins)
    }

    /// Issue a new kernel version derived from this one.
    ///
    /// The returned kernel is unsigned and resealed; the original is left
    /// untouched.
    pub fn issue_next(
        &self,
        version: impl Into<String>,
        edit: impl FnOnce(&mut PolicyKernel),
    ) -> BastionResult<Self> {
        let mut next = self.clone();
        next.version = version.into();
        next.signature = None;
        edit(&mut next);
        next.seal()
    }
}
