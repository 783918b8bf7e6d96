//! Live environment facts for the sandbox gate.
//!
//! The kernel pins a toolchain; these functions measure the one actually
//! running. Pinned and live values are hashed the same way so G8 can
//! compare them directly.

use std::collections::BTreeMap;

use serde::Serialize;

use bastion_contracts::{digest::hash_json, error::BastionResult};

#[derive(Serialize)]
struct EnvFacts<'a> {
    os: &'static str,
    family: &'static str,
    arch: &'static str,
    toolchain: &'a BTreeMap<String, String>,
}

/// Toolchain this binary was built with, keyed like the kernel's pins.
pub fn live_toolchain() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("bastion".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ("cargo".to_string(), env!("BASTION_CARGO_VERSION").to_string()),
        ("rustc".to_string(), env!("BASTION_RUSTC_VERSION").to_string()),
    ])
}

/// Hash of a toolchain map; matches `PolicyKernel::toolchain_sha256`.
pub fn toolchain_sha256(toolchain: &BTreeMap<String, String>) -> BastionResult<String> {
    hash_json(toolchain)
}

/// Hash of the host platform facts and a toolchain map.
///
/// Deterministic for a given host and toolchain; changes when either drifts.
pub fn env_fingerprint(toolchain: &BTreeMap<String, String>) -> BastionResult<String> {
    hash_json(&EnvFacts {
        os: std::env::consts::OS,
        family: std::env::consts::FAMILY,
        arch: std::env::consts::ARCH,
        toolchain,
    })
}
