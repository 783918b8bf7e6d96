//! Loading kernel records from JSON.
//!
//! Raw JSON is validated against an embedded JSON Schema before it is
//! deserialized, and the stored `kernel_sha256` must match the recomputed
//! canonical hash. All schema violations are reported together.

use serde_json::{json, Value};
use tracing::{debug, warn};

use bastion_contracts::{
    error::{BastionError, BastionResult},
    kernel::PolicyKernel,
};

/// JSON Schema for a serialized `PolicyKernel`.
pub fn kernel_record_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "version", "issuer", "environment_class", "invariants",
            "forbidden_actions", "toolchain_pins", "min_replay_n", "kernel_sha256"
        ],
        "properties": {
            "version": { "type": "string", "minLength": 1 },
            "issuer": { "type": "string", "minLength": 1 },
            "environment_class": { "type": "string", "minLength": 1 },
            "invariants": { "type": "array", "items": { "type": "string" } },
            "forbidden_actions": { "type": "array", "items": { "type": "string" } },
            "toolchain_pins": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "min_replay_n": { "type": "integer", "minimum": 1 },
            "kernel_sha256": { "type": "string", "pattern": "^[0-9a-f]{64}$" },
            "signature": {
                "type": "object",
                "required": ["signature_token", "algorithm", "key_id", "signed_at"],
                "properties": {
                    "signature_token": { "type": "string", "minLength": 1 },
                    "algorithm": { "type": "string" },
                    "key_id": { "type": "string" },
                    "signed_at": { "type": "string" }
                }
            }
        }
    })
}

/// Parse, schema-check, and hash-check a kernel record.
pub fn load_kernel_record(raw: &str) -> BastionResult<PolicyKernel> {
    let instance: Value = serde_json::from_str(raw)?;
    let schema = kernel_record_schema();

    let validator =
        jsonschema::validator_for(&schema).map_err(|e| BastionError::SchemaValidation {
            reason: format!("invalid kernel record schema: {e}"),
        })?;

    let failures: Vec<String> = validator
        .iter_errors(&instance)
        .map(|error| format!("at '{}': {}", error.instance_path, error))
        .collect();
    if !failures.is_empty() {
        warn!(failures = failures.len(), "kernel record failed schema validation");
        return Err(BastionError::SchemaValidation {
            reason: failures.join("; "),
        });
    }

    let kernel: PolicyKernel = serde_json::from_value(instance)?;
    let recomputed = kernel.compute_sha256()?;
    if recomputed != kernel.kernel_sha256 {
        return Err(BastionError::SchemaValidation {
            reason: format!(
                "kernel_sha256 '{}' does not match canonical hash '{}'",
                kernel.kernel_sha256, recomputed
            ),
        });
    }

    debug!(
        version = %kernel.version,
        kernel_sha256 = %kernel.kernel_sha256,
        "kernel record loaded"
    );
    Ok(kernel)
}

/// Pretty JSON form of a kernel record.
pub fn kernel_record_json(kernel: &PolicyKernel) -> BastionResult<String> {
    Ok(serde_json::to_string_pretty(kernel)?)
}
