//! Runtime error types for the Bastion admission pipeline.
//!
//! Policy outcomes (a gate failing, a boundary halting) are never errors:
//! they travel as structured results. `BastionError` is reserved for faults
//! that stop the pipeline from producing a result at all.

use thiserror::Error;

/// The unified error type for the Bastion crates.
#[derive(Debug, Error)]
pub enum BastionError {
    /// A record could not be serialized or deserialized.
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },

    /// Key material or a signature token was malformed.
    #[error("cryptographic failure: {reason}")]
    Crypto { reason: String },

    /// The evidence chain could not append a bundle.
    ///
    /// Fatal for the attempt: a step that cannot be attested cannot proceed.
    #[error("evidence chain write failed: {reason}")]
    ChainWriteFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A JSON record did not match its schema.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// An evidence reference string was not in `§REF:KIND#ID#SHA256` form.
    #[error("invalid evidence reference: {reason}")]
    InvalidEvidenceRef { reason: String },

    /// A compliance control id is not registered.
    #[error("unknown compliance control '{control_id}'")]
    UnknownControl { control_id: String },

    /// Reading or appending a persisted record failed.
    #[error("i/o error: {reason}")]
    Io { reason: String },
}

impl From<serde_json::Error> for BastionError {
    fn from(e: serde_json::Error) -> Self {
        BastionError::Serialization {
            reason: e.to_string(),
        }
    }
}

impl From<std::io::Error> for BastionError {
    fn from(e: std::io::Error) -> Self {
        BastionError::Io {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the Bastion crates.
pub type BastionResult<T> = Result<T, BastionError>;
