//! Trait seams for the Bastion pipeline.
//!
//! - `SignatureScheme`: a pluggable sign/verify capability. Keyed-MAC and
//!   asymmetric schemes are interchangeable behind it, so the chain and the
//!   gates never name a concrete algorithm.
//! - `RecordSink`: an append-only persisted history such as the execution
//!   log. Records written here are never rewritten.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use bastion_contracts::error::BastionResult;

/// Key pair a scheme hands to the JWS encoder and decoder.
#[derive(Clone)]
pub struct JwsKeys {
    pub algorithm: Algorithm,
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

/// A signing key together with its verification procedure.
///
/// Implementations must be symmetric (`verify(p, sign(p))` is true for the
/// same key) and strict: a single flipped bit in either the payload or the
/// signature must fail verification.
pub trait SignatureScheme: Send + Sync {
    /// Short algorithm name written into token headers, e.g. `"HS256"`.
    fn algorithm(&self) -> &'static str;

    /// Stable, non-secret identifier derived from the key material.
    fn key_id(&self) -> String;

    /// Sign `payload`, returning raw signature bytes.
    fn sign(&self, payload: &[u8]) -> Vec<u8>;

    /// Return true only if `signature` was produced by this key over `payload`.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;

    /// Keys for compact JWS tokens signed under this scheme.
    fn jws_keys(&self) -> BastionResult<JwsKeys>;
}

/// An append-only sink of JSON records.
pub trait RecordSink: Send + Sync {
    /// Append one record. Implementations must never rewrite earlier records.
    fn append(&self, record: &serde_json::Value) -> BastionResult<()>;

    /// Number of records appended through this sink.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
