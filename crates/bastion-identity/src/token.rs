//! Compact JWS tokens over raw payload bytes.
//!
//! Tokens are `header.claims.signature` as produced by `jsonwebtoken`. The
//! signed bytes travel base64url-encoded in a single `payload` claim, so a
//! verifier recovers exactly what was signed. Bundle tokens carry no
//! expiry; they attest a record, not a session.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use bastion_contracts::error::{BastionError, BastionResult};
use bastion_core::traits::SignatureScheme;

const PAYLOAD_CLAIM: &str = "payload";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub kid: String,
    pub typ: String,
}

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenFault {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("JWS signature failed: token kid '{kid}' does not verify under '{verifier}'")]
    SignatureFailed { kid: String, verifier: String },
}

pub fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn unb64(s: &str) -> Result<Vec<u8>, TokenFault> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| TokenFault::Malformed(format!("invalid base64url: {e}")))
}

/// Sign `payload` under `scheme` and return the compact token.
pub fn encode(scheme: &dyn SignatureScheme, typ: &str, payload: &[u8]) -> BastionResult<String> {
    let keys = scheme.jws_keys()?;
    let mut header = Header::new(keys.algorithm);
    header.kid = Some(scheme.key_id());
    header.typ = Some(typ.to_string());

    jsonwebtoken::encode(&header, &json!({ "payload": b64(payload) }), &keys.encoding).map_err(
        |e| BastionError::Crypto {
            reason: format!("failed to sign {typ} token: {e}"),
        },
    )
}

/// Verify `token` under `scheme` and return its header and payload bytes.
pub fn verify(
    scheme: &dyn SignatureScheme,
    token: &str,
) -> Result<(TokenHeader, Vec<u8>), TokenFault> {
    let header = decode_header(token)
        .map_err(|e| TokenFault::Malformed(format!("invalid header: {e}")))?;
    let kid = header.kid.clone().unwrap_or_default();

    let keys = scheme
        .jws_keys()
        .map_err(|e| TokenFault::Malformed(format!("verifier has no usable key: {e}")))?;
    let mut validation = Validation::new(keys.algorithm);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    let data = decode::<serde_json::Value>(token, &keys.decoding, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenFault::SignatureFailed {
                    kid: kid.clone(),
                    verifier: scheme.key_id(),
                }
            }
            _ => TokenFault::Malformed(e.to_string()),
        }
    })?;

    let payload = data
        .claims
        .get(PAYLOAD_CLAIM)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TokenFault::Malformed(format!("missing '{PAYLOAD_CLAIM}' claim")))?;

    Ok((
        TokenHeader {
            alg: format!("{:?}", header.alg),
            kid,
            typ: header.typ.unwrap_or_default(),
        },
        unb64(payload)?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::scheme::{Ed25519Scheme, HmacScheme};

    use super::*;

    #[test]
    fn hmac_token_carries_exact_payload_bytes() {
        let scheme = HmacScheme::generate().unwrap();
        let payload = br#"{"b":1,"a":[true,null]}"#;
        let token = encode(&scheme, "APB", payload).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let (header, recovered) = verify(&scheme, &token).unwrap();
        assert_eq!(recovered, payload.to_vec());
        assert_eq!(header.alg, "HS256");
        assert_eq!(header.typ, "APB");
        assert_eq!(header.kid, scheme.key_id());
    }

    #[test]
    fn ed25519_token_verifies_only_under_its_key() {
        let scheme = Ed25519Scheme::generate();
        let token = encode(&scheme, "APB", b"record").unwrap();
        let (header, recovered) = verify(&scheme, &token).unwrap();
        assert_eq!(header.alg, "EdDSA");
        assert_eq!(recovered, b"record".to_vec());

        let other = Ed25519Scheme::generate();
        assert!(matches!(
            verify(&other, &token),
            Err(TokenFault::SignatureFailed { .. })
        ));
    }

    #[test]
    fn cross_algorithm_token_fails_signature() {
        let hmac = HmacScheme::generate().unwrap();
        let token = encode(&hmac, "APB", b"record").unwrap();
        let fault = verify(&Ed25519Scheme::generate(), &token).unwrap_err();
        assert!(fault.to_string().starts_with("JWS signature failed"));
    }

    #[test]
    fn edited_claims_fail_signature() {
        let scheme = HmacScheme::generate().unwrap();
        let token = encode(&scheme, "APB", b"record").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = b64(json!({ "payload": b64(b"forged") }).to_string().as_bytes());
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(matches!(
            verify(&scheme, &forged),
            Err(TokenFault::SignatureFailed { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let scheme = HmacScheme::generate().unwrap();
        assert!(matches!(
            verify(&scheme, "not-a-token"),
            Err(TokenFault::Malformed(_))
        ));
    }
}
