//! Concrete signing schemes.
//!
//! `HmacScheme` is the day-to-day agent scheme (keyed MAC). `Ed25519Scheme`
//! is the asymmetric scheme used by default for the root policy key. Both
//! implement `SignatureScheme`, so either can back either role.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::{EncodePrivateKey, KeypairBytes};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use bastion_contracts::error::{BastionError, BastionResult};
use bastion_core::traits::{JwsKeys, SignatureScheme};

type HmacSha256 = Hmac<Sha256>;

/// Domain separator mixed into key-id derivation.
const KEY_ID_DOMAIN: &[u8] = b"bastion-key-id";

fn derive_key_id(prefix: &str, material: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(KEY_ID_DOMAIN);
    hasher.update(material);
    let digest = hex::encode(hasher.finalize());
    format!("{prefix}-{}", &digest[..16])
}

// ── HMAC-SHA256 ──────────────────────────────────────────────────────────────

/// Keyed-MAC signing with HMAC-SHA256.
#[derive(Clone)]
pub struct HmacScheme {
    mac: HmacSha256,
    jws: JwsKeys,
    key_id: String,
}

impl HmacScheme {
    /// Generate a fresh 32-byte key from the OS RNG.
    pub fn generate() -> BastionResult<Self> {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::from_key(&key)
    }

    /// Build a scheme from existing key material (e.g. unsealed storage).
    pub fn from_key(key: &[u8]) -> BastionResult<Self> {
        if key.is_empty() {
            return Err(BastionError::Crypto {
                reason: "HMAC key must not be empty".to_string(),
            });
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|e| BastionError::Crypto {
            reason: format!("invalid HMAC key: {e}"),
        })?;
        Ok(Self {
            mac,
            jws: JwsKeys {
                algorithm: Algorithm::HS256,
                encoding: EncodingKey::from_secret(key),
                decoding: DecodingKey::from_secret(key),
            },
            key_id: derive_key_id("hmac", key),
        })
    }
}

impl SignatureScheme for HmacScheme {
    fn algorithm(&self) -> &'static str {
        "HS256"
    }

    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(payload);
        // Constant-time comparison.
        mac.verify_slice(signature).is_ok()
    }

    fn jws_keys(&self) -> BastionResult<JwsKeys> {
        Ok(self.jws.clone())
    }
}

// ── Ed25519 ──────────────────────────────────────────────────────────────────

/// Asymmetric signing with Ed25519.
#[derive(Clone)]
pub struct Ed25519Scheme {
    signing_key: SigningKey,
    key_id: String,
}

impl Ed25519Scheme {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let key_id = derive_key_id("ed25519", signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            key_id,
        }
    }

    /// Hex-encoded verifying key, safe to publish.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn algorithm(&self) -> &'static str {
        "EdDSA"
    }

    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.signing_key.sign(payload).to_bytes().to_vec()
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.signing_key
            .verifying_key()
            .verify(payload, &signature)
            .is_ok()
    }

    /// The encoder takes a PKCS#8 v1 document; the decoder takes the raw
    /// verifying key.
    fn jws_keys(&self) -> BastionResult<JwsKeys> {
        let document = KeypairBytes {
            secret_key: self.signing_key.to_bytes(),
            public_key: None,
        }
        .to_pkcs8_der()
        .map_err(|e| BastionError::Crypto {
            reason: format!("failed to encode Ed25519 key as PKCS#8: {e}"),
        })?;
        let public = URL_SAFE_NO_PAD.encode(self.signing_key.verifying_key().as_bytes());
        let decoding =
            DecodingKey::from_ed_components(&public).map_err(|e| BastionError::Crypto {
                reason: format!("invalid Ed25519 verifying key: {e}"),
            })?;
        Ok(JwsKeys {
            algorithm: Algorithm::EdDSA,
            encoding: EncodingKey::from_ed_der(document.as_bytes()),
            decoding,
        })
    }
}
