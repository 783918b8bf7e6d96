//! Agent identities and the root policy key.

use chrono::Utc;

use bastion_contracts::error::{BastionError, BastionResult};
use bastion_contracts::kernel::{PolicyKernel, SignatureBlock};
use bastion_core::traits::SignatureScheme;

use crate::scheme::{Ed25519Scheme, HmacScheme};
use crate::token::{self, TokenFault, TokenHeader};

/// Token `typ` for attested bundles.
pub const BUNDLE_TOKEN_TYPE: &str = "APB";

/// A per-agent key valid for the lifetime of the process.
///
/// The key material never leaves the scheme; only the derived public id is
/// exposed.
pub struct AgentIdentity {
    agent_id: String,
    scheme: Box<dyn SignatureScheme>,
}

impl AgentIdentity {
    pub fn new(agent_id: impl Into<String>, scheme: Box<dyn SignatureScheme>) -> Self {
        Self {
            agent_id: agent_id.into(),
            scheme,
        }
    }

    /// Fresh identity backed by a random HMAC-SHA256 key.
    pub fn generate(agent_id: impl Into<String>) -> BastionResult<Self> {
        Ok(Self::new(agent_id, Box::new(HmacScheme::generate()?)))
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Stable, non-secret identifier derived from the key material.
    pub fn public_id(&self) -> String {
        self.scheme.key_id()
    }

    pub fn algorithm(&self) -> &'static str {
        self.scheme.algorithm()
    }

    /// Base64url MAC/signature over `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        token::b64(&self.scheme.sign(payload))
    }

    pub fn verify(&self, payload: &[u8], mac: &str) -> bool {
        match token::unb64(mac) {
            Ok(raw) => self.scheme.verify(payload, &raw),
            Err(_) => false,
        }
    }

    pub fn sign_token(&self, payload: &[u8]) -> BastionResult<String> {
        token::encode(self.scheme.as_ref(), BUNDLE_TOKEN_TYPE, payload)
    }

    pub fn verify_token(&self, token: &str) -> Result<(TokenHeader, Vec<u8>), TokenFault> {
        token::verify(self.scheme.as_ref(), token)
    }
}

impl std::fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("agent_id", &self.agent_id)
            .field("public_id", &self.public_id())
            .finish()
    }
}

/// The governance authority's long-lived kernel-signing key.
pub struct RootPolicyKey {
    scheme: Box<dyn SignatureScheme>,
}

impl RootPolicyKey {
    pub fn new(scheme: Box<dyn SignatureScheme>) -> Self {
        Self { scheme }
    }

    /// Fresh Ed25519 root key.
    pub fn generate() -> Self {
        Self::new(Box::new(Ed25519Scheme::generate()))
    }

    pub fn key_id(&self) -> String {
        self.scheme.key_id()
    }

    pub fn sign_kernel(&self, kernel_bytes: &[u8]) -> String {
        token::b64(&self.scheme.sign(kernel_bytes))
    }

    pub fn verify_kernel(&self, kernel_bytes: &[u8], signature: &str) -> bool {
        match token::unb64(signature) {
            Ok(raw) => self.scheme.verify(kernel_bytes, &raw),
            Err(_) => false,
        }
    }

    /// Sign a kernel's canonical bytes and return the detached block.
    pub fn sign_kernel_record(&self, kernel: &PolicyKernel) -> BastionResult<SignatureBlock> {
        Ok(SignatureBlock {
            signature_token: self.sign_kernel(&kernel.canonical_bytes()?),
            algorithm: self.scheme.algorithm().to_string(),
            key_id: self.key_id(),
            signed_at: Utc::now(),
        })
    }

    /// Verify a kernel's attached signature block against its canonical bytes.
    pub fn verify_kernel_record(&self, kernel: &PolicyKernel) -> BastionResult<bool> {
        let block = kernel
            .signature
            .as_ref()
            .ok_or_else(|| BastionError::Crypto {
                reason: format!("kernel {} carries no signature block", kernel.version),
            })?;
        if block.key_id != self.key_id() {
            return Ok(false);
        }
        Ok(self.verify_kernel(&kernel.canonical_bytes()?, &block.signature_token))
    }
}

impl std::fmt::Debug for RootPolicyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootPolicyKey")
            .field("key_id", &self.key_id())
            .finish()
    }
}
