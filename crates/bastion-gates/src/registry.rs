//! Capability token registry backing the policy-call gate.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use bastion_contracts::capability::{CapabilitySet, CapabilityToken};

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: BTreeMap<String, CapabilityToken>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token to `agent_id` valid for `ttl`.
    pub fn issue(
        &mut self,
        agent_id: impl Into<String>,
        capabilities: CapabilitySet,
        ttl: Duration,
    ) -> CapabilityToken {
        let token = CapabilityToken {
            token_id: format!("cap-{}", Uuid::new_v4()),
            agent_id: agent_id.into(),
            capabilities,
            expires_at: Utc::now() + ttl,
            revoked: false,
        };
        info!(
            token_id = %token.token_id,
            agent_id = %token.agent_id,
            expires_at = %token.expires_at,
            "capability token issued"
        );
        self.tokens.insert(token.token_id.clone(), token.clone());
        token
    }

    /// Register an externally issued token, replacing any with the same id.
    pub fn insert(&mut self, token: CapabilityToken) {
        self.tokens.insert(token.token_id.clone(), token);
    }

    /// Returns false when the token is unknown.
    pub fn revoke(&mut self, token_id: &str) -> bool {
        match self.tokens.get_mut(token_id) {
            Some(token) => {
                token.revoked = true;
                warn!(token_id, "capability token revoked");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, token_id: &str) -> Option<&CapabilityToken> {
        self.tokens.get(token_id)
    }

    pub fn live_tokens(&self, now: DateTime<Utc>) -> impl Iterator<Item = &CapabilityToken> {
        self.tokens.values().filter(move |t| t.is_live(now))
    }

    /// Drop expired and revoked tokens; returns how many were removed.
    pub fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.is_live(now));
        before - self.tokens.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
