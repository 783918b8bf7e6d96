//! Capability tokens for the policy-call boundary.
//!
//! A token is issued to exactly one agent, carries an explicit capability
//! set and an expiry, and can be revoked. Capabilities are never elevated on
//! a live token; a broader grant means issuing a new token.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A namespaced capability name, e.g. `"tool:read"` or `"deploy:staging"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability(pub String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// The set of capabilities a token grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    inner: BTreeSet<Capability>,
}

impl CapabilitySet {
    pub fn grant(&mut self, capability: Capability) {
        self.inner.insert(capability);
    }

    pub fn has(&self, capability: &Capability) -> bool {
        self.inner.contains(capability)
    }

    pub fn all(&self) -> impl Iterator<Item = &Capability> {
        self.inner.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(Capability::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken {
    pub token_id: String,
    pub agent_id: String,
    pub capabilities: CapabilitySet,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl CapabilityToken {
    /// Not revoked and not yet expired at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// One recorded tool invocation and the capability it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCall {
    pub call_id: String,
    pub tool: String,
    /// True when the call went through the policy boundary.
    pub hermetic: bool,
    pub token_id: String,
    pub required_capability: Capability,
}
