//! Evidence references: immutable pointers into external artifacts.
//!
//! A reference never carries the artifact itself, only its kind, an id, and
//! the SHA-256 of the artifact bytes. The string form is
//! `§REF:<KIND>#<ID>#<SHA256>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::is_sha256_hex;
use crate::error::BastionError;

/// Prefix every serialized evidence reference starts with.
pub const EVIDENCE_PREFIX: &str = "§REF:";

/// The closed set of artifact kinds an evidence reference may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EvidenceKind {
    Log,
    Trace,
    Doc,
    Adr,
    Rfc,
    Spec,
    Test,
    Build,
    Attest,
    Metric,
    Diff,
    Incident,
}

impl EvidenceKind {
    pub const ALL: [EvidenceKind; 12] = [
        EvidenceKind::Log,
        EvidenceKind::Trace,
        EvidenceKind::Doc,
        EvidenceKind::Adr,
        EvidenceKind::Rfc,
        EvidenceKind::Spec,
        EvidenceKind::Test,
        EvidenceKind::Build,
        EvidenceKind::Attest,
        EvidenceKind::Metric,
        EvidenceKind::Diff,
        EvidenceKind::Incident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Log => "LOG",
            EvidenceKind::Trace => "TRACE",
            EvidenceKind::Doc => "DOC",
            EvidenceKind::Adr => "ADR",
            EvidenceKind::Rfc => "RFC",
            EvidenceKind::Spec => "SPEC",
            EvidenceKind::Test => "TEST",
            EvidenceKind::Build => "BUILD",
            EvidenceKind::Attest => "ATTEST",
            EvidenceKind::Metric => "METRIC",
            EvidenceKind::Diff => "DIFF",
            EvidenceKind::Incident => "INCIDENT",
        }
    }
}

impl FromStr for EvidenceKind {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EvidenceKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| BastionError::InvalidEvidenceRef {
                reason: format!("unknown evidence kind '{s}'"),
            })
    }
}

/// A pointer to an external artifact, e.g. `§REF:TEST#unit-42#<sha256>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvidenceRef {
    pub kind: EvidenceKind,
    pub id: String,
    pub sha256: String,
}

impl EvidenceRef {
    /// Build a reference, validating the id and digest.
    pub fn new(
        kind: EvidenceKind,
        id: impl Into<String>,
        sha256: impl Into<String>,
    ) -> Result<Self, BastionError> {
        let id = id.into();
        let sha256 = sha256.into();
        if id.is_empty() || id.contains('#') {
            return Err(BastionError::InvalidEvidenceRef {
                reason: format!("evidence id '{id}' must be non-empty and must not contain '#'"),
            });
        }
        if !is_sha256_hex(&sha256) {
            return Err(BastionError::InvalidEvidenceRef {
                reason: format!("digest '{sha256}' is not 64 lowercase hex characters"),
            });
        }
        Ok(Self { kind, id, sha256 })
    }
}

impl fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}#{}#{}",
            EVIDENCE_PREFIX,
            self.kind.as_str(),
            self.id,
            self.sha256
        )
    }
}

impl FromStr for EvidenceRef {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(EVIDENCE_PREFIX)
            .ok_or_else(|| BastionError::InvalidEvidenceRef {
                reason: format!("'{s}' does not start with '{EVIDENCE_PREFIX}'"),
            })?;

        let parts: Vec<&str> = body.split('#').collect();
        if parts.len() != 3 {
            return Err(BastionError::InvalidEvidenceRef {
                reason: format!("'{s}' must have exactly three '#'-separated parts"),
            });
        }

        let kind: EvidenceKind = parts[0].parse()?;
        EvidenceRef::new(kind, parts[1], parts[2])
    }
}

// Serialized as the string form so bundle and log records stay readable.
impl Serialize for EvidenceRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EvidenceRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
