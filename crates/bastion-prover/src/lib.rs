//! # bastion-prover
//!
//! The typed-plan invariant prover.
//!
//! - [`InvariantSet`] holds named predicates over whole plans and evaluates
//!   all of them, reporting every violation.
//! - [`baseline::baseline_invariants`] is the illustrative policy every
//!   runtime starts from.
//! - [`StaticValidator`] checks structural well-formedness.
//! - [`SmtGate`] combines the two into the fail-closed G7 gate.

pub mod baseline;
pub mod invariant;
pub mod smt;
pub mod validator;

pub use invariant::{Invariant, InvariantKind, InvariantReport, InvariantSet, Severity};
pub use smt::SmtGate;
pub use validator::{StaticValidator, ValidationReport};

// ── Tests ─────────────────────────────────────────────────────────────────────
