//! # bastion-gates
//!
//! The six fail-closed admission gates, G6 through G11.
//!
//! | Gate | Checks |
//! |---|---|
//! | G6 auth | zero-trust verification of the bundle under attestation |
//! | G7 formal | invariant proof of the candidate plan |
//! | G8 sandbox | live environment and toolchain hashes against the pins |
//! | G9 policy call | hermetic calls, live tokens, granted capabilities |
//! | G10 sync | short-horizon metrics against [`GateThresholds`] |
//! | G11 fixation | long-horizon self-modification metrics |
//!
//! [`run_gates`] evaluates all six in that order over one [`GateContext`]
//! and produces a [`GateRun`](bastion_contracts::gate::GateRun) whose hash
//! is bound into the next bundle.

pub mod config;
pub mod context;
pub mod gate;
pub mod registry;
pub mod runner;

pub use config::GateThresholds;
pub use context::{GateContext, SandboxFacts};
pub use gate::{policy_call_violations, Gate};
pub use registry::TokenRegistry;
pub use runner::run_gates;
